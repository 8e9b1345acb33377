//! labctl: power-state orchestration for a homelab Ceph cluster
//!
//! Shuts the cluster down cleanly (health gate, OSD flags, ordered daemon
//! drain, power-off), boots it back (wake-on-LAN, reachability, service
//! convergence, flag removal, health) and moves single nodes in and out of
//! maintenance. Also takes verified etcd backups off the Kubernetes control
//! plane that runs on top of it.

pub mod ceph;
pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod remote;
pub mod transfer;
pub mod wol;
