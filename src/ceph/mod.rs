//! Typed command surface over a Ceph node
//!
//! Every function here issues one `ceph` (or systemd) command through a
//! [`RemoteSession`](crate::remote::RemoteSession) and decodes its output.
//! Remote failures are wrapped with the name of the operation that issued them.

pub mod classify;
pub mod client;
pub mod types;

pub use classify::{
    classify_enter_maintenance, classify_exit_maintenance, parse_maintenance_status,
    verify_flag_output,
};
pub use client::{monitor_unit_name, CephClient};
pub use types::{
    Daemon, DaemonFilter, FlagAction, HealthStatus, HostEntry, MaintenanceTransition, OsdFlag,
    Service, ServiceStatus, StopMechanism, DAEMON_STATUS_STOPPED, HEALTH_OK,
};

use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum CephError {
    #[error("{operation}: {source}")]
    Command {
        operation: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to decode command output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ceph osd {action} {flag}: expected \"{expected}\", got \"{actual}\"")]
    FlagNotVerified {
        flag: &'static str,
        action: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{0:?} is not a valid daemon name")]
    InvalidDaemonName(String),
}
