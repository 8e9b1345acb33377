//! Cluster configuration model
//!
//! The configuration describes the Ceph nodes the operator's workstation can
//! reach, how to authenticate to them, and the timing policy used by the
//! power-state orchestrator. It is read once per invocation and never mutated.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default SSH port appended to node addresses without one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default systemd unit template for daemons the orchestrator cannot stop
pub const DEFAULT_MONITOR_UNIT: &str = "ceph-{fsid}@{daemon}";

/// Root of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ceph: CephConfig,

    /// Only needed for `k8s backup`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesConfig>,
}

/// The Kubernetes section: the control-plane node that holds etcd
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    pub node: NodeConfig,
}

/// The Ceph cluster section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CephConfig {
    /// Cluster nodes, in the order the operator listed them
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Direct-control unit name template; `{fsid}` and `{daemon}` are substituted
    #[serde(default = "default_monitor_unit")]
    pub monitor_unit: String,

    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Default for CephConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            monitor_unit: default_monitor_unit(),
            timeouts: Timeouts::default(),
        }
    }
}

fn default_monitor_unit() -> String {
    DEFAULT_MONITOR_UNIT.to_string()
}

/// A single cluster host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hostname as known to the Ceph orchestrator
    pub name: String,

    /// Address used for SSH, "host" or "host:port"
    pub addr: String,

    pub username: String,

    /// Required if `private_key_file` is not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Required if `password` is not set. Supports `~` expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_file: Option<String>,

    /// Pinned host key in authorized_keys format, as printed by `ssh-keyscan`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_key: Option<String>,

    /// Hardware address for wake-on-LAN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            username: "root".to_string(),
            password: None,
            private_key_file: None,
            host_key: None,
            mac: None,
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    pub fn with_private_key(mut self, path: impl Into<String>) -> Self {
        self.private_key_file = Some(path.into());
        self
    }

    /// Case-insensitive hostname match, the way Ceph reports hostnames
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Host portion of `addr`
    pub fn host(&self) -> &str {
        split_host_port(&self.addr).0
    }

    /// Port portion of `addr`, defaulting to 22
    pub fn port(&self) -> u16 {
        split_host_port(&self.addr).1.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// `addr` with the port made explicit, suitable for a TCP connect
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }
}

/// Split "host:port" into its parts. Bare IPv6 literals are left intact;
/// bracketed ones ("[::1]:22") have their brackets removed.
fn split_host_port(addr: &str) -> (&str, Option<u16>) {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
    }

    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (addr, None),
        },
        _ => (addr, None),
    }
}

/// Timing policy for every bounded wait the orchestrator performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Interval between polls of any "is it there yet" query
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Deadline for observing HEALTH_OK before a shutdown may begin
    #[serde(default = "default_pre_shutdown_health")]
    pub pre_shutdown_health_secs: u64,

    /// Deadline for observing HEALTH_OK after boot (non-fatal)
    #[serde(default = "default_post_boot_health")]
    pub post_boot_health_secs: u64,

    /// Deadline for a service or daemon to report stopped
    #[serde(default = "default_drain")]
    pub drain_secs: u64,

    /// Deadline for every orchestrator service to reach its expected size
    #[serde(default = "default_service_convergence")]
    pub service_convergence_secs: u64,

    /// Overall deadline for any node to accept connections after wake
    #[serde(default = "default_reachability")]
    pub reachability_secs: u64,

    /// Interval between reachability rounds
    #[serde(default = "default_reachability_retry")]
    pub reachability_retry_secs: u64,

    /// Per-node connect timeout within one reachability round
    #[serde(default = "default_probe_attempt")]
    pub probe_attempt_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            pre_shutdown_health_secs: default_pre_shutdown_health(),
            post_boot_health_secs: default_post_boot_health(),
            drain_secs: default_drain(),
            service_convergence_secs: default_service_convergence(),
            reachability_secs: default_reachability(),
            reachability_retry_secs: default_reachability_retry(),
            probe_attempt_ms: default_probe_attempt(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1
}

fn default_pre_shutdown_health() -> u64 {
    10
}

fn default_post_boot_health() -> u64 {
    15
}

fn default_drain() -> u64 {
    10
}

fn default_service_convergence() -> u64 {
    60
}

fn default_reachability() -> u64 {
    60
}

fn default_reachability_retry() -> u64 {
    1
}

fn default_probe_attempt() -> u64 {
    300
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn pre_shutdown_health(&self) -> Duration {
        Duration::from_secs(self.pre_shutdown_health_secs)
    }

    pub fn post_boot_health(&self) -> Duration {
        Duration::from_secs(self.post_boot_health_secs)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }

    pub fn service_convergence(&self) -> Duration {
        Duration::from_secs(self.service_convergence_secs)
    }

    pub fn reachability(&self) -> Duration {
        Duration::from_secs(self.reachability_secs)
    }

    pub fn reachability_retry(&self) -> Duration {
        Duration::from_secs(self.reachability_retry_secs)
    }

    pub fn probe_attempt(&self) -> Duration {
        Duration::from_millis(self.probe_attempt_ms)
    }
}

// ============================================================================
// SBIO: Pure validation (no I/O)
// ============================================================================

impl NodeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("node with empty name".to_string()));
        }
        if self.addr.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "node '{}' has an empty addr",
                self.name
            )));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "node '{}' has an empty username",
                self.name
            )));
        }
        if self.password.is_none() && self.private_key_file.is_none() {
            return Err(ConfigError::Invalid(format!(
                "node '{}' needs either password or private_key_file",
                self.name
            )));
        }
        if let Some(mac) = &self.mac {
            crate::wol::parse_mac(mac)
                .map_err(|e| ConfigError::Invalid(format!("node '{}': {}", self.name, e)))?;
        }
        Ok(())
    }
}

impl Config {
    /// Check structural invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for node in &self.ceph.nodes {
            node.validate()?;
            if !seen.insert(node.name.to_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "node '{}' is defined more than once",
                    node.name
                )));
            }
        }

        if let Some(kubernetes) = &self.kubernetes {
            kubernetes.node.validate()?;
        }

        if !self.ceph.monitor_unit.contains("{daemon}") {
            return Err(ConfigError::Invalid(
                "monitor_unit must contain the {daemon} placeholder".to_string(),
            ));
        }

        Ok(())
    }
}
