//! Data types decoded from Ceph command output

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CephError;

/// `ceph health` value that gates power-state transitions
pub const HEALTH_OK: &str = "HEALTH_OK";

/// cephadm daemon status code for a stopped daemon
pub const DAEMON_STATUS_STOPPED: i32 = 0;

/// Result of `ceph health`. Only `HEALTH_OK` is interpreted; everything else
/// is "not healthy".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus(pub String);

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.0 == HEALTH_OK
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cluster-wide OSD flags toggled around a full power cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsdFlag {
    NoOut,
    NoDown,
    NoBackfill,
    NoRecover,
    NoRebalance,
    Pause,
}

impl OsdFlag {
    /// The fixed order flags are applied and reported in
    pub const ALL: [OsdFlag; 6] = [
        OsdFlag::NoOut,
        OsdFlag::NoDown,
        OsdFlag::NoBackfill,
        OsdFlag::NoRecover,
        OsdFlag::NoRebalance,
        OsdFlag::Pause,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OsdFlag::NoOut => "noout",
            OsdFlag::NoDown => "nodown",
            OsdFlag::NoBackfill => "nobackfill",
            OsdFlag::NoRecover => "norecover",
            OsdFlag::NoRebalance => "norebalance",
            OsdFlag::Pause => "pause",
        }
    }

    /// Name the cluster echoes back when the flag is toggled. `pause` is a
    /// compound of pauserd and pausewr and is reported as both.
    pub fn reported_name(&self) -> &'static str {
        match self {
            OsdFlag::Pause => "pauserd,pausewr",
            other => other.as_str(),
        }
    }

    /// Exact output `ceph osd set|unset` prints on success
    pub fn sentinel(&self, action: FlagAction) -> String {
        format!("{} is {}", self.reported_name(), action.past_tense())
    }
}

impl fmt::Display for OsdFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagAction {
    Set,
    Unset,
}

impl FlagAction {
    /// `ceph osd` subcommand
    pub fn verb(&self) -> &'static str {
        match self {
            FlagAction::Set => "set",
            FlagAction::Unset => "unset",
        }
    }

    fn past_tense(&self) -> &'static str {
        // "set" and "unset" read the same either way
        self.verb()
    }
}

/// One entry of `ceph orch ps -f json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Daemon {
    #[serde(rename = "daemon_type")]
    pub daemon_type: String,

    #[serde(rename = "daemon_id")]
    pub id: String,

    #[serde(rename = "hostname")]
    pub host: String,

    /// cephadm run state: 1 running, 0 stopped, -1 error
    #[serde(default)]
    pub status: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_desc: Option<String>,
}

impl Daemon {
    /// `type.id`, the name `ceph orch daemon` commands expect
    pub fn name(&self) -> String {
        format!("{}.{}", self.daemon_type, self.id)
    }

    pub fn is_stopped(&self) -> bool {
        self.status == DAEMON_STATUS_STOPPED
    }

    pub fn stop_mechanism(&self) -> StopMechanism {
        StopMechanism::for_daemon_type(&self.daemon_type)
    }

    /// Human-readable run state for tables
    pub fn state(&self) -> String {
        match &self.status_desc {
            Some(desc) => desc.clone(),
            None => match self.status {
                1 => "running".to_string(),
                0 => "stopped".to_string(),
                -1 => "error".to_string(),
                other => format!("unknown ({})", other),
            },
        }
    }
}

/// How a daemon type has to be stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMechanism {
    /// `ceph orch daemon stop`
    Orchestrator,
    /// `systemctl stop` on the hosting node; the orchestrator refuses to stop
    /// these because it depends on them
    DirectControl,
}

impl StopMechanism {
    pub fn for_daemon_type(daemon_type: &str) -> Self {
        match daemon_type {
            "mon" => StopMechanism::DirectControl,
            _ => StopMechanism::Orchestrator,
        }
    }
}

/// Selector for `ceph orch ps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonFilter {
    All,
    Service(String),
    Type(String),
    Name { daemon_type: String, id: String },
}

impl DaemonFilter {
    /// Parse a `type.id` daemon name
    pub fn by_name(name: &str) -> Result<Self, CephError> {
        match name.split_once('.') {
            Some((daemon_type, id)) if !daemon_type.is_empty() && !id.is_empty() => {
                Ok(DaemonFilter::Name {
                    daemon_type: daemon_type.to_string(),
                    id: id.to_string(),
                })
            }
            _ => Err(CephError::InvalidDaemonName(name.to_string())),
        }
    }

    /// Arguments appended to `ceph orch ps -f json`
    pub fn args(&self) -> String {
        match self {
            DaemonFilter::All => String::new(),
            DaemonFilter::Service(name) => format!(" --service_name {}", name),
            DaemonFilter::Type(t) => format!(" --daemon_type {}", t),
            DaemonFilter::Name { daemon_type, id } => {
                format!(" --daemon_type {} --daemon_id {}", daemon_type, id)
            }
        }
    }
}

impl fmt::Display for DaemonFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonFilter::All => f.write_str("all daemons"),
            DaemonFilter::Service(name) => write!(f, "service {}", name),
            DaemonFilter::Type(t) => write!(f, "{} daemons", t),
            DaemonFilter::Name { daemon_type, id } => write!(f, "{}.{}", daemon_type, id),
        }
    }
}

/// One entry of `ceph orch ls -f json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "service_name")]
    pub name: String,

    #[serde(default)]
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub running: u32,

    /// Expected number of daemons
    #[serde(default)]
    pub size: u32,
}

impl Service {
    pub fn is_converged(&self) -> bool {
        self.status.running == self.status.size
    }
}

/// One entry of `ceph orch host ls --format json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEntry {
    pub hostname: String,

    #[serde(default)]
    pub status: String,
}

impl HostEntry {
    pub fn in_maintenance(&self) -> bool {
        self.status.eq_ignore_ascii_case("maintenance")
    }
}

/// Outcome of a maintenance transition request. The "already" outcomes are
/// expected alternatives, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceTransition {
    Entered,
    Exited,
    AlreadyInMaintenance,
    NotInMaintenance,
}

impl MaintenanceTransition {
    /// Whether the request changed the node's state
    pub fn changed(&self) -> bool {
        matches!(
            self,
            MaintenanceTransition::Entered | MaintenanceTransition::Exited
        )
    }
}
