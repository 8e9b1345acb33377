//! # Cluster power-state orchestration
//!
//! Composes the Ceph command surface into the two directional state machines
//! (shutdown and boot) plus per-node maintenance and power-off.
//!
//! ## Shutdown
//!
//! ```text
//! ConfirmIntent -> HealthCheck -> SetFlags -> DrainAncillaryService
//!   -> DrainStorageDaemons -> DrainMonitors -> PowerOffAllNodes -> Done
//! ```
//!
//! ## Boot
//!
//! ```text
//! BroadcastWake -> AwaitReachability -> ConnectControlSession
//!   -> AwaitServiceConvergence -> UnsetFlags -> AwaitHealthy -> Done
//! ```
//!
//! Any failure halts the sequence and is returned unchanged. Nothing is rolled
//! back: once flags are set or daemons are stopped, recovery is up to the
//! operator. The only retries are the bounded polling loops, which re-ask
//! "is it in the desired state yet" and never re-issue commands.

pub mod boot;
pub mod drain;
pub mod flags;
pub mod health;
pub mod maintenance;
pub mod poll;
pub mod power;
pub mod probe;
pub mod selector;
pub mod shutdown;

pub use boot::{boot_cluster, BootReport};
pub use drain::{drain_daemons_of_type, drain_service, wait_until_stopped};
pub use flags::apply_flags;
pub use health::{require_healthy, wait_for_healthy, wait_for_services, HealthOutcome};
pub use maintenance::{enter_maintenance, exit_maintenance, maintenance_status};
pub use poll::{poll_until, Check, PollOutcome, PollPolicy};
pub use power::{power_off_all, power_off_node};
pub use probe::{await_reachable, first_reachable, ReachabilityProbe, TcpProbe};
pub use selector::{select_node, SelectError};
pub use shutdown::{shutdown_cluster, ShutdownOutcome};

use std::time::Duration;

use thiserror::Error;

use crate::ceph::CephError;
use crate::config::{Config, ConfigError, NodeConfig, Timeouts};
use crate::remote::{Connector, RemoteError, RemoteSession};
use crate::wol::WakeError;

/// Service stopped before any storage daemon
pub const ANCILLARY_SERVICE: &str = "crash";

/// Object storage daemons, drained before monitors
pub const STORAGE_DAEMON_TYPE: &str = "osd";

/// Monitor daemons, drained last and stopped on their own hosts
pub const MONITOR_DAEMON_TYPE: &str = "mon";

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Connection to {node} failed: {source}")]
    Connect {
        node: String,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    Ceph(#[from] CephError),

    #[error(transparent)]
    Selection(#[from] SelectError),

    #[error("Cluster is not healthy: {status}")]
    Unhealthy { status: String },

    #[error("Host {node} is not in maintenance mode")]
    NotInMaintenance { node: String },

    #[error("Timed out after {waited:?} waiting for {target} to stop")]
    DrainTimeout { target: String, waited: Duration },

    #[error("Timed out after {waited:?} waiting for services to start: {}", .pending.join(", "))]
    ServiceConvergenceTimeout {
        pending: Vec<String>,
        waited: Duration,
    },

    #[error("No node became reachable within {waited:?}")]
    NoNodeReachable { waited: Duration },

    #[error("Daemon {daemon} runs on {host}, which is not in the configuration")]
    DaemonHostUnknown { daemon: String, host: String },

    #[error("Wake-on-LAN for {node} failed: {source}")]
    Wake {
        node: String,
        #[source]
        source: WakeError,
    },

    #[error("Power-off failed on {}", .failures.iter().map(|(n, e)| format!("{n} ({e})")).collect::<Vec<_>>().join(", "))]
    PowerOff { failures: Vec<(String, String)> },

    #[error("Confirmation prompt failed: {0}")]
    Prompt(#[source] std::io::Error),
}

/// Error taxonomy used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Session open/close or remote execution failed
    Connectivity,
    /// A fail-closed check refused to start; nothing was changed
    Precondition,
    /// The cluster did not reach the expected state; it may be partially changed
    Verification,
}

impl OrchestratorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            OrchestratorError::Connect { .. }
            | OrchestratorError::Wake { .. }
            | OrchestratorError::PowerOff { .. }
            | OrchestratorError::NoNodeReachable { .. }
            | OrchestratorError::Prompt(_) => ErrorClass::Connectivity,

            OrchestratorError::Config(_)
            | OrchestratorError::Selection(_)
            | OrchestratorError::Unhealthy { .. }
            | OrchestratorError::NotInMaintenance { .. }
            | OrchestratorError::DaemonHostUnknown { .. } => ErrorClass::Precondition,

            OrchestratorError::DrainTimeout { .. }
            | OrchestratorError::ServiceConvergenceTimeout { .. } => ErrorClass::Verification,

            OrchestratorError::Ceph(e) => match e {
                CephError::Command { .. } => ErrorClass::Connectivity,
                CephError::InvalidDaemonName(_) => ErrorClass::Precondition,
                CephError::Json(_) | CephError::FlagNotVerified { .. } => ErrorClass::Verification,
            },
        }
    }
}

/// States reported while a sequence runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ConfirmIntent,
    ConnectControlSession,
    HealthCheck,
    SetFlags,
    DrainAncillaryService,
    DrainStorageDaemons,
    DrainMonitors,
    PowerOffAllNodes,
    BroadcastWake,
    AwaitReachability,
    AwaitServiceConvergence,
    UnsetFlags,
    AwaitHealthy,
    CheckMaintenance,
    PowerOffNode,
    EnterMaintenance,
    ExitMaintenance,
    SnapshotEtcd,
    CompressSnapshot,
    DownloadSnapshot,
    VerifyIntegrity,
    Done,
}

/// Operator-facing progress. Diagnostics go to `tracing`; this is what the
/// operator watches.
pub trait Progress: Send + Sync {
    fn stage(&self, stage: Stage);

    /// A line under the current stage, e.g. a flag or daemon name
    fn detail(&self, message: &str);

    /// A non-fatal problem the operator should know about
    fn warning(&self, message: &str);
}

/// Asks the operator a yes/no question
pub trait Confirm: Send + Sync {
    fn confirm(&self, question: &str) -> std::io::Result<bool>;
}

/// Answers yes without asking
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _question: &str) -> std::io::Result<bool> {
        Ok(true)
    }
}

/// Everything a sequence needs for one invocation. Borrowed, never owned:
/// the configuration outlives every sequence.
#[derive(Clone, Copy)]
pub struct ClusterContext<'a> {
    pub nodes: &'a [NodeConfig],
    pub connector: &'a dyn Connector,
    pub timeouts: &'a Timeouts,
    pub monitor_unit: &'a str,
    pub progress: &'a dyn Progress,
}

impl<'a> ClusterContext<'a> {
    pub fn new(
        config: &'a Config,
        connector: &'a dyn Connector,
        progress: &'a dyn Progress,
    ) -> Self {
        Self {
            nodes: &config.ceph.nodes,
            connector,
            timeouts: &config.ceph.timeouts,
            monitor_unit: &config.ceph.monitor_unit,
            progress,
        }
    }

    pub fn node(&self, name: &str) -> Result<&'a NodeConfig, OrchestratorError> {
        self.nodes
            .iter()
            .find(|n| n.matches(name))
            .ok_or_else(|| ConfigError::UnknownNode(name.to_string()).into())
    }

    /// Pick a random node to issue cluster commands from
    pub fn control_node(&self, exclude: Option<&str>) -> Result<&'a NodeConfig, OrchestratorError> {
        let mut rng = rand::thread_rng();
        Ok(select_node(self.nodes, exclude, &mut rng)?)
    }

    pub async fn connect(
        &self,
        node: &NodeConfig,
    ) -> Result<Box<dyn RemoteSession>, OrchestratorError> {
        self.connector
            .connect(node)
            .await
            .map_err(|source| OrchestratorError::Connect {
                node: node.name.clone(),
                source,
            })
    }

    pub fn poll_policy(&self, timeout: Duration) -> PollPolicy {
        PollPolicy {
            interval: self.timeouts.poll_interval(),
            timeout,
        }
    }
}

/// Config with one node per name, each with a MAC
#[cfg(test)]
pub(crate) fn test_config(names: &[&str]) -> Config {
    let mut config = Config::default();
    config.ceph.nodes = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            NodeConfig::new(*name, format!("10.0.0.{}", i + 1))
                .with_mac(format!("52:54:00:00:00:{:02x}", i + 1))
        })
        .collect();
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let unhealthy = OrchestratorError::Unhealthy {
            status: "HEALTH_WARN".to_string(),
        };
        assert_eq!(unhealthy.class(), ErrorClass::Precondition);

        let drain = OrchestratorError::DrainTimeout {
            target: "service crash".to_string(),
            waited: Duration::from_secs(10),
        };
        assert_eq!(drain.class(), ErrorClass::Verification);

        let flag = OrchestratorError::Ceph(CephError::FlagNotVerified {
            flag: "pause",
            action: "set",
            expected: "pauserd,pausewr is set".to_string(),
            actual: "pause is set".to_string(),
        });
        assert_eq!(flag.class(), ErrorClass::Verification);

        let selection = OrchestratorError::Selection(SelectError::NoNodes);
        assert_eq!(selection.class(), ErrorClass::Precondition);
    }

    #[test]
    fn test_error_messages() {
        let err = OrchestratorError::ServiceConvergenceTimeout {
            pending: vec!["osd".to_string(), "mgr".to_string()],
            waited: Duration::from_secs(60),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 60s waiting for services to start: osd, mgr"
        );

        let err = OrchestratorError::PowerOff {
            failures: vec![("ceph-2".to_string(), "refused".to_string())],
        };
        assert_eq!(err.to_string(), "Power-off failed on ceph-2 (refused)");
    }
}
