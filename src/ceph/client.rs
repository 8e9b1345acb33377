use tracing::debug;

use super::classify::{
    classify_enter_maintenance, classify_exit_maintenance, parse_maintenance_status,
    verify_flag_output,
};
use super::types::{
    Daemon, DaemonFilter, FlagAction, HealthStatus, MaintenanceTransition, OsdFlag, Service,
};
use super::CephError;
use crate::remote::RemoteSession;

/// Substitute `{fsid}` and `{daemon}` in a direct-control unit template
pub fn monitor_unit_name(template: &str, fsid: &str, daemon_name: &str) -> String {
    template
        .replace("{fsid}", fsid)
        .replace("{daemon}", daemon_name)
}

/// Ceph commands issued over a borrowed session
#[derive(Clone, Copy)]
pub struct CephClient<'a> {
    session: &'a dyn RemoteSession,
}

impl<'a> CephClient<'a> {
    pub fn new(session: &'a dyn RemoteSession) -> Self {
        Self { session }
    }

    pub fn node(&self) -> &str {
        self.session.node()
    }

    async fn run(&self, operation: &'static str, command: &str) -> Result<String, CephError> {
        self.session
            .execute(command)
            .await
            .map_err(|source| CephError::Command { operation, source })
    }

    pub async fn health(&self) -> Result<HealthStatus, CephError> {
        let out = self.run("ceph health", "sudo ceph health").await?;
        Ok(HealthStatus(out.trim().to_string()))
    }

    pub async fn fsid(&self) -> Result<String, CephError> {
        let out = self.run("ceph fsid", "sudo ceph fsid").await?;
        Ok(out.trim().to_string())
    }

    /// Set or unset one OSD flag and verify the echoed sentinel.
    ///
    /// Ceph writes the confirmation to stderr, hence the redirect.
    pub async fn toggle_flag(&self, flag: OsdFlag, action: FlagAction) -> Result<(), CephError> {
        let operation = match action {
            FlagAction::Set => "ceph osd set",
            FlagAction::Unset => "ceph osd unset",
        };
        let command = format!("sudo ceph osd {} {} 2>&1", action.verb(), flag);
        let out = self.run(operation, &command).await?;
        verify_flag_output(flag, action, &out)
    }

    pub async fn daemons(&self, filter: &DaemonFilter) -> Result<Vec<Daemon>, CephError> {
        let command = format!("sudo ceph orch ps -f json{}", filter.args());
        let out = self.run("ceph orch ps", &command).await?;
        decode_list(&out)
    }

    pub async fn services(&self) -> Result<Vec<Service>, CephError> {
        let out = self.run("ceph orch ls", "sudo ceph orch ls -f json").await?;
        decode_list(&out)
    }

    /// Ask the orchestrator to stop every daemon of a service
    pub async fn stop_service(&self, service: &str) -> Result<(), CephError> {
        let command = format!("sudo ceph orch stop {}", service);
        self.run("ceph orch stop", &command).await.map(drop)
    }

    /// Ask the orchestrator to stop a single `type.id` daemon
    pub async fn stop_daemon(&self, name: &str) -> Result<(), CephError> {
        let command = format!("sudo ceph orch daemon stop {}", name);
        self.run("ceph orch daemon stop", &command).await.map(drop)
    }

    pub async fn enter_maintenance(&self, host: &str) -> Result<MaintenanceTransition, CephError> {
        let command = format!("sudo ceph orch host maintenance enter {} 2>&1", host);
        let result = self.session.execute(&command).await;
        debug!("maintenance enter {}: {:?}", host, result.as_ref().map(|s| s.trim()));
        classify_enter_maintenance(result)
    }

    pub async fn exit_maintenance(&self, host: &str) -> Result<MaintenanceTransition, CephError> {
        let command = format!("sudo ceph orch host maintenance exit {} 2>&1", host);
        let result = self.session.execute(&command).await;
        debug!("maintenance exit {}: {:?}", host, result.as_ref().map(|s| s.trim()));
        classify_exit_maintenance(result)
    }

    pub async fn in_maintenance(&self, host: &str) -> Result<bool, CephError> {
        let command = format!("sudo ceph orch host ls --format json --host_pattern {}", host);
        let out = self.run("ceph orch host ls", &command).await?;
        parse_maintenance_status(&out, host)
    }

    /// Stop a systemd unit on the session's own node
    pub async fn stop_unit(&self, unit: &str) -> Result<(), CephError> {
        let command = format!("sudo systemctl stop {}", unit);
        self.run("systemctl stop", &command).await.map(drop)
    }

    /// Schedule a power-off of the session's own node
    pub async fn shutdown(&self) -> Result<(), CephError> {
        self.run("shutdown", "sudo shutdown").await.map(drop)
    }
}

/// Decode a JSON array; empty output means an empty list
fn decode_list<T: serde::de::DeserializeOwned>(out: &str) -> Result<Vec<T>, CephError> {
    let trimmed = out.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}
