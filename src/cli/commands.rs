//! Command implementations for the CLI
//!
//! SBIO pattern: Commands return Results, I/O is handled by caller

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::info;

use crate::ceph::{CephClient, Daemon, DaemonFilter, HealthStatus, Service};
use crate::config::{default_config_path, load_config_file, Config, ConfigError};
use crate::orchestrator::{
    power_off_node, ClusterContext, Confirm, OrchestratorError, Progress, ShutdownOutcome, Stage,
};
use crate::remote::{close_quietly, Connector, RemoteError};
use crate::transfer::{
    backup_destination, backup_etcd, fetch_verified, snapshot_path, TransferError,
};

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("No kubernetes node configured")]
    NoKubernetesNode,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

// ============================================================================
// Configuration
// ============================================================================

/// Load the config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> CommandResult<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    info!("Loading config from {}", path.display());
    Ok(load_config_file(&path)?)
}

// ============================================================================
// Status
// ============================================================================

/// Snapshot of the cluster as seen from one node
#[derive(Debug, Clone)]
pub struct ClusterStatus {
    pub control_node: String,
    pub health: HealthStatus,
    pub services: Vec<Service>,
    pub daemons: Vec<Daemon>,
}

pub async fn cluster_status(ctx: &ClusterContext<'_>) -> CommandResult<ClusterStatus> {
    let node = ctx.control_node(None)?;
    let session = ctx.connect(node).await?;
    let ceph = CephClient::new(session.as_ref());

    let result = async {
        Ok::<_, OrchestratorError>(ClusterStatus {
            control_node: node.name.clone(),
            health: ceph.health().await?,
            services: ceph.services().await?,
            daemons: ceph.daemons(&DaemonFilter::All).await?,
        })
    }
    .await;
    close_quietly(session).await;

    Ok(result?)
}

// ============================================================================
// Fetch
// ============================================================================

/// Copy `remote` off `node` into `local` and verify its SHA-512
pub async fn fetch_file(
    ctx: &ClusterContext<'_>,
    node: &str,
    remote: &str,
    local: &Path,
) -> CommandResult<()> {
    let node = ctx.node(node)?;
    let session = ctx.connect(node).await?;
    let result = fetch_verified(session.as_ref(), remote, local).await;
    close_quietly(session).await;

    result?;
    info!("Copied {}:{} to {}", node.name, remote, local.display());
    Ok(())
}

// ============================================================================
// Kubernetes backup
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Saved(PathBuf),
    /// The destination existed and the operator chose to keep it
    NotOverwritten(PathBuf),
}

/// Snapshot etcd on the configured control-plane node into `destination`.
/// An existing destination is only replaced after confirmation.
pub async fn backup_kubernetes(
    config: &Config,
    connector: &dyn Connector,
    progress: &dyn Progress,
    confirm: &dyn Confirm,
    destination: &str,
    compress: bool,
) -> CommandResult<BackupOutcome> {
    let kubernetes = config
        .kubernetes
        .as_ref()
        .ok_or(CommandError::NoKubernetesNode)?;

    let expanded = shellexpand::tilde(destination).into_owned();
    let local = backup_destination(Path::new(&expanded), compress);

    if tokio::fs::try_exists(&local).await?
        && !confirm.confirm(&format!("Overwrite {}?", local.display()))?
    {
        return Ok(BackupOutcome::NotOverwritten(local));
    }

    progress.stage(Stage::ConnectControlSession);
    let node = &kubernetes.node;
    let session = connector
        .connect(node)
        .await
        .map_err(|source| OrchestratorError::Connect {
            node: node.name.clone(),
            source,
        })?;

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let result = backup_etcd(
        session.as_ref(),
        progress,
        &snapshot_path(millis),
        &node.username,
        compress,
        &local,
    )
    .await;
    close_quietly(session).await;

    result?;
    Ok(BackupOutcome::Saved(local))
}

// ============================================================================
// Single-node power-off
// ============================================================================

/// Ask, then power off one node that is already in maintenance
pub async fn poweroff_node(
    ctx: &ClusterContext<'_>,
    node: &str,
    confirm: &dyn Confirm,
) -> CommandResult<ShutdownOutcome> {
    let target = ctx.node(node)?;
    if !confirm.confirm(&format!("Power off {}?", target.name))? {
        return Ok(ShutdownOutcome::Declined);
    }

    power_off_node(ctx, &target.name).await?;
    Ok(ShutdownOutcome::Completed)
}
