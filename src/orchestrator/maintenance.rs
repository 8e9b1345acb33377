//! Per-node maintenance transitions
//!
//! The command is issued from a randomly chosen *other* node: entering
//! maintenance stops the target's own daemons, which may include the ones
//! serving the session.

use tracing::info;

use super::{ClusterContext, OrchestratorError, Stage};
use crate::ceph::{CephClient, MaintenanceTransition};
use crate::remote::close_quietly;

pub async fn enter_maintenance(
    ctx: &ClusterContext<'_>,
    host: &str,
) -> Result<MaintenanceTransition, OrchestratorError> {
    let target = ctx.node(host)?;
    ctx.progress.stage(Stage::EnterMaintenance);

    let control = ctx.control_node(Some(&target.name))?;
    let session = ctx.connect(control).await?;
    let result = CephClient::new(session.as_ref())
        .enter_maintenance(&target.name)
        .await;
    close_quietly(session).await;

    let transition = result?;
    info!("{}: {:?} (via {})", target.name, transition, control.name);
    Ok(transition)
}

pub async fn exit_maintenance(
    ctx: &ClusterContext<'_>,
    host: &str,
) -> Result<MaintenanceTransition, OrchestratorError> {
    let target = ctx.node(host)?;
    ctx.progress.stage(Stage::ExitMaintenance);

    let control = ctx.control_node(Some(&target.name))?;
    let session = ctx.connect(control).await?;
    let result = CephClient::new(session.as_ref())
        .exit_maintenance(&target.name)
        .await;
    close_quietly(session).await;

    let transition = result?;
    info!("{}: {:?} (via {})", target.name, transition, control.name);
    Ok(transition)
}

/// Whether the orchestrator reports the host in maintenance
pub async fn maintenance_status(
    ctx: &ClusterContext<'_>,
    host: &str,
) -> Result<bool, OrchestratorError> {
    let target = ctx.node(host)?;
    ctx.progress.stage(Stage::CheckMaintenance);

    let control = ctx.control_node(Some(&target.name))?;
    let session = ctx.connect(control).await?;
    let result = CephClient::new(session.as_ref())
        .in_maintenance(&target.name)
        .await;
    close_quietly(session).await;

    Ok(result?)
}
