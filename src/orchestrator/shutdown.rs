//! Full-cluster shutdown

use tracing::info;

use super::drain::{drain_daemons_of_type, drain_service};
use super::flags::apply_flags;
use super::health::require_healthy;
use super::power::power_off_all;
use super::{
    ClusterContext, Confirm, OrchestratorError, Stage, ANCILLARY_SERVICE, MONITOR_DAEMON_TYPE,
    STORAGE_DAEMON_TYPE,
};
use crate::ceph::{CephClient, FlagAction, OsdFlag};
use crate::remote::close_quietly;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed,
    /// The operator said no; nothing was touched
    Declined,
}

/// Bring the whole cluster down: confirm, gate on health, freeze data
/// movement, stop daemons from the outside in, then power off every node.
pub async fn shutdown_cluster(
    ctx: &ClusterContext<'_>,
    confirm: &dyn Confirm,
) -> Result<ShutdownOutcome, OrchestratorError> {
    ctx.progress.stage(Stage::ConfirmIntent);
    let question = format!("Shut down all {} nodes of the cluster?", ctx.nodes.len());
    if !confirm.confirm(&question).map_err(OrchestratorError::Prompt)? {
        info!("Shutdown declined");
        return Ok(ShutdownOutcome::Declined);
    }

    ctx.progress.stage(Stage::ConnectControlSession);
    let control = ctx.control_node(None)?;
    info!("Using {} as control node", control.name);
    let session = ctx.connect(control).await?;
    let result = drain_cluster(ctx, CephClient::new(session.as_ref())).await;
    close_quietly(session).await;
    result?;

    ctx.progress.stage(Stage::PowerOffAllNodes);
    power_off_all(ctx).await?;

    ctx.progress.stage(Stage::Done);
    Ok(ShutdownOutcome::Completed)
}

async fn drain_cluster(
    ctx: &ClusterContext<'_>,
    ceph: CephClient<'_>,
) -> Result<(), OrchestratorError> {
    ctx.progress.stage(Stage::HealthCheck);
    require_healthy(ceph, ctx.poll_policy(ctx.timeouts.pre_shutdown_health())).await?;

    ctx.progress.stage(Stage::SetFlags);
    apply_flags(ceph, FlagAction::Set, &OsdFlag::ALL, ctx.progress).await?;

    ctx.progress.stage(Stage::DrainAncillaryService);
    drain_service(ceph, ANCILLARY_SERVICE, ctx.poll_policy(ctx.timeouts.drain())).await?;
    ctx.progress.detail(ANCILLARY_SERVICE);

    ctx.progress.stage(Stage::DrainStorageDaemons);
    drain_daemons_of_type(ctx, ceph, STORAGE_DAEMON_TYPE).await?;

    ctx.progress.stage(Stage::DrainMonitors);
    drain_daemons_of_type(ctx, ceph, MONITOR_DAEMON_TYPE).await?;

    Ok(())
}
