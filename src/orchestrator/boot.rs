//! Full-cluster boot

use tracing::{info, warn};

use super::flags::apply_flags;
use super::health::{wait_for_healthy, wait_for_services, HealthOutcome};
use super::probe::{await_reachable, ReachabilityProbe};
use super::{ClusterContext, OrchestratorError, Stage};
use crate::ceph::{CephClient, FlagAction, OsdFlag};
use crate::remote::close_quietly;
use crate::wol::WakeBroadcaster;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// Node the boot sequence was driven from
    pub control_node: String,
    pub health: HealthOutcome,
}

impl BootReport {
    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }
}

/// Wake every node, wait for the first to come up, wait for services, lift
/// the flags, then watch health. A cluster that is still unhealthy at the end
/// is reported, not treated as a failure.
pub async fn boot_cluster(
    ctx: &ClusterContext<'_>,
    broadcaster: &dyn WakeBroadcaster,
    probe: &dyn ReachabilityProbe,
) -> Result<BootReport, OrchestratorError> {
    ctx.progress.stage(Stage::BroadcastWake);
    for node in ctx.nodes {
        match &node.mac {
            Some(mac) => {
                broadcaster
                    .broadcast(mac)
                    .await
                    .map_err(|source| OrchestratorError::Wake {
                        node: node.name.clone(),
                        source,
                    })?;
                ctx.progress.detail(&node.name);
            }
            None => {
                warn!("{} has no MAC address configured", node.name);
                ctx.progress
                    .warning(&format!("{} has no MAC address, not woken", node.name));
            }
        }
    }

    ctx.progress.stage(Stage::AwaitReachability);
    let control = await_reachable(probe, ctx.nodes, ctx.timeouts).await?;
    ctx.progress.detail(&control.name);

    ctx.progress.stage(Stage::ConnectControlSession);
    let session = ctx.connect(control).await?;
    let result = bring_up(ctx, CephClient::new(session.as_ref())).await;
    close_quietly(session).await;
    let health = result?;

    if !health.is_healthy() {
        ctx.progress.warning(&format!(
            "Cluster not healthy yet: {}",
            health.status_text()
        ));
    }

    ctx.progress.stage(Stage::Done);
    Ok(BootReport {
        control_node: control.name.clone(),
        health,
    })
}

async fn bring_up(
    ctx: &ClusterContext<'_>,
    ceph: CephClient<'_>,
) -> Result<HealthOutcome, OrchestratorError> {
    ctx.progress.stage(Stage::AwaitServiceConvergence);
    let policy = ctx.poll_policy(ctx.timeouts.service_convergence());
    let services = wait_for_services(ceph, policy).await?;
    info!("All {} services running", services);

    ctx.progress.stage(Stage::UnsetFlags);
    apply_flags(ceph, FlagAction::Unset, &OsdFlag::ALL, ctx.progress).await?;

    ctx.progress.stage(Stage::AwaitHealthy);
    Ok(wait_for_healthy(ceph, ctx.poll_policy(ctx.timeouts.post_boot_health())).await?)
}
