//! Node power-off

use futures::future::join_all;
use tracing::{error, info};

use super::{ClusterContext, OrchestratorError, Stage};
use crate::ceph::CephClient;
use crate::config::NodeConfig;
use crate::remote::close_quietly;

/// Power off one node over its own session
async fn shutdown_node(
    ctx: &ClusterContext<'_>,
    node: &NodeConfig,
) -> Result<(), OrchestratorError> {
    let session = ctx.connect(node).await?;
    let result = CephClient::new(session.as_ref()).shutdown().await;
    close_quietly(session).await;
    result?;
    Ok(())
}

/// Power off every configured node concurrently. Every node is attempted even
/// when others fail; the failures are reported together.
pub async fn power_off_all(ctx: &ClusterContext<'_>) -> Result<(), OrchestratorError> {
    let results = join_all(ctx.nodes.iter().map(|node| shutdown_node(ctx, node))).await;

    let mut failures = Vec::new();
    for (node, result) in ctx.nodes.iter().zip(results) {
        match result {
            Ok(()) => {
                info!("Power-off scheduled on {}", node.name);
                ctx.progress.detail(&node.name);
            }
            Err(e) => {
                error!("Power-off failed on {}: {}", node.name, e);
                failures.push((node.name.clone(), e.to_string()));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(OrchestratorError::PowerOff { failures })
    }
}

/// Power off a single node, but only if the cluster already has it in
/// maintenance. The check and the power-off share the target's own session.
pub async fn power_off_node(ctx: &ClusterContext<'_>, host: &str) -> Result<(), OrchestratorError> {
    let node = ctx.node(host)?;
    ctx.progress.stage(Stage::CheckMaintenance);

    let session = ctx.connect(node).await?;
    let ceph = CephClient::new(session.as_ref());

    let result = async {
        if !ceph.in_maintenance(&node.name).await? {
            return Err(OrchestratorError::NotInMaintenance {
                node: node.name.clone(),
            });
        }
        ctx.progress.stage(Stage::PowerOffNode);
        ceph.shutdown().await?;
        Ok(())
    }
    .await;
    close_quietly(session).await;

    result?;
    info!("Power-off scheduled on {}", node.name);
    ctx.progress.stage(Stage::Done);
    Ok(())
}
