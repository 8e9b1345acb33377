//! Stopping daemons and waiting for them to report stopped

use tracing::info;

use super::poll::{poll_until, Check, PollOutcome, PollPolicy};
use super::{ClusterContext, OrchestratorError};
use crate::ceph::{monitor_unit_name, CephClient, Daemon, DaemonFilter, StopMechanism};
use crate::remote::close_quietly;

/// Poll `ceph orch ps` until every daemon matched by `filter` is stopped.
/// A filter matching nothing counts as stopped. Returns the number of polls.
pub async fn wait_until_stopped(
    ceph: CephClient<'_>,
    filter: &DaemonFilter,
    policy: PollPolicy,
) -> Result<u32, OrchestratorError> {
    let outcome = poll_until(policy, move || async move {
        let daemons = ceph.daemons(filter).await?;
        let running: Vec<String> = daemons
            .iter()
            .filter(|d| !d.is_stopped())
            .map(Daemon::name)
            .collect();

        Ok::<_, OrchestratorError>(if running.is_empty() {
            Check::Ready(())
        } else {
            Check::Pending(running)
        })
    })
    .await?;

    match outcome {
        PollOutcome::Ready { polls, .. } => Ok(polls),
        PollOutcome::TimedOut { last, .. } => {
            info!("Still running when the drain timed out: {:?}", last);
            Err(OrchestratorError::DrainTimeout {
                target: filter.to_string(),
                waited: policy.timeout,
            })
        }
    }
}

/// Stop a whole service through the orchestrator and wait for it
pub async fn drain_service(
    ceph: CephClient<'_>,
    service: &str,
    policy: PollPolicy,
) -> Result<(), OrchestratorError> {
    ceph.stop_service(service).await?;
    let filter = DaemonFilter::Service(service.to_string());
    let polls = wait_until_stopped(ceph, &filter, policy).await?;
    info!("Service {} stopped after {} polls", service, polls);
    Ok(())
}

/// Stop every daemon of one type, one at a time.
///
/// Daemons the orchestrator can stop are stopped through it and polled until
/// stopped. Direct-control daemons are stopped with `systemctl` on their own
/// host over a separate session, and are not polled afterwards: the cluster
/// that would answer the query is what is being shut down.
pub async fn drain_daemons_of_type(
    ctx: &ClusterContext<'_>,
    ceph: CephClient<'_>,
    daemon_type: &str,
) -> Result<Vec<String>, OrchestratorError> {
    let daemons = ceph
        .daemons(&DaemonFilter::Type(daemon_type.to_string()))
        .await?;

    // only direct-control unit names need the fsid
    let fsid = if daemons
        .iter()
        .any(|d| d.stop_mechanism() == StopMechanism::DirectControl)
    {
        ceph.fsid().await?
    } else {
        String::new()
    };

    let policy = ctx.poll_policy(ctx.timeouts.drain());
    let mut stopped = Vec::with_capacity(daemons.len());

    for daemon in &daemons {
        let name = daemon.name();
        match daemon.stop_mechanism() {
            StopMechanism::Orchestrator => {
                ceph.stop_daemon(&name).await?;
                wait_until_stopped(ceph, &DaemonFilter::by_name(&name)?, policy).await?;
            }
            StopMechanism::DirectControl => stop_on_host(ctx, &fsid, daemon).await?,
        }
        info!("{} stopped", name);
        ctx.progress.detail(&name);
        stopped.push(name);
    }

    Ok(stopped)
}

async fn stop_on_host(
    ctx: &ClusterContext<'_>,
    fsid: &str,
    daemon: &Daemon,
) -> Result<(), OrchestratorError> {
    let node = ctx
        .nodes
        .iter()
        .find(|n| n.matches(&daemon.host))
        .ok_or_else(|| OrchestratorError::DaemonHostUnknown {
            daemon: daemon.name(),
            host: daemon.host.clone(),
        })?;

    let unit = monitor_unit_name(ctx.monitor_unit, fsid, &daemon.name());
    let session = ctx.connect(node).await?;
    let result = CephClient::new(session.as_ref()).stop_unit(&unit).await;
    close_quietly(session).await;

    result?;
    Ok(())
}
