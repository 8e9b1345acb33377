//! Health and service-convergence gates

use tracing::{info, warn};

use super::poll::{poll_until, Check, PollOutcome, PollPolicy};
use super::OrchestratorError;
use crate::ceph::{CephClient, CephError, HealthStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthOutcome {
    Healthy { polls: u32 },
    /// Deadline passed; `last` is the final status observed
    Unhealthy { last: Option<HealthStatus> },
}

impl HealthOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthOutcome::Healthy { .. })
    }

    /// Last status seen, for messages
    pub fn status_text(&self) -> String {
        match self {
            HealthOutcome::Healthy { .. } => crate::ceph::HEALTH_OK.to_string(),
            HealthOutcome::Unhealthy { last: Some(status) } => status.to_string(),
            HealthOutcome::Unhealthy { last: None } => "no status reported".to_string(),
        }
    }
}

/// Poll `ceph health` until it reports HEALTH_OK or the policy times out.
/// A failing health command is an error, not "unhealthy".
pub async fn wait_for_healthy(
    ceph: CephClient<'_>,
    policy: PollPolicy,
) -> Result<HealthOutcome, CephError> {
    let outcome = poll_until(policy, move || async move {
        let health = ceph.health().await?;
        Ok::<_, CephError>(if health.is_healthy() {
            Check::Ready(())
        } else {
            Check::Pending(health)
        })
    })
    .await?;

    Ok(match outcome {
        PollOutcome::Ready { polls, .. } => {
            info!("Cluster healthy after {} polls", polls);
            HealthOutcome::Healthy { polls }
        }
        PollOutcome::TimedOut { last, .. } => {
            warn!("Cluster not healthy after {:?}: {:?}", policy.timeout, last);
            HealthOutcome::Unhealthy { last }
        }
    })
}

/// Fail-closed gate: anything short of HEALTH_OK within the policy is an error
pub async fn require_healthy(
    ceph: CephClient<'_>,
    policy: PollPolicy,
) -> Result<(), OrchestratorError> {
    match wait_for_healthy(ceph, policy).await? {
        HealthOutcome::Healthy { .. } => Ok(()),
        unhealthy => Err(OrchestratorError::Unhealthy {
            status: unhealthy.status_text(),
        }),
    }
}

/// Poll `ceph orch ls` until every service runs its expected number of
/// daemons. Returns how many services were checked.
pub async fn wait_for_services(
    ceph: CephClient<'_>,
    policy: PollPolicy,
) -> Result<usize, OrchestratorError> {
    let outcome = poll_until(policy, move || async move {
        let services = ceph.services().await?;
        let pending: Vec<String> = services
            .iter()
            .filter(|s| !s.is_converged())
            .map(|s| format!("{} ({}/{})", s.name, s.status.running, s.status.size))
            .collect();

        Ok::<_, OrchestratorError>(if pending.is_empty() {
            Check::Ready(services.len())
        } else {
            Check::Pending(pending)
        })
    })
    .await?;

    match outcome {
        PollOutcome::Ready { value, polls } => {
            info!("{} services running after {} polls", value, polls);
            Ok(value)
        }
        PollOutcome::TimedOut { last, .. } => Err(OrchestratorError::ServiceConvergenceTimeout {
            pending: last.unwrap_or_default(),
            waited: policy.timeout,
        }),
    }
}
