//! Reachability probing
//!
//! Nodes are probed concurrently; the first one to accept a connection wins
//! and the remaining attempts are dropped.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::select_ok;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::poll::{poll_until, Check, PollOutcome, PollPolicy};
use super::OrchestratorError;
use crate::config::{NodeConfig, Timeouts};

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Succeeds once the node accepts a connection on its remote-access port
    async fn probe(&self, node: &NodeConfig) -> io::Result<()>;
}

/// Plain TCP connect to the node's SSH port
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self, node: &NodeConfig) -> io::Result<()> {
        TcpStream::connect(node.socket_addr()).await.map(drop)
    }
}

/// One round: probe every node at once and return the first to answer within
/// `attempt_timeout`. `None` if nobody answered.
pub async fn first_reachable<'n>(
    probe: &dyn ReachabilityProbe,
    nodes: &'n [NodeConfig],
    attempt_timeout: Duration,
) -> Option<&'n NodeConfig> {
    if nodes.is_empty() {
        return None;
    }

    let attempts = nodes.iter().map(|node| {
        Box::pin(async move {
            match timeout(attempt_timeout, probe.probe(node)).await {
                Ok(Ok(())) => Ok(node),
                Ok(Err(e)) => {
                    debug!("{} not reachable: {}", node.name, e);
                    Err(e)
                }
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} did not answer within {:?}", node.name, attempt_timeout),
                )),
            }
        })
    });

    select_ok(attempts).await.ok().map(|(node, _abandoned)| node)
}

/// Repeat [`first_reachable`] every retry interval until a node answers or
/// the overall reachability timeout elapses
pub async fn await_reachable<'n>(
    probe: &dyn ReachabilityProbe,
    nodes: &'n [NodeConfig],
    timeouts: &Timeouts,
) -> Result<&'n NodeConfig, OrchestratorError> {
    let attempt = timeouts.probe_attempt();
    let policy = PollPolicy {
        interval: timeouts.reachability_retry(),
        timeout: timeouts.reachability(),
    };

    let outcome = poll_until(policy, move || async move {
        Ok::<_, OrchestratorError>(match first_reachable(probe, nodes, attempt).await {
            Some(node) => Check::Ready(node),
            None => Check::Pending(()),
        })
    })
    .await?;

    match outcome {
        PollOutcome::Ready { value, polls } => {
            info!("{} reachable after {} probe rounds", value.name, polls);
            Ok(value)
        }
        PollOutcome::TimedOut { .. } => Err(OrchestratorError::NoNodeReachable {
            waited: policy.timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::simulated::SimulatedProbe;
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    fn three_nodes() -> Vec<NodeConfig> {
        vec![
            NodeConfig::new("ceph-1", "10.0.0.1"),
            NodeConfig::new("ceph-2", "10.0.0.2"),
            NodeConfig::new("ceph-3", "10.0.0.3"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_fastest_node_wins() {
        let nodes = three_nodes();
        let probe = SimulatedProbe::new()
            .with_latency("ceph-1", Duration::from_millis(250))
            .with_latency("ceph-2", Duration::from_millis(100))
            .with_latency("ceph-3", Duration::from_millis(200));

        let start = Instant::now();
        let node = first_reachable(&probe, &nodes, Duration::from_millis(300)).await;

        assert_eq!(node.map(|n| n.name.as_str()), Some("ceph-2"));
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_nodes_time_out() {
        let nodes = three_nodes();
        let probe = SimulatedProbe::new().with_latency("ceph-1", Duration::from_secs(5));

        let node = first_reachable(&probe, &nodes, Duration::from_millis(300)).await;
        assert!(node.is_none());
    }

    #[tokio::test]
    async fn test_empty_list_is_unreachable() {
        let probe = SimulatedProbe::new();
        assert!(first_reachable(&probe, &[], Duration::from_millis(300))
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_reachable_times_out() {
        let nodes = three_nodes();
        let probe = SimulatedProbe::new();
        let timeouts = Timeouts::default();

        let start = Instant::now();
        let err = await_reachable(&probe, &nodes, &timeouts).await.unwrap_err();

        assert!(matches!(err, OrchestratorError::NoNodeReachable { .. }));
        let elapsed = start.elapsed();
        assert!(elapsed >= timeouts.reachability());
        assert!(elapsed < timeouts.reachability() + Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_tcp_probe_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let node = NodeConfig::new("local", &format!("127.0.0.1:{}", port));

        TcpProbe.probe(&node).await.unwrap();
    }
}
