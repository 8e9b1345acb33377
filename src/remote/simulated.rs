//! Simulated cluster backends
//!
//! Scripted stand-ins for the remote command channel, the reachability probe,
//! the wake broadcaster and the progress reporter. The orchestrator is driven
//! against these in unit and integration tests; none of them touch the network.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Connector, RemoteError, RemoteSession};
use crate::config::NodeConfig;
use crate::orchestrator::{Progress, ReachabilityProbe, Stage};
use crate::wol::{WakeBroadcaster, WakeError};

/// Scripted answer to one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Zero exit with this stdout
    Ok(String),
    /// Non-zero exit; the string is the partial output captured
    Fail(String),
}

impl Reply {
    pub fn ok(output: impl Into<String>) -> Self {
        Reply::Ok(output.into())
    }

    pub fn fail(output: impl Into<String>) -> Self {
        Reply::Fail(output.into())
    }
}

/// What the script sees for each command
#[derive(Debug)]
pub struct Request<'a> {
    pub node: &'a str,
    pub command: &'a str,
    /// How many times this exact command ran before, on any node
    pub attempt: usize,
}

/// One command as observed by the simulated cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    pub node: String,
    pub command: String,
}

type Script = dyn Fn(&Request<'_>) -> Reply + Send + Sync;

struct Inner {
    script: Box<Script>,
    log: Mutex<Vec<Executed>>,
    attempts: Mutex<HashMap<String, usize>>,
    unreachable: Mutex<HashSet<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl Inner {
    fn record(&self, node: &str, command: &str) -> usize {
        if let Ok(mut log) = self.log.lock() {
            log.push(Executed {
                node: node.to_string(),
                command: command.to_string(),
            });
        }
        match self.attempts.lock() {
            Ok(mut attempts) => {
                let count = attempts.entry(command.to_string()).or_insert(0);
                let attempt = *count;
                *count += 1;
                attempt
            }
            Err(_) => 0,
        }
    }
}

/// A scripted cluster. Cloning shares the same script and command log.
#[derive(Clone)]
pub struct SimulatedCluster {
    inner: Arc<Inner>,
}

impl SimulatedCluster {
    pub fn new(script: impl Fn(&Request<'_>) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                script: Box::new(script),
                log: Mutex::new(Vec::new()),
                attempts: Mutex::new(HashMap::new()),
                unreachable: Mutex::new(HashSet::new()),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }),
        }
    }

    /// Make `connect` to this node fail
    pub fn with_unreachable(self, node: &str) -> Self {
        if let Ok(mut set) = self.inner.unreachable.lock() {
            set.insert(node.to_lowercase());
        }
        self
    }

    /// Open a session directly, without a NodeConfig
    pub fn session(&self, node: &str) -> Box<dyn RemoteSession> {
        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(SimulatedSession {
            node: node.to_string(),
            inner: Arc::clone(&self.inner),
            closed: false,
        })
    }

    /// Every command run so far, in order
    pub fn commands(&self) -> Vec<Executed> {
        self.inner.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Commands run on one node, in order
    pub fn commands_on(&self, node: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|e| e.node == node)
            .map(|e| e.command)
            .collect()
    }

    /// How many times a command ran, on any node
    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|e| e.command == command).count()
    }

    pub fn sessions_opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for SimulatedCluster {
    async fn connect(&self, node: &NodeConfig) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let unreachable = self
            .inner
            .unreachable
            .lock()
            .map(|set| set.contains(&node.name.to_lowercase()))
            .unwrap_or(false);

        if unreachable {
            return Err(RemoteError::Connect {
                node: node.name.clone(),
                message: "connection refused".to_string(),
            });
        }

        Ok(self.session(&node.name))
    }
}

struct SimulatedSession {
    node: String,
    inner: Arc<Inner>,
    closed: bool,
}

#[async_trait]
impl RemoteSession for SimulatedSession {
    fn node(&self) -> &str {
        &self.node
    }

    async fn execute(&self, command: &str) -> Result<String, RemoteError> {
        let attempt = self.inner.record(&self.node, command);
        let request = Request {
            node: &self.node,
            command,
            attempt,
        };

        match (self.inner.script)(&request) {
            Reply::Ok(output) => Ok(output),
            Reply::Fail(output) => Err(RemoteError::Command {
                node: self.node.clone(),
                command: command.to_string(),
                output,
                message: "exit status 1".to_string(),
            }),
        }
    }

    /// Runs `cat <remote_path>` through the script and writes its output locally
    async fn transfer(&self, remote_path: &str, local_path: &Path) -> Result<(), RemoteError> {
        let content = self
            .execute(&format!("cat {}", remote_path))
            .await
            .map_err(|e| RemoteError::Transfer {
                node: self.node.clone(),
                remote_path: remote_path.to_string(),
                message: e.to_string(),
            })?;
        tokio::fs::write(local_path, content).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        if !self.closed {
            self.closed = true;
            self.inner.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        if !self.closed {
            self.inner.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Reachability probe with a fixed connect latency per node. Nodes without a
/// latency refuse connections.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProbe {
    latencies: HashMap<String, Duration>,
}

impl SimulatedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, node: &str, latency: Duration) -> Self {
        self.latencies.insert(node.to_string(), latency);
        self
    }
}

#[async_trait]
impl ReachabilityProbe for SimulatedProbe {
    async fn probe(&self, node: &NodeConfig) -> io::Result<()> {
        match self.latencies.get(&node.name) {
            Some(latency) => {
                tokio::time::sleep(*latency).await;
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{} refused connection", node.name),
            )),
        }
    }
}

/// Records every hardware address it is asked to wake
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<String>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WakeBroadcaster for RecordingBroadcaster {
    async fn broadcast(&self, mac: &str) -> Result<(), WakeError> {
        crate::wol::parse_mac(mac)?;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mac.to_string());
        }
        Ok(())
    }
}

/// Something the orchestrator reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Stage(Stage),
    Detail(String),
    Warning(String),
}

/// Progress sink that keeps everything it is told
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<Event>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Stages only, in the order they were entered
    pub fn stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Stage(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn details(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Detail(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Progress for RecordingProgress {
    fn stage(&self, stage: Stage) {
        self.push(Event::Stage(stage));
    }

    fn detail(&self, message: &str) {
        self.push(Event::Detail(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(Event::Warning(message.to_string()));
    }
}
