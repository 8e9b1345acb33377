//! Remote command channel
//!
//! The orchestrator never talks to a transport directly. It asks a
//! [`Connector`] for a [`RemoteSession`] bound to one node, runs command
//! strings through it, and closes it when done. A failed command still carries
//! whatever output was captured, because several callers classify failures by
//! inspecting that text.

#[cfg(any(test, feature = "simulated"))]
pub mod simulated;
pub mod ssh;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::NodeConfig;

pub use ssh::{SshConnector, SshSession};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Connection to {node} failed: {message}")]
    Connect { node: String, message: String },

    /// Non-zero exit, or the command could not be run. `output` holds
    /// whatever was captured before the failure.
    #[error("Command `{command}` failed on {node}: {message}")]
    Command {
        node: String,
        command: String,
        output: String,
        message: String,
    },

    #[error("Transfer of {remote_path} from {node} failed: {message}")]
    Transfer {
        node: String,
        remote_path: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Partial output captured by a failed command, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            RemoteError::Command { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// A live command channel bound to one node.
///
/// Each `execute` is its own logical session on the underlying transport, so
/// output from one command never interleaves with another.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Name of the node this session is bound to
    fn node(&self) -> &str;

    /// Run a command and return its captured standard output
    async fn execute(&self, command: &str) -> Result<String, RemoteError>;

    /// Copy `remote_path` on the node to `local_path` on this machine
    async fn transfer(&self, remote_path: &str, local_path: &Path) -> Result<(), RemoteError>;

    /// Release the session. Implementations must also release on drop.
    async fn close(&mut self) -> Result<(), RemoteError>;
}

/// Opens sessions to configured nodes
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, node: &NodeConfig) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// Close a session, logging instead of failing. Used once the work done over
/// the session has already succeeded or failed on its own terms.
pub async fn close_quietly(mut session: Box<dyn RemoteSession>) {
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close session to {}: {}", session.node(), e);
    }
}
