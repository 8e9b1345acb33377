//! OpenSSH-backed remote sessions
//!
//! Drives the system `ssh`/`scp` binaries. A session owns one multiplexed
//! master connection (ControlMaster); every command is a fresh `ssh` process
//! over that connection. Password credentials go through `sshpass -e`.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use super::{Connector, RemoteError, RemoteSession};
use crate::config::NodeConfig;

/// How long an idle master connection lingers if `close` is never reached
const CONTROL_PERSIST_SECS: u64 = 60;

/// Connect timeout handed to ssh itself
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Opens [`SshSession`]s. Control sockets and pinned known-hosts files live in
/// a private, randomly named directory that is removed with the connector.
#[derive(Debug)]
pub struct SshConnector {
    runtime_dir: TempDir,
    next_session: AtomicU64,
}

impl SshConnector {
    pub fn new() -> std::io::Result<Self> {
        let runtime_dir = tempfile::Builder::new().prefix("labctl-").tempdir()?;
        debug!("SSH runtime dir {}", runtime_dir.path().display());
        Ok(Self {
            runtime_dir,
            next_session: AtomicU64::new(0),
        })
    }

    /// Each session gets its own master, so closing one never tears down
    /// another live session to the same node
    fn control_path(&self, node: &NodeConfig) -> PathBuf {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.runtime_dir
            .path()
            .join(format!("{}-{}.sock", node.name, id))
    }

    async fn write_known_hosts(&self, node: &NodeConfig) -> std::io::Result<Option<PathBuf>> {
        let Some(key) = &node.host_key else {
            return Ok(None);
        };
        let path = self
            .runtime_dir
            .path()
            .join(format!("{}.known_hosts", node.name));
        tokio::fs::write(&path, known_hosts_line(node.host(), node.port(), key)).await?;
        Ok(Some(path))
    }
}

/// Render a known_hosts line for a pinned key. Non-default ports use the
/// bracketed form ssh expects.
pub fn known_hosts_line(host: &str, port: u16, host_key: &str) -> String {
    if port == crate::config::cluster::DEFAULT_SSH_PORT {
        format!("{} {}\n", host, host_key.trim())
    } else {
        format!("[{}]:{} {}\n", host, port, host_key.trim())
    }
}

/// Build the `-o`/`-i` options shared by ssh and scp for a node
fn build_ssh_options(
    node: &NodeConfig,
    control_path: &Path,
    known_hosts: Option<&Path>,
) -> Vec<String> {
    let mut opts = vec![
        "-o".to_string(),
        format!("ConnectTimeout={}", CONNECT_TIMEOUT_SECS),
        "-o".to_string(),
        "ControlMaster=auto".to_string(),
        "-o".to_string(),
        format!("ControlPath={}", control_path.display()),
        "-o".to_string(),
        format!("ControlPersist={}", CONTROL_PERSIST_SECS),
    ];

    // BatchMode disables password prompts, which sshpass needs
    if node.password.is_none() {
        opts.push("-o".to_string());
        opts.push("BatchMode=yes".to_string());
    }

    if let Some(key) = &node.private_key_file {
        opts.push("-i".to_string());
        opts.push(shellexpand::tilde(key).into_owned());
    }

    if let Some(path) = known_hosts {
        opts.push("-o".to_string());
        opts.push(format!("UserKnownHostsFile={}", path.display()));
        opts.push("-o".to_string());
        opts.push("StrictHostKeyChecking=yes".to_string());
    }

    opts
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, node: &NodeConfig) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let control_path = self.control_path(node);
        let known_hosts = self.write_known_hosts(node).await?;

        let session = SshSession {
            node: node.name.clone(),
            host: node.host().to_string(),
            port: node.port(),
            username: node.username.clone(),
            password: node.password.clone(),
            options: build_ssh_options(node, &control_path, known_hosts.as_deref()),
            control_path,
            closed: false,
        };

        // Establishes the master connection that later commands reuse
        debug!("Connecting to {} ({}:{})", session.node, session.host, session.port);
        let output = session
            .ssh_command()
            .arg("true")
            .output()
            .await
            .map_err(|e| RemoteError::Connect {
                node: session.node.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RemoteError::Connect {
                node: session.node.clone(),
                message: failure_message(&output),
            });
        }

        Ok(Box::new(session))
    }
}

/// A session to one node over a multiplexed OpenSSH connection
pub struct SshSession {
    node: String,
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    options: Vec<String>,
    control_path: PathBuf,
    closed: bool,
}

impl SshSession {
    /// `ssh` or `sshpass -e ssh`, with the password in the environment
    fn program(&self, tool: &str) -> Command {
        match &self.password {
            Some(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg(tool).env("SSHPASS", password);
                cmd
            }
            None => Command::new(tool),
        }
    }

    fn ssh_command(&self) -> Command {
        let mut cmd = self.program("ssh");
        cmd.args(&self.options)
            .arg("-p")
            .arg(self.port.to_string())
            .arg("-l")
            .arg(&self.username)
            .arg(&self.host)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn scp_source(&self, remote_path: &str) -> String {
        if self.host.contains(':') {
            format!("{}@[{}]:{}", self.username, self.host, remote_path)
        } else {
            format!("{}@{}:{}", self.username, self.host, remote_path)
        }
    }

    /// Tear down the master connection synchronously
    fn exit_master_blocking(&self) {
        let result = std::process::Command::new("ssh")
            .arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .args(["-O", "exit"])
            .arg(&self.host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        if let Err(e) = result {
            warn!("Failed to release connection to {}: {}", self.node, e);
        }
    }
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exit code {}", output.status.code().unwrap_or(-1))
    } else {
        stderr
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn node(&self) -> &str {
        &self.node
    }

    async fn execute(&self, command: &str) -> Result<String, RemoteError> {
        debug!("[{}] $ {}", self.node, command);

        let output = self
            .ssh_command()
            .arg(command)
            .output()
            .await
            .map_err(|e| RemoteError::Command {
                node: self.node.clone(),
                command: command.to_string(),
                output: String::new(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!("[{}] {}", self.node, stdout.trim_end());

        if !output.status.success() {
            return Err(RemoteError::Command {
                node: self.node.clone(),
                command: command.to_string(),
                output: stdout,
                message: failure_message(&output),
            });
        }

        Ok(stdout)
    }

    async fn transfer(&self, remote_path: &str, local_path: &Path) -> Result<(), RemoteError> {
        debug!("[{}] copy {} -> {}", self.node, remote_path, local_path.display());

        let output = self
            .program("scp")
            .args(&self.options)
            .arg("-P")
            .arg(self.port.to_string())
            .arg(self.scp_source(remote_path))
            .arg(local_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RemoteError::Transfer {
                node: self.node.clone(),
                remote_path: remote_path.to_string(),
                message: failure_message(&output),
            });
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let status = Command::new("ssh")
            .arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .args(["-O", "exit"])
            .arg(&self.host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        // A master that already went away is not an error
        if !status.success() {
            debug!("No master connection left for {}", self.node);
        }
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if !self.closed {
            self.exit_master_blocking();
        }
    }
}
