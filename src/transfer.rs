//! Verified file copies off a node, and the etcd backup built on them
//!
//! A copy is only trusted once its local SHA-512 matches `sha512sum` run on the
//! node. A copy that fails the check is removed locally.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha512};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::orchestrator::{Progress, Stage};
use crate::remote::{RemoteError, RemoteSession};

/// Length of a hex-encoded SHA-512 digest
const SHA512_HEX_LEN: usize = 128;

/// Where kubeadm keeps the etcd client certificates
const ETCD_PKI_DIR: &str = "/etc/kubernetes/pki/etcd";

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("{step} failed: {source}")]
    Remote {
        step: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("Unexpected sha512sum output: {0:?}")]
    MalformedChecksum(String),

    #[error("SHA-512 of {remote_path} does not match the local copy (remote {remote}, local {local})")]
    ChecksumMismatch {
        remote_path: String,
        remote: String,
        local: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn step(step: &'static str) -> impl FnOnce(RemoteError) -> TransferError {
    move |source| TransferError::Remote { step, source }
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Remote scratch path for a snapshot taken at `millis` since the epoch
pub fn snapshot_path(millis: u128) -> String {
    format!("/tmp/etcd-backup-{}.db", millis)
}

pub fn snapshot_command(path: &str) -> String {
    format!(
        "sudo etcdctl --cacert={pki}/ca.crt --cert={pki}/server.crt --key={pki}/server.key \
         snapshot save {path}",
        pki = ETCD_PKI_DIR,
        path = path
    )
}

/// Local file name for a backup; compressed backups always end in `.zst`
pub fn backup_destination(path: &Path, compress: bool) -> PathBuf {
    let has_zst = path.extension().is_some_and(|ext| ext == "zst");
    if compress && !has_zst {
        let mut name = path.as_os_str().to_os_string();
        name.push(".zst");
        PathBuf::from(name)
    } else {
        path.to_path_buf()
    }
}

/// `sha512sum` prints `<hash>  <file>`
pub fn parse_sha512sum(output: &str) -> Result<String, TransferError> {
    let hash = output.split_whitespace().next().unwrap_or_default();
    if hash.len() == SHA512_HEX_LEN && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(hash.to_ascii_lowercase())
    } else {
        Err(TransferError::MalformedChecksum(output.trim().to_string()))
    }
}

// ============================================================================
// I/O
// ============================================================================

/// Hex SHA-512 of a local file, hashed off the async runtime
pub async fn sha512_file(path: &Path) -> std::io::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha512::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}

/// Compare `local` with `remote_path` on the session's node. Returns the
/// digest; a mismatching local copy is deleted.
pub async fn verify_copy(
    session: &dyn RemoteSession,
    remote_path: &str,
    local: &Path,
) -> Result<String, TransferError> {
    let output = session
        .execute(&format!("sha512sum {}", remote_path))
        .await
        .map_err(step("sha512sum"))?;
    let remote = parse_sha512sum(&output)?;
    let local_hash = sha512_file(local).await?;

    if remote != local_hash {
        if let Err(e) = tokio::fs::remove_file(local).await {
            warn!("Failed to remove corrupt copy {}: {}", local.display(), e);
        }
        return Err(TransferError::ChecksumMismatch {
            remote_path: remote_path.to_string(),
            remote,
            local: local_hash,
        });
    }

    debug!("[{}] {} verified", session.node(), remote_path);
    Ok(remote)
}

/// Copy a file off the node and check it arrived intact
pub async fn fetch_verified(
    session: &dyn RemoteSession,
    remote_path: &str,
    local: &Path,
) -> Result<(), TransferError> {
    session
        .transfer(remote_path, local)
        .await
        .map_err(step("copy"))?;
    verify_copy(session, remote_path, local).await.map(drop)
}

/// Snapshot etcd into `snapshot` on the node, optionally compress it, download
/// it to `local`, verify it, then delete the remote copy. `owner` receives the
/// snapshot so the unprivileged copy can read it.
pub async fn backup_etcd(
    session: &dyn RemoteSession,
    progress: &dyn Progress,
    snapshot: &str,
    owner: &str,
    compress: bool,
    local: &Path,
) -> Result<(), TransferError> {
    progress.stage(Stage::SnapshotEtcd);
    session
        .execute(&snapshot_command(snapshot))
        .await
        .map_err(step("etcd snapshot"))?;
    session
        .execute(&format!("sudo chown {0}:{0} {1}", owner, snapshot))
        .await
        .map_err(step("chown"))?;

    let mut snapshot = snapshot.to_string();
    if compress {
        progress.stage(Stage::CompressSnapshot);
        session
            .execute(&format!("zstd --rm {}", snapshot))
            .await
            .map_err(step("zstd"))?;
        snapshot.push_str(".zst");
    }

    progress.stage(Stage::DownloadSnapshot);
    session
        .transfer(&snapshot, local)
        .await
        .map_err(step("download snapshot"))?;

    progress.stage(Stage::VerifyIntegrity);
    verify_copy(session, &snapshot, local).await?;

    session
        .execute(&format!("rm {}", snapshot))
        .await
        .map_err(step("delete remote copy"))?;

    info!("Saved etcd snapshot to {}", local.display());
    progress.stage(Stage::Done);
    Ok(())
}
