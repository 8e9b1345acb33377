//! Cluster-wide OSD flag sequencing
//!
//! Ceph answers `osd set` for a flag that is already set, and `osd unset` for
//! one that was never set, with the same confirmation as a real change, so
//! repeating a sequence is safe.

use tracing::info;

use super::Progress;
use crate::ceph::{CephClient, CephError, FlagAction, OsdFlag};

/// Toggle each flag in order, verifying every echo before moving on. The
/// first failure stops the sequence; earlier flags stay as they are.
pub async fn apply_flags(
    ceph: CephClient<'_>,
    action: FlagAction,
    flags: &[OsdFlag],
    progress: &dyn Progress,
) -> Result<(), CephError> {
    for flag in flags {
        ceph.toggle_flag(*flag, action).await?;
        info!("ceph osd {} {} verified", action.verb(), flag);
        progress.detail(flag.as_str());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::simulated::{RecordingProgress, Reply, SimulatedCluster};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    fn echo_sentinels(command: &str) -> Reply {
        for action in [FlagAction::Set, FlagAction::Unset] {
            for flag in OsdFlag::ALL {
                if command == format!("sudo ceph osd {} {} 2>&1", action.verb(), flag) {
                    return Reply::ok(format!("{}\n", flag.sentinel(action)));
                }
            }
        }
        Reply::fail("unknown command")
    }

    #[tokio::test]
    async fn test_sets_all_flags_in_order() {
        let sim = SimulatedCluster::new(|req| echo_sentinels(req.command));
        let session = sim.session("ceph-1");
        let progress = RecordingProgress::new();

        apply_flags(
            CephClient::new(session.as_ref()),
            FlagAction::Set,
            &OsdFlag::ALL,
            &progress,
        )
        .await
        .unwrap();

        let commands = sim.commands_on("ceph-1");
        assert_eq!(commands.len(), 6);
        assert_eq!(commands[0], "sudo ceph osd set noout 2>&1");
        assert_eq!(commands[5], "sudo ceph osd set pause 2>&1");
        assert_eq!(
            progress.details(),
            vec!["noout", "nodown", "nobackfill", "norecover", "norebalance", "pause"]
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_unverified_flag() {
        let sim = SimulatedCluster::new(|req| match req.command {
            "sudo ceph osd unset nobackfill 2>&1" => Reply::ok("Error EPERM\n"),
            other => echo_sentinels(other),
        });
        let session = sim.session("ceph-1");
        let progress = RecordingProgress::new();

        let err = apply_flags(
            CephClient::new(session.as_ref()),
            FlagAction::Unset,
            &OsdFlag::ALL,
            &progress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CephError::FlagNotVerified { flag: "nobackfill", .. }));
        assert_eq!(sim.commands().len(), 3);
        assert_eq!(progress.details(), vec!["noout", "nodown"]);
    }

    /// A monitor that tracks which flags are set and confirms every request
    fn flag_store() -> (SimulatedCluster, Arc<Mutex<HashSet<&'static str>>>) {
        let set = Arc::new(Mutex::new(HashSet::new()));
        let state = Arc::clone(&set);
        let sim = SimulatedCluster::new(move |req| {
            for flag in OsdFlag::ALL {
                for action in [FlagAction::Set, FlagAction::Unset] {
                    if req.command != format!("sudo ceph osd {} {} 2>&1", action.verb(), flag) {
                        continue;
                    }
                    let mut flags = state.lock().unwrap();
                    match action {
                        FlagAction::Set => flags.insert(flag.as_str()),
                        FlagAction::Unset => flags.remove(flag.as_str()),
                    };
                    return Reply::ok(format!("{}\n", flag.sentinel(action)));
                }
            }
            Reply::fail("unknown command")
        });
        (sim, set)
    }

    #[tokio::test]
    async fn test_setting_twice_is_idempotent() {
        let (sim, flags) = flag_store();
        let session = sim.session("ceph-1");
        let progress = RecordingProgress::new();

        for _ in 0..2 {
            apply_flags(
                CephClient::new(session.as_ref()),
                FlagAction::Set,
                &OsdFlag::ALL,
                &progress,
            )
            .await
            .unwrap();
        }

        assert_eq!(flags.lock().unwrap().len(), 6);
        assert_eq!(sim.count("sudo ceph osd set pause 2>&1"), 2);
        assert_eq!(progress.details().len(), 12);
    }

    #[tokio::test]
    async fn test_unsetting_never_set_flags_succeeds() {
        let (sim, flags) = flag_store();
        let session = sim.session("ceph-1");
        let progress = RecordingProgress::new();

        apply_flags(
            CephClient::new(session.as_ref()),
            FlagAction::Unset,
            &OsdFlag::ALL,
            &progress,
        )
        .await
        .unwrap();

        assert!(flags.lock().unwrap().is_empty());
        assert_eq!(sim.commands().len(), 6);
        assert_eq!(sim.count("sudo ceph osd unset pause 2>&1"), 1);
        assert_eq!(progress.details().last().map(String::as_str), Some("pause"));
    }
}
