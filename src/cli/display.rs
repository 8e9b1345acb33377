//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use super::commands::{BackupOutcome, ClusterStatus, CommandError};
use crate::ceph::{Daemon, MaintenanceTransition, Service};
use crate::orchestrator::{BootReport, ErrorClass, Stage};

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found.\n".to_string();
    }

    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();

    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            output.push_str("   ");
        }
        output.push_str(&format!(
            "{:width$}",
            header.to_uppercase(),
            width = widths[i]
        ));
    }
    output.push('\n');

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                output.push_str("   ");
            }
            if i < widths.len() {
                output.push_str(&format!("{:width$}", cell, width = widths[i]));
            } else {
                output.push_str(cell);
            }
        }
        output.push('\n');
    }

    output
}

// ============================================================================
// Progress lines
// ============================================================================

/// One line announcing a stage
pub fn format_stage(stage: Stage) -> String {
    let line = match stage {
        Stage::ConfirmIntent => "🛑 Preparing to shut down the cluster",
        Stage::ConnectControlSession => "🔌 Connecting to the cluster",
        Stage::HealthCheck => "🩺 Checking cluster health",
        Stage::SetFlags => "🚩 Setting cluster-wide OSD flags",
        Stage::DrainAncillaryService => "💥 Stopping crash service",
        Stage::DrainStorageDaemons => "💾 Stopping OSD daemons",
        Stage::DrainMonitors => "👁  Stopping monitor daemons",
        Stage::PowerOffAllNodes => "⚡ Powering off all nodes",
        Stage::BroadcastWake => "📣 Sending wake-on-LAN packets",
        Stage::AwaitReachability => "⏳ Waiting for a node to come up",
        Stage::AwaitServiceConvergence => "⏳ Waiting for services to start",
        Stage::UnsetFlags => "🏳  Unsetting cluster-wide OSD flags",
        Stage::AwaitHealthy => "🩺 Waiting for the cluster to become healthy",
        Stage::CheckMaintenance => "🔎 Checking maintenance mode",
        Stage::PowerOffNode => "⚡ Powering off node",
        Stage::EnterMaintenance => "🔧 Entering maintenance mode",
        Stage::ExitMaintenance => "🔧 Exiting maintenance mode",
        Stage::SnapshotEtcd => "⚡ Snapshotting etcd database",
        Stage::CompressSnapshot => "📦 Compressing snapshot with zstd",
        Stage::DownloadSnapshot => "⌛ Downloading snapshot",
        Stage::VerifyIntegrity => "🔍 Checking file integrity",
        Stage::Done => "✅ Done",
    };
    line.to_string()
}

pub fn format_detail(message: &str) -> String {
    format!("   ↳ {}", message)
}

pub fn format_warning(message: &str) -> String {
    format!("⚠️  {}", message)
}

pub fn format_confirm_prompt(question: &str) -> String {
    format!("❓ {} (y/n) [n] ", question)
}

// ============================================================================
// Results
// ============================================================================

pub fn format_boot_report(report: &BootReport) -> String {
    if report.is_healthy() {
        format!("Cluster is up and healthy (via {})\n", report.control_node)
    } else {
        format!(
            "Cluster is up but not yet healthy: {} (via {})\n",
            report.health.status_text(),
            report.control_node
        )
    }
}

pub fn format_maintenance_transition(node: &str, transition: MaintenanceTransition) -> String {
    match transition {
        MaintenanceTransition::Entered => format!("{} is now in maintenance mode\n", node),
        MaintenanceTransition::Exited => format!("{} has left maintenance mode\n", node),
        MaintenanceTransition::AlreadyInMaintenance => {
            format!("{} is already in maintenance mode\n", node)
        }
        MaintenanceTransition::NotInMaintenance => {
            format!("{} is not in maintenance mode\n", node)
        }
    }
}

pub fn format_maintenance_status(node: &str, in_maintenance: bool) -> String {
    if in_maintenance {
        format!("{} is in maintenance mode\n", node)
    } else {
        format!("{} is not in maintenance mode\n", node)
    }
}

pub fn format_backup_outcome(outcome: &BackupOutcome) -> String {
    match outcome {
        BackupOutcome::Saved(path) => format!("Snapshot saved at {}\n", path.display()),
        BackupOutcome::NotOverwritten(path) => {
            format!("Not overwriting {}\n", path.display())
        }
    }
}

// ============================================================================
// Cluster status
// ============================================================================

pub fn format_service_list(services: &[Service]) -> String {
    let headers = &["NAME", "RUNNING", "SIZE"];
    let rows: Vec<Vec<String>> = services
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.status.running.to_string(),
                s.status.size.to_string(),
            ]
        })
        .collect();

    format_table(headers, rows)
}

pub fn format_daemon_list(daemons: &[Daemon]) -> String {
    let headers = &["NAME", "HOST", "STATUS"];
    let rows: Vec<Vec<String>> = daemons
        .iter()
        .map(|d| vec![d.name(), d.host.clone(), d.state()])
        .collect();

    format_table(headers, rows)
}

pub fn format_cluster_status(status: &ClusterStatus) -> String {
    let mut output = String::new();

    output.push_str(&format!("Health:  {}\n", status.health));
    output.push_str(&format!("Via:     {}\n", status.control_node));
    output.push_str("\nServices:\n");
    output.push_str(&format_service_list(&status.services));
    output.push_str("\nDaemons:\n");
    output.push_str(&format_daemon_list(&status.daemons));

    output
}

// ============================================================================
// Errors
// ============================================================================

/// Error line plus a hint about what state the cluster was left in
pub fn format_error(err: &CommandError) -> String {
    let hint = match err {
        CommandError::Orchestrator(e) => match e.class() {
            ErrorClass::Precondition => Some("nothing was changed"),
            ErrorClass::Verification => Some("the cluster may be partially changed"),
            ErrorClass::Connectivity => None,
        },
        _ => None,
    };

    match hint {
        Some(hint) => format!("❌ {} ({})", err, hint),
        None => format!("❌ {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ceph::{HealthStatus, ServiceStatus};
    use crate::orchestrator::{HealthOutcome, OrchestratorError};

    #[test]
    fn test_format_table() {
        let output = format_table(
            &["name", "host"],
            vec![
                vec!["osd.0".to_string(), "ceph-1".to_string()],
                vec!["mon.ceph-2".to_string(), "ceph-2".to_string()],
            ],
        );
        assert_eq!(
            output,
            "NAME         HOST  \nosd.0        ceph-1\nmon.ceph-2   ceph-2\n"
        );
    }

    #[test]
    fn test_format_table_empty() {
        assert_eq!(format_table(&["NAME"], vec![]), "No resources found.\n");
    }

    #[test]
    fn test_format_detail_and_prompt() {
        assert_eq!(format_detail("noout"), "   ↳ noout");
        assert_eq!(
            format_confirm_prompt("Shut down all 3 nodes of the cluster?"),
            "❓ Shut down all 3 nodes of the cluster? (y/n) [n] "
        );
    }

    #[test]
    fn test_format_boot_report_unhealthy() {
        let report = BootReport {
            control_node: "ceph-1".to_string(),
            health: HealthOutcome::Unhealthy {
                last: Some(HealthStatus("HEALTH_WARN 1 pgs degraded".to_string())),
            },
        };
        assert_eq!(
            format_boot_report(&report),
            "Cluster is up but not yet healthy: HEALTH_WARN 1 pgs degraded (via ceph-1)\n"
        );
    }

    #[test]
    fn test_format_backup_outcome() {
        let saved = BackupOutcome::Saved("/backup/etcd.db.zst".into());
        assert_eq!(
            format_backup_outcome(&saved),
            "Snapshot saved at /backup/etcd.db.zst\n"
        );
    }

    #[test]
    fn test_format_cluster_status() {
        let status = ClusterStatus {
            control_node: "ceph-1".to_string(),
            health: HealthStatus("HEALTH_OK".to_string()),
            services: vec![Service {
                name: "mon".to_string(),
                status: ServiceStatus { running: 3, size: 3 },
            }],
            daemons: vec![],
        };

        let output = format_cluster_status(&status);
        assert!(output.starts_with("Health:  HEALTH_OK\n"));
        assert!(output.contains("NAME   RUNNING   SIZE\nmon    3         3   \n"));
        assert!(output.ends_with("Daemons:\nNo resources found.\n"));
    }

    #[test]
    fn test_format_error_hints() {
        let err = CommandError::Orchestrator(OrchestratorError::Unhealthy {
            status: "HEALTH_WARN".to_string(),
        });
        assert_eq!(
            format_error(&err),
            "❌ Cluster is not healthy: HEALTH_WARN (nothing was changed)"
        );
    }
}
