//! CLI module for labctl
//!
//! Provides subcommands for the homelab Ceph cluster:
//! - `labctl ceph boot` - Wake every node and bring the cluster back up
//! - `labctl ceph poweroff [NODE]` - Shut down the whole cluster, or one node in maintenance
//! - `labctl ceph maintenance` - Move a node in or out of maintenance mode
//! - `labctl ceph status` - Show health, services and daemons
//! - `labctl ceph fetch` - Copy a file off a node
//! - `labctl k8s backup` - Save a verified etcd snapshot

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod console;
mod display;

pub use commands::*;
pub use console::*;
pub use display::*;

#[derive(Parser, Debug)]
#[command(name = "labctl")]
#[command(about = "Power and maintenance control for a homelab Ceph cluster")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.labctl/config.yaml)
    #[arg(long, global = true, env = "LABCTL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the Ceph cluster
    Ceph(CephArgs),

    /// Manage the Kubernetes cluster
    K8s(K8sArgs),
}

/// Arguments for the ceph command
#[derive(Parser, Debug)]
pub struct CephArgs {
    #[command(subcommand)]
    pub action: CephAction,
}

#[derive(Subcommand, Debug)]
pub enum CephAction {
    /// Wake all nodes and bring the cluster up
    Boot,

    /// Shut down the whole cluster, or power off one node in maintenance mode
    #[command(name = "poweroff", visible_alias = "shutdown")]
    Poweroff(PoweroffArgs),

    /// Manage maintenance mode of a node
    Maintenance(MaintenanceArgs),

    /// Show cluster health, services and daemons
    Status,

    /// Copy a file from a node
    Fetch(FetchArgs),
}

/// Arguments for the poweroff command
#[derive(Parser, Debug)]
pub struct PoweroffArgs {
    /// Node to power off (omit to shut down the whole cluster)
    pub node: Option<String>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the maintenance command
#[derive(Parser, Debug)]
pub struct MaintenanceArgs {
    #[command(subcommand)]
    pub action: MaintenanceAction,
}

#[derive(Subcommand, Debug)]
pub enum MaintenanceAction {
    /// Put a node into maintenance mode
    Enter {
        /// Node name
        node: String,
    },

    /// Take a node out of maintenance mode
    Exit {
        /// Node name
        node: String,
    },

    /// Show whether a node is in maintenance mode
    Status {
        /// Node name
        node: String,
    },
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Node to copy from
    pub node: String,

    /// Path on the node
    pub remote: String,

    /// Local destination
    pub local: PathBuf,
}

/// Arguments for the k8s command
#[derive(Parser, Debug)]
pub struct K8sArgs {
    #[command(subcommand)]
    pub action: K8sAction,
}

#[derive(Subcommand, Debug)]
pub enum K8sAction {
    /// Save an etcd snapshot to a local file
    Backup(BackupArgs),
}

/// Arguments for the backup command
#[derive(Parser, Debug)]
pub struct BackupArgs {
    /// Local file to write; `~` is expanded
    pub filename: String,

    /// Compress with zstd (adds `.zst` to the file name)
    #[arg(short, long)]
    pub compress: bool,

    /// Overwrite an existing file without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ceph_action(cli: Cli) -> CephAction {
        match cli.command {
            Commands::Ceph(args) => args.action,
            Commands::K8s(_) => panic!("Expected ceph command"),
        }
    }

    #[test]
    fn test_parse_boot() {
        let cli = Cli::parse_from(["labctl", "ceph", "boot"]);
        assert!(matches!(ceph_action(cli), CephAction::Boot));
    }

    #[test]
    fn test_parse_poweroff_cluster() {
        let cli = Cli::parse_from(["labctl", "ceph", "poweroff"]);
        match ceph_action(cli) {
            CephAction::Poweroff(args) => {
                assert!(args.node.is_none());
                assert!(!args.yes);
            }
            _ => panic!("Expected Poweroff action"),
        }
    }

    #[test]
    fn test_parse_poweroff_node_with_yes() {
        let cli = Cli::parse_from(["labctl", "ceph", "poweroff", "ceph-2", "-y"]);
        match ceph_action(cli) {
            CephAction::Poweroff(args) => {
                assert_eq!(args.node.as_deref(), Some("ceph-2"));
                assert!(args.yes);
            }
            _ => panic!("Expected Poweroff action"),
        }
    }

    #[test]
    fn test_parse_maintenance_enter() {
        let cli = Cli::parse_from(["labctl", "ceph", "maintenance", "enter", "ceph-3"]);
        match ceph_action(cli) {
            CephAction::Maintenance(args) => match args.action {
                MaintenanceAction::Enter { node } => assert_eq!(node, "ceph-3"),
                _ => panic!("Expected Enter action"),
            },
            _ => panic!("Expected Maintenance action"),
        }
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::parse_from([
            "labctl",
            "ceph",
            "fetch",
            "ceph-1",
            "/etc/ceph/ceph.conf",
            "./ceph.conf",
        ]);
        match ceph_action(cli) {
            CephAction::Fetch(args) => {
                assert_eq!(args.node, "ceph-1");
                assert_eq!(args.remote, "/etc/ceph/ceph.conf");
                assert_eq!(args.local, PathBuf::from("./ceph.conf"));
            }
            _ => panic!("Expected Fetch action"),
        }
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = Cli::parse_from(["labctl", "ceph", "status", "--config", "/tmp/lab.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/lab.yaml")));
    }

    #[test]
    fn test_verbose_global() {
        let cli = Cli::parse_from(["labctl", "-vv", "ceph", "status"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_k8s_backup() {
        let cli = Cli::parse_from(["labctl", "k8s", "backup", "-c", "~/etcd.db"]);
        match cli.command {
            Commands::K8s(K8sArgs {
                action: K8sAction::Backup(args),
            }) => {
                assert_eq!(args.filename, "~/etcd.db");
                assert!(args.compress);
                assert!(!args.yes);
            }
            _ => panic!("Expected k8s backup"),
        }
    }
}
