use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use labctl::cli::{
    backup_kubernetes, cluster_status, fetch_file, format_backup_outcome, format_boot_report,
    format_cluster_status, format_error, format_maintenance_status, format_maintenance_transition,
    load_config, poweroff_node, CephAction, CephArgs, Cli, CommandResult, Commands,
    ConsoleProgress, K8sAction, K8sArgs, MaintenanceAction, StdinConfirm,
};
use labctl::orchestrator::{
    boot_cluster, enter_maintenance, exit_maintenance, maintenance_status, shutdown_cluster,
    ClusterContext, ShutdownOutcome, TcpProbe,
};
use labctl::remote::SshConnector;
use labctl::wol::UdpBroadcaster;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("{}", format_error(&e));
        process::exit(1);
    }
}

async fn run(cli: Cli) -> CommandResult<()> {
    let config = load_config(cli.config.as_deref())?;
    info!("Loaded {} nodes", config.ceph.nodes.len());

    let connector = SshConnector::new()?;
    let progress = ConsoleProgress;
    let ctx = ClusterContext::new(&config, &connector, &progress);

    match cli.command {
        Commands::Ceph(CephArgs { action }) => run_ceph(&ctx, action).await,
        Commands::K8s(K8sArgs {
            action: K8sAction::Backup(args),
        }) => {
            let confirm = StdinConfirm::new(args.yes);
            let outcome = backup_kubernetes(
                &config,
                &connector,
                &progress,
                &confirm,
                &args.filename,
                args.compress,
            )
            .await?;
            print!("{}", format_backup_outcome(&outcome));
            Ok(())
        }
    }
}

async fn run_ceph(ctx: &ClusterContext<'_>, action: CephAction) -> CommandResult<()> {
    match action {
        CephAction::Boot => {
            let report = boot_cluster(ctx, &UdpBroadcaster::default(), &TcpProbe).await?;
            print!("{}", format_boot_report(&report));
        }
        CephAction::Poweroff(args) => {
            let confirm = StdinConfirm::new(args.yes);
            let outcome = match args.node {
                Some(node) => poweroff_node(ctx, &node, &confirm).await?,
                None => shutdown_cluster(ctx, &confirm).await?,
            };
            if outcome == ShutdownOutcome::Declined {
                println!("Aborted.");
            }
        }
        CephAction::Maintenance(args) => match args.action {
            MaintenanceAction::Enter { node } => {
                let transition = enter_maintenance(ctx, &node).await?;
                print!("{}", format_maintenance_transition(&node, transition));
            }
            MaintenanceAction::Exit { node } => {
                let transition = exit_maintenance(ctx, &node).await?;
                print!("{}", format_maintenance_transition(&node, transition));
            }
            MaintenanceAction::Status { node } => {
                let in_maintenance = maintenance_status(ctx, &node).await?;
                print!("{}", format_maintenance_status(&node, in_maintenance));
            }
        },
        CephAction::Status => {
            let status = cluster_status(ctx).await?;
            print!("{}", format_cluster_status(&status));
        }
        CephAction::Fetch(args) => {
            fetch_file(ctx, &args.node, &args.remote, &args.local).await?;
        }
    }

    Ok(())
}
