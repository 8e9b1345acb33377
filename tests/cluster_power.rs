//! End-to-end power sequences against a simulated cluster

use std::time::Duration;

use tokio::time::Instant;

use labctl::ceph::{CephError, FlagAction, MaintenanceTransition, OsdFlag};
use labctl::config::{Config, NodeConfig};
use labctl::orchestrator::{
    boot_cluster, enter_maintenance, shutdown_cluster, AssumeYes, ClusterContext, ErrorClass,
    OrchestratorError, ShutdownOutcome, Stage,
};
use labctl::remote::simulated::{
    Event, RecordingBroadcaster, RecordingProgress, Reply, Request, SimulatedCluster,
    SimulatedProbe,
};

const FSID: &str = "3b1f6a52-9c1e-11ee-8f0a-525400c0ffee";

fn lab_config() -> Config {
    let mut config = Config::default();
    config.ceph.nodes = vec![
        NodeConfig::new("mon-a", "192.168.1.10").with_mac("52:54:00:00:00:0a"),
        NodeConfig::new("osd-b", "192.168.1.11").with_mac("52:54:00:00:00:0b"),
        NodeConfig::new("osd-c", "192.168.1.12").with_mac("52:54:00:00:00:0c"),
    ];
    config
}

fn flag_reply(command: &str) -> Option<Reply> {
    for action in [FlagAction::Set, FlagAction::Unset] {
        for flag in OsdFlag::ALL {
            if command == format!("sudo ceph osd {} {} 2>&1", action.verb(), flag) {
                return Some(Reply::ok(format!("{}\n", flag.sentinel(action))));
            }
        }
    }
    None
}

fn daemon(daemon_type: &str, id: &str, host: &str, status: i32) -> String {
    format!(
        r#"{{"daemon_type":"{}","daemon_id":"{}","hostname":"{}","status":{}}}"#,
        daemon_type, id, host, status
    )
}

/// A healthy cluster whose crash service takes two polls to stop and whose
/// OSDs stop on the first poll
fn shutdown_script(req: &Request<'_>) -> Reply {
    if let Some(reply) = flag_reply(req.command) {
        return reply;
    }

    match req.command {
        "sudo ceph health" => Reply::ok("HEALTH_OK\n"),
        "sudo ceph fsid" => Reply::ok(format!("{}\n", FSID)),
        "sudo ceph orch stop crash" => Reply::ok("Scheduled to stop crash.mon-a on host 'mon-a'"),
        "sudo ceph orch ps -f json --service_name crash" => {
            let status = if req.attempt == 0 { 1 } else { 0 };
            Reply::ok(format!(
                "[{},{}]",
                daemon("crash", "mon-a", "mon-a", status),
                daemon("crash", "osd-b", "osd-b", status)
            ))
        }
        "sudo ceph orch ps -f json --daemon_type osd" => Reply::ok(format!(
            "[{},{}]",
            daemon("osd", "0", "osd-b", 1),
            daemon("osd", "1", "osd-c", 1)
        )),
        "sudo ceph orch daemon stop osd.0" | "sudo ceph orch daemon stop osd.1" => {
            Reply::ok("Scheduled to stop")
        }
        "sudo ceph orch ps -f json --daemon_type osd --daemon_id 0" => {
            Reply::ok(format!("[{}]", daemon("osd", "0", "osd-b", 0)))
        }
        "sudo ceph orch ps -f json --daemon_type osd --daemon_id 1" => {
            Reply::ok(format!("[{}]", daemon("osd", "1", "osd-c", 0)))
        }
        "sudo ceph orch ps -f json --daemon_type mon" => {
            Reply::ok(format!("[{}]", daemon("mon", "mon-a", "mon-a", 1)))
        }
        "sudo shutdown" => Reply::ok(""),
        cmd if cmd == format!("sudo systemctl stop ceph-{}@mon.mon-a", FSID) => Reply::ok(""),
        _ => Reply::fail("unexpected command"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_shutdown_sequence() {
    let config = lab_config();
    let sim = SimulatedCluster::new(shutdown_script);
    let progress = RecordingProgress::new();
    let ctx = ClusterContext::new(&config, &sim, &progress);
    let start = Instant::now();

    let outcome = shutdown_cluster(&ctx, &AssumeYes).await.unwrap();

    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert_eq!(
        progress.stages(),
        vec![
            Stage::ConfirmIntent,
            Stage::ConnectControlSession,
            Stage::HealthCheck,
            Stage::SetFlags,
            Stage::DrainAncillaryService,
            Stage::DrainStorageDaemons,
            Stage::DrainMonitors,
            Stage::PowerOffAllNodes,
            Stage::Done,
        ]
    );

    // health 1 poll, crash 2 polls, each OSD 1 poll
    assert_eq!(start.elapsed(), Duration::from_secs(5));

    let commands: Vec<String> = sim.commands().into_iter().map(|e| e.command).collect();
    let position = |cmd: &str| {
        commands
            .iter()
            .position(|c| c == cmd)
            .unwrap_or_else(|| panic!("{} was never run", cmd))
    };

    let sets: Vec<&String> = commands
        .iter()
        .filter(|c| c.starts_with("sudo ceph osd set"))
        .collect();
    assert_eq!(
        sets,
        vec![
            "sudo ceph osd set noout 2>&1",
            "sudo ceph osd set nodown 2>&1",
            "sudo ceph osd set nobackfill 2>&1",
            "sudo ceph osd set norecover 2>&1",
            "sudo ceph osd set norebalance 2>&1",
            "sudo ceph osd set pause 2>&1",
        ]
    );

    let mon_stop = format!("sudo systemctl stop ceph-{}@mon.mon-a", FSID);
    assert!(position("sudo ceph health") < position("sudo ceph osd set noout 2>&1"));
    assert!(position("sudo ceph osd set pause 2>&1") < position("sudo ceph orch stop crash"));
    assert!(position("sudo ceph orch stop crash") < position("sudo ceph orch daemon stop osd.0"));
    assert!(position("sudo ceph orch daemon stop osd.1") < position(mon_stop.as_str()));
    assert!(position(mon_stop.as_str()) < position("sudo shutdown"));

    assert_eq!(sim.count("sudo ceph orch ps -f json --service_name crash"), 2);
    assert_eq!(sim.count("sudo ceph orch ps -f json --daemon_type osd --daemon_id 0"), 1);
    assert_eq!(sim.count("sudo ceph orch ps -f json --daemon_type osd --daemon_id 1"), 1);

    // the monitor is stopped on its own host
    assert!(sim.commands_on("mon-a").contains(&mon_stop));

    for node in ["mon-a", "osd-b", "osd-c"] {
        let on_node = sim.commands_on(node);
        assert_eq!(
            on_node.iter().filter(|c| *c == "sudo shutdown").count(),
            1,
            "{} powered off once",
            node
        );
    }

    assert_eq!(
        progress.details(),
        vec![
            "noout",
            "nodown",
            "nobackfill",
            "norecover",
            "norebalance",
            "pause",
            "crash",
            "osd.0",
            "osd.1",
            "mon.mon-a",
            "mon-a",
            "osd-b",
            "osd-c",
        ]
    );
    assert_eq!(sim.sessions_opened(), sim.sessions_closed());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_halts_on_unverified_flag() {
    let config = lab_config();
    let sim = SimulatedCluster::new(|req| match req.command {
        // an older release that reports the compound flag by its short name
        "sudo ceph osd set pause 2>&1" => Reply::ok("pause is set\n"),
        _ => shutdown_script(req),
    });
    let progress = RecordingProgress::new();
    let ctx = ClusterContext::new(&config, &sim, &progress);

    let err = shutdown_cluster(&ctx, &AssumeYes).await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Ceph(CephError::FlagNotVerified { flag: "pause", .. })
    ));
    assert_eq!(err.class(), ErrorClass::Verification);
    assert_eq!(sim.count("sudo ceph orch stop crash"), 0);
    assert_eq!(sim.count("sudo shutdown"), 0);
    assert_eq!(progress.stages().last(), Some(&Stage::SetFlags));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drain_timeout_leaves_nodes_running() {
    let config = lab_config();
    let sim = SimulatedCluster::new(|req| match req.command {
        "sudo ceph orch ps -f json --daemon_type osd --daemon_id 1" => {
            Reply::ok(format!("[{}]", daemon("osd", "1", "osd-c", 1)))
        }
        _ => shutdown_script(req),
    });
    let progress = RecordingProgress::new();
    let ctx = ClusterContext::new(&config, &sim, &progress);

    let err = shutdown_cluster(&ctx, &AssumeYes).await.unwrap_err();

    match err {
        OrchestratorError::DrainTimeout { target, waited } => {
            assert_eq!(target, "osd.1");
            assert_eq!(waited, Duration::from_secs(10));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.count("sudo ceph orch ps -f json --daemon_type mon"), 0);
    assert_eq!(sim.count("sudo shutdown"), 0);
}

fn boot_script(req: &Request<'_>) -> Reply {
    if let Some(reply) = flag_reply(req.command) {
        return reply;
    }

    match req.command {
        "sudo ceph orch ls -f json" if req.attempt == 0 => Reply::ok(
            r#"[{"service_name":"mon","status":{"running":1,"size":1}},
                {"service_name":"osd","status":{"running":0,"size":2}}]"#,
        ),
        "sudo ceph orch ls -f json" => Reply::ok(
            r#"[{"service_name":"mon","status":{"running":1,"size":1}},
                {"service_name":"osd","status":{"running":2,"size":2}}]"#,
        ),
        "sudo ceph health" => Reply::ok("HEALTH_WARN 12 pgs peering\n"),
        _ => Reply::fail("unexpected command"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_boot_sequence_with_slow_health() {
    let config = lab_config();
    let sim = SimulatedCluster::new(boot_script);
    let progress = RecordingProgress::new();
    let ctx = ClusterContext::new(&config, &sim, &progress);
    let broadcaster = RecordingBroadcaster::new();
    let probe = SimulatedProbe::new()
        .with_latency("mon-a", Duration::from_millis(500))
        .with_latency("osd-b", Duration::ZERO)
        .with_latency("osd-c", Duration::from_millis(1000));

    let report = boot_cluster(&ctx, &broadcaster, &probe).await.unwrap();

    assert_eq!(
        broadcaster.sent(),
        vec!["52:54:00:00:00:0a", "52:54:00:00:00:0b", "52:54:00:00:00:0c"]
    );
    assert_eq!(report.control_node, "osd-b");
    assert!(!report.is_healthy());
    assert_eq!(report.health.status_text(), "HEALTH_WARN 12 pgs peering");

    assert_eq!(
        progress.stages(),
        vec![
            Stage::BroadcastWake,
            Stage::AwaitReachability,
            Stage::ConnectControlSession,
            Stage::AwaitServiceConvergence,
            Stage::UnsetFlags,
            Stage::AwaitHealthy,
            Stage::Done,
        ]
    );
    assert!(progress
        .events()
        .iter()
        .any(|e| matches!(e, Event::Warning(w) if w.contains("HEALTH_WARN"))));

    // everything ran on the first node to answer
    assert!(sim.commands().iter().all(|e| e.node == "osd-b"));
    assert_eq!(sim.count("sudo ceph orch ls -f json"), 2);

    let unsets: Vec<String> = sim
        .commands_on("osd-b")
        .into_iter()
        .filter(|c| c.starts_with("sudo ceph osd unset"))
        .collect();
    assert_eq!(unsets.len(), 6);
    assert_eq!(unsets[5], "sudo ceph osd unset pause 2>&1");
    assert_eq!(sim.sessions_opened(), sim.sessions_closed());
}

#[tokio::test]
async fn test_maintenance_enter_already_in_maintenance() {
    let config = lab_config();
    let sim = SimulatedCluster::new(|req| match req.command {
        "sudo ceph orch host maintenance enter osd-c 2>&1" => {
            Reply::fail("Error EINVAL: Host osd-c is already in maintenance mode")
        }
        _ => Reply::fail("unexpected command"),
    });
    let progress = RecordingProgress::new();
    let ctx = ClusterContext::new(&config, &sim, &progress);

    let transition = enter_maintenance(&ctx, "osd-c").await.unwrap();

    assert_eq!(transition, MaintenanceTransition::AlreadyInMaintenance);
    assert!(sim.commands_on("osd-c").is_empty());
    assert_eq!(sim.commands().len(), 1);
}
