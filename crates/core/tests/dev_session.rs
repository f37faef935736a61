//! Integration tests for supervised dev sessions.
//!
//! Every test runs real child processes through `sh`, and checks what a
//! session guarantees:
//! - an interrupt stops every process and yields a clean exit code
//! - one process crashing takes the rest of the session down
//! - shutdown finishes within its bound even when children ignore SIGTERM
//! - repeated interrupts never start a second shutdown
//! - nothing a service started outlives the session
#![cfg(unix)]

mod common;

use common::*;
use dr_core::session::run_dev_environment;
use dr_core::supervisor::interrupt::control_channel;
use dr_protocol::ipc::{Event, Op};
use dr_protocol::process_models::{InterruptSignal, ProcessSpec, ProcessState, ShutdownReason};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const INTERRUPT: Op = Op::Interrupt {
    signal: InterruptSignal::Interrupt,
};

/// Wait until `count` processes have reported Running.
async fn wait_until_running(rx: &mut mpsc::Receiver<Event>, count: usize, seen: &mut Vec<Event>) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut running = 0;
    while running < count {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("processes should start in time")
            .expect("event channel closed early");
        if matches!(
            event,
            Event::ProcessStateUpdate {
                state: ProcessState::Running,
                ..
            }
        ) {
            running += 1;
        }
        seen.push(event);
    }
}

/// Whether `pid` is a live process. Zombies count as dead.
#[cfg(target_os = "linux")]
fn process_alive(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}

#[tokio::test]
async fn test_interrupt_stops_every_process_cleanly() {
    for count in 1..=3 {
        let specs: Vec<ProcessSpec> = (0..count)
            .map(|i| long_running(&format!("svc-{i}")))
            .collect();
        let (control_tx, control_rx) = control_channel();
        let (events_tx, mut events_rx) = mpsc::channel(1024);

        let session = tokio::spawn(run_dev_environment(
            specs,
            fast_options(Duration::from_secs(5)),
            control_rx,
            events_tx,
        ));

        let mut events = Vec::new();
        wait_until_running(&mut events_rx, count, &mut events).await;
        control_tx.send(INTERRUPT).await.expect("session should be listening");

        let outcome = session.await.expect("session task panicked");
        events.extend(collect_events(&mut events_rx, Duration::from_secs(1)).await);

        assert_eq!(outcome.exit_code(), 0, "{count} process(es): {outcome:?}");
        assert_eq!(
            outcome.reason,
            ShutdownReason::Interrupted {
                signal: InterruptSignal::Interrupt
            }
        );
        assert!(outcome.forced.is_empty());
        assert_eq!(outcome.processes.len(), count);
        assert!(outcome.processes.iter().all(|p| p.state.is_terminal()));
        assert_eq!(count_shutdown_started(&events), 1);

        for i in 0..count {
            let states = states_of(&events, &format!("svc-{i}"));
            assert_eq!(states.first(), Some(&ProcessState::Running));
            assert!(states.contains(&ProcessState::Stopping));
            assert!(states.last().is_some_and(ProcessState::is_terminal));
        }
    }
}

#[tokio::test]
async fn test_crash_tears_down_the_session() {
    let specs = vec![long_running("frontend"), exits_after("backend", 0.3, 3)];
    let (_control_tx, control_rx) = control_channel();
    let (events_tx, mut events_rx) = mpsc::channel(1024);

    let outcome = run_dev_environment(
        specs,
        fast_options(Duration::from_secs(5)),
        control_rx,
        events_tx,
    )
    .await;
    let events = collect_events(&mut events_rx, Duration::from_secs(1)).await;

    assert_eq!(
        outcome.reason,
        ShutdownReason::UnexpectedExit {
            name: "backend".to_string(),
            code: Some(3)
        }
    );
    assert_ne!(outcome.exit_code(), 0);
    assert!(outcome.reason.to_string().contains("backend crashed"));

    // The survivor was asked to stop only after the crash was seen.
    let crashed = position_of(&events, "backend exit", |e| {
        matches!(e, Event::ProcessStateUpdate { name, state: ProcessState::Exited { .. } } if name == "backend")
    });
    let stopping = position_of(&events, "frontend stopping", |e| {
        matches!(e, Event::ProcessStateUpdate { name, state: ProcessState::Stopping } if name == "frontend")
    });
    assert!(crashed < stopping);
    assert!(outcome.processes.iter().all(|p| p.state.is_terminal()));
}

#[tokio::test]
async fn test_clean_exit_of_one_process_still_ends_session() {
    let specs = vec![long_running("server"), exits_after("migrate", 0.1, 0)];
    let (_control_tx, control_rx) = control_channel();
    let (events_tx, _events_rx) = mpsc::channel(1024);

    let outcome = run_dev_environment(
        specs,
        fast_options(Duration::from_secs(5)),
        control_rx,
        events_tx,
    )
    .await;

    assert_eq!(
        outcome.reason,
        ShutdownReason::ProcessCompleted {
            name: "migrate".to_string()
        }
    );
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.processes.iter().all(|p| p.state.is_terminal()));
}

#[tokio::test]
async fn test_spawn_failure_shuts_down_started_processes() {
    let missing = ProcessSpec::new(
        "api",
        dr_protocol::command_models::CommandSpec::new(["nonexistent-command-xyz"]),
    );
    let specs = vec![long_running("web"), missing];
    let (_control_tx, control_rx) = control_channel();
    let (events_tx, _events_rx) = mpsc::channel(1024);

    let outcome = run_dev_environment(
        specs,
        fast_options(Duration::from_secs(5)),
        control_rx,
        events_tx,
    )
    .await;

    assert!(matches!(
        outcome.reason,
        ShutdownReason::SpawnFailed { ref name, .. } if name == "api"
    ));
    assert_eq!(outcome.exit_code(), 1);
    assert!(matches!(outcome.processes[0].state, ProcessState::Exited { .. }));
    assert!(matches!(outcome.processes[1].state, ProcessState::Failed { .. }));
}

#[tokio::test]
async fn test_shutdown_bounded_when_children_ignore_sigterm() {
    let specs = vec![stubborn("stubborn"), long_running("polite")];
    let timeout = Duration::from_millis(500);
    let (control_tx, control_rx) = control_channel();
    let (events_tx, mut events_rx) = mpsc::channel(1024);

    let session = tokio::spawn(run_dev_environment(
        specs,
        fast_options(timeout),
        control_rx,
        events_tx,
    ));

    let mut events = Vec::new();
    wait_until_running(&mut events_rx, 2, &mut events).await;
    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let interrupted_at = Instant::now();
    control_tx.send(INTERRUPT).await.expect("session should be listening");
    let outcome = session.await.expect("session task panicked");
    let took = interrupted_at.elapsed();
    events.extend(collect_events(&mut events_rx, Duration::from_secs(1)).await);

    assert!(took < timeout + Duration::from_secs(2), "shutdown took {took:?}");
    assert_eq!(outcome.forced, vec!["stubborn".to_string()]);
    assert!(outcome.processes.iter().all(|p| p.state.is_terminal()));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ProcessForceKilled { name } if name == "stubborn")));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::ProcessForceKilled { name } if name == "polite")));
}

#[tokio::test]
async fn test_repeated_interrupts_shut_down_once() {
    let specs = vec![long_running("a"), long_running("b")];
    let (control_tx, control_rx) = control_channel();
    let (events_tx, mut events_rx) = mpsc::channel(1024);
    let mut options = fast_options(Duration::from_secs(5));
    options.force_kill_after_interrupts = 0;

    let session = tokio::spawn(run_dev_environment(specs, options, control_rx, events_tx));

    let mut events = Vec::new();
    wait_until_running(&mut events_rx, 2, &mut events).await;
    for _ in 0..4 {
        control_tx.send(INTERRUPT).await.expect("session should be listening");
    }

    let outcome = session.await.expect("session task panicked");
    events.extend(collect_events(&mut events_rx, Duration::from_secs(1)).await);

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(count_shutdown_started(&events), 1);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::ShutdownCompleted { .. }))
            .count(),
        1
    );
    assert!(outcome.forced.is_empty());
}

#[tokio::test]
async fn test_repeated_interrupts_escalate_to_kill() {
    let specs = vec![stubborn("stubborn")];
    let (control_tx, control_rx) = control_channel();
    let (events_tx, mut events_rx) = mpsc::channel(1024);
    // Long enough that only escalation can explain a fast exit.
    let options = fast_options(Duration::from_secs(30));

    let session = tokio::spawn(run_dev_environment(specs, options, control_rx, events_tx));

    let mut events = Vec::new();
    wait_until_running(&mut events_rx, 1, &mut events).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    for _ in 0..3 {
        control_tx.send(INTERRUPT).await.expect("session should be listening");
    }
    let outcome = session.await.expect("session task panicked");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.forced, vec!["stubborn".to_string()]);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_no_processes_returns_immediately() {
    let (_control_tx, control_rx) = control_channel();
    let (events_tx, _events_rx) = mpsc::channel(16);

    let outcome = run_dev_environment(
        Vec::new(),
        fast_options(Duration::from_secs(5)),
        control_rx,
        events_tx,
    )
    .await;

    assert_eq!(outcome.reason, ShutdownReason::NoProcesses);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_shutdown_request_is_clean() {
    let (control_tx, control_rx) = control_channel();
    let (events_tx, mut events_rx) = mpsc::channel(1024);

    let session = tokio::spawn(run_dev_environment(
        vec![long_running("svc")],
        fast_options(Duration::from_secs(5)),
        control_rx,
        events_tx,
    ));

    let mut events = Vec::new();
    wait_until_running(&mut events_rx, 1, &mut events).await;
    control_tx.send(Op::Shutdown).await.expect("session should be listening");

    let outcome = session.await.expect("session task panicked");
    assert_eq!(outcome.reason, ShutdownReason::Requested);
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.reason.to_string().contains("stopped cleanly"));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_shutdown_kills_processes_left_behind_by_the_leader() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pid_file = dir.path().join("worker.pid");
    // The leader honours SIGTERM; the worker it started ignores it.
    let script = format!(
        "(trap '' TERM; exec sleep 60) & echo $! > '{}'; exec sleep 60",
        pid_file.display()
    );
    let specs = vec![ProcessSpec::new("frontend", sh(&script))];
    let timeout = Duration::from_millis(500);
    let (control_tx, control_rx) = control_channel();
    let (events_tx, mut events_rx) = mpsc::channel(1024);

    let session = tokio::spawn(run_dev_environment(
        specs,
        fast_options(timeout),
        control_rx,
        events_tx,
    ));

    let mut events = Vec::new();
    wait_until_running(&mut events_rx, 1, &mut events).await;
    let worker = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(pid) = std::fs::read_to_string(&pid_file) {
                if let Ok(pid) = pid.trim().parse::<i32>() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("worker should report its pid");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let interrupted_at = Instant::now();
    control_tx.send(INTERRUPT).await.expect("session should be listening");
    let outcome = session.await.expect("session task panicked");

    assert!(interrupted_at.elapsed() < timeout + Duration::from_secs(2));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.forced, vec!["frontend".to_string()]);

    // SIGKILL delivery is asynchronous.
    let deadline = Instant::now() + Duration::from_secs(2);
    while process_alive(worker) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!process_alive(worker), "worker {worker} outlived the session");
}
