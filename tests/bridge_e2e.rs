//! End-to-end tests of the command bridge over the substitute backend.
//!
//! These exercise the full caller-visible contract: awaitable operations,
//! running-state tracking, log delivery on the caller runtime and idempotent
//! resource cleanup.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use simbridge_session::test_utils::FakeBackend;
use simbridge_session::{CommandBridge, SubstituteBackend};

fn substitute_bridge() -> CommandBridge {
    CommandBridge::new(Box::new(SubstituteBackend::new())).expect("worker thread must spawn")
}

#[tokio::test]
async fn substitute_session_full_lifecycle() {
    let bridge = substitute_bridge();

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bridge
        .setup_logging(move |line| sink.lock().unwrap().push(line))
        .await
        .unwrap();

    bridge.load("demo.resc").await.unwrap();
    assert!(!bridge.is_running());

    bridge.start().await.unwrap();
    assert!(bridge.is_running());

    let value = bridge.read_memory(0x8000_0000, 4).await.unwrap();
    assert_eq!(value, 0xDEAD_BEEF);
    assert!(bridge.is_running(), "reads must not mutate backend state");

    bridge.pause().await.unwrap();
    assert!(!bridge.is_running());

    bridge.cleanup().await.unwrap();

    // Give the delivery task a moment, then check the echo trail.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let seen = seen.lock().unwrap();
    assert!(seen.contains(&"> include @demo.resc".to_string()));
    assert!(seen.contains(&"> start".to_string()));
    assert!(seen.contains(&"Simulation paused".to_string()));
}

#[tokio::test]
async fn substitute_load_latency_is_representative() {
    let bridge = substitute_bridge();

    let started = Instant::now();
    bridge.load("any.resc").await.unwrap();
    assert!(
        started.elapsed() >= Duration::from_millis(400),
        "substitute load should take roughly half a second"
    );
}

#[tokio::test]
async fn empty_script_path_fails_without_state_change() {
    let bridge = substitute_bridge();

    let err = bridge.load("").await.unwrap_err();
    assert!(err.to_string().contains("invalid argument"));
    assert!(!bridge.is_running());

    // The session stays usable after a rejected operation.
    bridge.start().await.unwrap();
    assert!(bridge.is_running());
}

#[tokio::test]
async fn unawaited_dispatches_are_serialized() {
    let (backend, probe) = FakeBackend::with_delay(Duration::from_millis(30));
    let bridge = CommandBridge::new(Box::new(backend)).unwrap();

    let (a, b, c) = tokio::join!(
        bridge.start(),
        bridge.read_memory(0x4000, 4),
        bridge.send_command("machines")
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert!(!probe.overlap_detected());
    assert_eq!(probe.calls(), vec!["start", "read_memory", "execute"]);
}

#[tokio::test]
async fn cleanup_is_idempotent_end_to_end() {
    let bridge = substitute_bridge();

    bridge.setup_logging(|_| {}).await.unwrap();
    bridge.cleanup().await.unwrap();
    // Second cleanup after the tailer already stopped must be a no-op.
    bridge.cleanup().await.unwrap();

    // The session stays usable for control operations afterwards.
    bridge.start().await.unwrap();
    assert!(bridge.is_running());
}

#[tokio::test]
async fn repeated_setup_logging_replaces_the_stream() {
    let bridge = substitute_bridge();

    let first: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let second: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&first);
    bridge
        .setup_logging(move |line| sink.lock().unwrap().push(line))
        .await
        .unwrap();

    let sink = Arc::clone(&second);
    bridge
        .setup_logging(move |line| sink.lock().unwrap().push(line))
        .await
        .unwrap();

    bridge.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(
        first.lock().unwrap().is_empty(),
        "replaced stream must not receive lines"
    );
    assert!(second.lock().unwrap().iter().any(|l| l == "> start"));

    bridge.cleanup().await.unwrap();
}
