//! Prompt delivery timing against sessions with different readiness.

use std::time::Duration;

use command_runner::config::HandoffConfig;
use command_runner::orchestrator::{handoff, naming};
use command_runner::AppError;
use tokio::time::Instant;

use crate::support::{FakeMultiplexer, Readiness};

async fn launched(mux: &FakeMultiplexer) -> naming::SessionName {
    let name = naming::allocate("alpha");
    let dir = std::env::temp_dir();
    handoff::spawn(mux, &name, &dir, "claude", &[])
        .await
        .expect("launch");
    name
}

#[tokio::test(start_paused = true)]
async fn prompt_reaches_a_session_that_becomes_ready_after_two_seconds() {
    let mux = FakeMultiplexer::with_readiness(Readiness::After(Duration::from_secs(2)));
    let name = launched(&mux).await;
    let policy = HandoffConfig::default();

    let delivered = handoff::deliver_prompt(&mux, &name, "hello agent", &policy)
        .await
        .expect("delivered");

    assert!(delivered.attempts > 1);
    assert!(delivered.elapsed >= Duration::from_secs(2));
    assert!(delivered.elapsed < policy.delivery_timeout());
    let session = mux.session(name.as_str()).expect("session");
    assert_eq!(session.pasted, vec!["hello agent".to_owned()]);
    assert_eq!(session.submits, 1);
}

#[tokio::test(start_paused = true)]
async fn never_ready_session_fails_with_a_delivery_error_naming_it() {
    let mux = FakeMultiplexer::with_readiness(Readiness::Never);
    let name = launched(&mux).await;
    let policy = HandoffConfig::default();
    let started = Instant::now();

    let err = handoff::deliver_prompt(&mux, &name, "hello agent", &policy)
        .await
        .expect_err("never ready");

    assert!(matches!(err, AppError::Delivery(_)));
    assert!(err.to_string().starts_with("could not deliver prompt"));
    assert!(err.to_string().contains(name.as_str()));
    assert!(started.elapsed() >= policy.delivery_timeout());
    assert!(started.elapsed() < policy.delivery_timeout() + Duration::from_secs(3));
    // The process is left running for the operator to inspect or kill.
    assert!(mux.session(name.as_str()).is_some());
    assert!(mux.session(name.as_str()).expect("session").pasted.is_empty());
}

#[tokio::test(start_paused = true)]
async fn immediately_ready_session_takes_one_attempt() {
    let mux = FakeMultiplexer::default();
    let name = launched(&mux).await;

    let delivered = handoff::deliver_prompt(&mux, &name, "hi", &HandoffConfig::default())
        .await
        .expect("delivered");

    assert_eq!(delivered.attempts, 1);
    assert_eq!(delivered.elapsed, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn missing_session_fails_delivery() {
    let mux = FakeMultiplexer::default();
    let name = naming::allocate("ghost");
    let policy = HandoffConfig {
        delivery_timeout_seconds: 1,
        ..HandoffConfig::default()
    };

    let err = handoff::deliver_prompt(&mux, &name, "hi", &policy)
        .await
        .expect_err("no session");
    assert!(matches!(err, AppError::Delivery(_)));
}

#[tokio::test]
async fn refused_launch_is_a_launch_error() {
    let mux = FakeMultiplexer::failing_launch();
    let name = naming::allocate("alpha");
    let err = handoff::spawn(&mux, &name, &std::env::temp_dir(), "claude", &[])
        .await
        .expect_err("refused");
    assert!(matches!(err, AppError::Launch(_)));
}

#[tokio::test(start_paused = true)]
async fn failed_enter_is_retried_without_pasting_again() {
    let mux = FakeMultiplexer::failing_submits(1);
    let name = launched(&mux).await;

    let delivered = handoff::deliver_prompt(&mux, &name, "hello agent", &HandoffConfig::default())
        .await
        .expect("delivered");

    assert_eq!(delivered.attempts, 2);
    let session = mux.session(name.as_str()).expect("session");
    assert_eq!(session.pasted, vec!["hello agent".to_owned()]);
    assert_eq!(session.submits, 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_readiness_check_is_cut_off_at_the_window() {
    let mux = FakeMultiplexer::with_readiness(Readiness::Hang);
    let name = launched(&mux).await;
    let policy = HandoffConfig {
        delivery_timeout_seconds: 3,
        ..HandoffConfig::default()
    };
    let started = Instant::now();

    let err = handoff::deliver_prompt(&mux, &name, "hello agent", &policy)
        .await
        .expect_err("readiness check never answers");

    assert!(matches!(err, AppError::Delivery(_)));
    assert!(started.elapsed() >= policy.delivery_timeout());
    assert!(started.elapsed() < policy.delivery_timeout() + Duration::from_secs(1));
    assert!(mux.session(name.as_str()).expect("session").pasted.is_empty());
}
