//! Contract Test: Gateway Errors After Startup
//!
//! Constraints verified:
//! - With tolerance enabled (default), a failed fetch behaves like an empty sample
//! - A tolerated reconnect failure still counts as a reconnect attempt
//! - With tolerance disabled, any gateway error ends the loop
//! - A reconnect rejected as "not found" re-resolves the PPPoE session

mod common;

use common::*;
use ppwatch_core::error::Error;
use ppwatch_core::{TickOutcome, WatchdogEvent};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn tolerated_fetch_error_leaves_state_untouched() {
    let gateway = ScriptedGateway::new("10.0.0.1/32");
    let (mut watchdog, _event_rx) = start(&gateway, minimal_config(20)).await;

    assert_ok!(watchdog.tick().await);
    assert_eq!(watchdog.state().retry_count(), 1);

    gateway.push_sample(Sample::Fail(500));
    let outcome = assert_ok!(watchdog.tick().await);

    assert_eq!(outcome, TickOutcome::SampleFailed);
    assert_eq!(watchdog.state().retry_count(), 1);
    assert_eq!(gateway.reconnect_call_count(), 1);
    assert_eq!(
        watchdog.state().current_address().to_string(),
        "10.0.0.1/32"
    );
}

#[tokio::test]
async fn tolerated_reconnect_error_counts_as_attempt() {
    let gateway = ScriptedGateway::new("10.0.0.1/32");
    gateway.fail_reconnects(Some(500));
    let (mut watchdog, _event_rx) = start(&gateway, minimal_config(3)).await;

    for expected in 1..=3u32 {
        let outcome = assert_ok!(watchdog.tick().await);
        assert_eq!(
            outcome,
            TickOutcome::ReconnectFailed {
                address: "10.0.0.1/32".parse().unwrap(),
                retry_count: expected,
            }
        );
    }

    // Budget is still bounded when the router keeps refusing
    assert!(watchdog.is_holding());
    assert_eq!(
        assert_ok!(watchdog.tick().await),
        TickOutcome::Holding { retry_count: 3 }
    );
    assert_eq!(gateway.reconnect_call_count(), 3);
    // 500 is not "not found", so no re-resolution
    assert_eq!(gateway.resolve_call_count(), 1);
}

#[tokio::test]
async fn strict_mode_propagates_fetch_error() {
    let gateway = ScriptedGateway::new("58.32.1.5/32");
    let mut config = minimal_config(20);
    config.tolerate_gateway_errors = false;
    let (mut watchdog, _event_rx) = start(&gateway, config).await;

    gateway.push_sample(Sample::Fail(503));
    let err = assert_err!(watchdog.tick().await);

    assert!(matches!(err, Error::Gateway { status: 503, .. }), "got {:?}", err);
}

#[tokio::test]
async fn strict_mode_propagates_reconnect_error() {
    let gateway = ScriptedGateway::new("10.0.0.1/32");
    gateway.fail_reconnects(Some(400));
    let mut config = minimal_config(20);
    config.tolerate_gateway_errors = false;
    let (mut watchdog, _event_rx) = start(&gateway, config).await;

    let err = assert_err!(watchdog.tick().await);

    assert!(matches!(err, Error::Gateway { status: 400, .. }), "got {:?}", err);
    assert_eq!(
        watchdog.state().retry_count(),
        0,
        "a reconnect that never happened is not counted"
    );
}

#[tokio::test]
async fn strict_mode_empty_sample_is_still_tolerated() {
    // Absence is never an error, regardless of mode
    let gateway = ScriptedGateway::new("58.32.1.5/32");
    let mut config = minimal_config(20);
    config.tolerate_gateway_errors = false;
    let (mut watchdog, _event_rx) = start(&gateway, config).await;

    gateway.push_sample(Sample::Empty);
    assert_eq!(
        assert_ok!(watchdog.tick().await),
        TickOutcome::AddressUnavailable
    );
}

#[tokio::test]
async fn stale_session_is_re_resolved() {
    let gateway = ScriptedGateway::new("10.0.0.1/32");
    // Startup sees *1; the session is later recreated as *7
    gateway.push_session(Some("*7"));
    gateway.fail_reconnects(Some(404));
    let (mut watchdog, mut event_rx) = start(&gateway, minimal_config(20)).await;
    assert_eq!(watchdog.state().session().as_str(), "*1");

    let outcome = assert_ok!(watchdog.tick().await);
    assert!(matches!(outcome, TickOutcome::ReconnectFailed { retry_count: 1, .. }));
    assert_eq!(watchdog.state().session().as_str(), "*7");

    gateway.fail_reconnects(None);
    let outcome = assert_ok!(watchdog.tick().await);
    assert!(matches!(outcome, TickOutcome::Reconnected { retry_count: 2, .. }));

    assert_eq!(
        gateway.reconnected_sessions(),
        vec!["*1".to_string(), "*7".to_string()]
    );

    let events = drain_events(&mut event_rx);
    assert!(events.contains(&WatchdogEvent::SessionRefreshed {
        previous: ppwatch_core::SessionId::new("*1"),
        current: ppwatch_core::SessionId::new("*7"),
    }));
}

#[tokio::test]
async fn vanished_session_keeps_previous_id() {
    let gateway = ScriptedGateway::new("10.0.0.1/32");
    gateway.push_session(None);
    gateway.fail_reconnects(Some(404));
    let (mut watchdog, _event_rx) = start(&gateway, minimal_config(20)).await;

    assert_ok!(watchdog.tick().await);

    assert_eq!(gateway.resolve_call_count(), 2);
    assert_eq!(watchdog.state().session().as_str(), "*1");
}
