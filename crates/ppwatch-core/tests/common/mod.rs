//! Test doubles and common utilities for watchdog contract tests
//!
//! This module provides a scripted gateway that records every call the
//! watchdog makes without talking to a router.

#![allow(dead_code)]

use ppwatch_core::config::WatchdogConfig;
use ppwatch_core::error::{Error, Result};
use ppwatch_core::traits::{RouterGateway, SessionId};
use ppwatch_core::{Watchdog, WatchdogEvent};
use ipnet::Ipv4Net;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One scripted answer to `fetch_interface_address`
#[derive(Debug, Clone, Copy)]
pub enum Sample {
    /// The interface has this address bound
    Address(&'static str),
    /// The interface has no address records
    Empty,
    /// The router answers with this HTTP status
    Fail(u16),
}

impl Sample {
    fn to_result(self) -> Result<Option<Ipv4Net>> {
        match self {
            Sample::Address(addr) => Ok(Some(addr.parse().expect("valid test address"))),
            Sample::Empty => Ok(None),
            Sample::Fail(status) => Err(Error::gateway(status, "scripted failure")),
        }
    }
}

/// A RouterGateway that replays scripted samples and counts calls
///
/// Clones share the script and the counters, so a test can keep one
/// handle while the watchdog owns another.
#[derive(Clone)]
pub struct ScriptedGateway {
    /// Queued samples, consumed one per fetch
    samples: Arc<Mutex<VecDeque<Sample>>>,
    /// Answer repeated once the queue is empty
    last_sample: Arc<Mutex<Sample>>,
    /// Sessions returned by successive resolve calls; the last one repeats
    sessions: Arc<Mutex<VecDeque<Option<&'static str>>>>,
    /// HTTP status reconnects fail with, if any
    reconnect_failure: Arc<Mutex<Option<u16>>>,
    /// Session ids passed to trigger_reconnect
    reconnected: Arc<Mutex<Vec<String>>>,
    /// Call counter for fetch_interface_address()
    fetch_call_count: Arc<AtomicUsize>,
    /// Call counter for resolve_session_id()
    resolve_call_count: Arc<AtomicUsize>,
    /// Call counter for trigger_reconnect()
    reconnect_call_count: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    /// Gateway whose interface holds `address` and whose session is `*1`
    pub fn new(address: &'static str) -> Self {
        Self::with_initial(Sample::Address(address), Some("*1"))
    }

    /// Gateway with an arbitrary startup sample and session
    pub fn with_initial(sample: Sample, session: Option<&'static str>) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::new())),
            last_sample: Arc::new(Mutex::new(sample)),
            sessions: Arc::new(Mutex::new(VecDeque::from([session]))),
            reconnect_failure: Arc::new(Mutex::new(None)),
            reconnected: Arc::new(Mutex::new(Vec::new())),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
            reconnect_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue the answer for a future fetch
    pub fn push_sample(&self, sample: Sample) {
        self.samples.lock().unwrap().push_back(sample);
    }

    /// Queue the answer for a future session lookup
    pub fn push_session(&self, session: Option<&'static str>) {
        self.sessions.lock().unwrap().push_back(session);
    }

    /// Make every reconnect fail with `status` (or succeed with `None`)
    pub fn fail_reconnects(&self, status: Option<u16>) {
        *self.reconnect_failure.lock().unwrap() = status;
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }

    pub fn reconnect_call_count(&self) -> usize {
        self.reconnect_call_count.load(Ordering::SeqCst)
    }

    /// Total number of gateway calls of any kind
    pub fn total_call_count(&self) -> usize {
        self.fetch_call_count() + self.resolve_call_count() + self.reconnect_call_count()
    }

    /// Session ids passed to trigger_reconnect, in order
    pub fn reconnected_sessions(&self) -> Vec<String> {
        self.reconnected.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RouterGateway for ScriptedGateway {
    async fn fetch_interface_address(&self, _interface: &str) -> Result<Option<Ipv4Net>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);

        let sample = match self.samples.lock().unwrap().pop_front() {
            Some(sample) => {
                *self.last_sample.lock().unwrap() = sample;
                sample
            }
            None => *self.last_sample.lock().unwrap(),
        };

        sample.to_result()
    }

    async fn resolve_session_id(&self, _interface: &str) -> Result<Option<SessionId>> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);

        let mut sessions = self.sessions.lock().unwrap();
        let session = if sessions.len() > 1 {
            sessions.pop_front().flatten()
        } else {
            sessions.front().copied().flatten()
        };

        Ok(session.map(SessionId::new))
    }

    async fn trigger_reconnect(&self, session: &SessionId) -> Result<()> {
        self.reconnect_call_count.fetch_add(1, Ordering::SeqCst);
        self.reconnected
            .lock()
            .unwrap()
            .push(session.as_str().to_string());

        match *self.reconnect_failure.lock().unwrap() {
            Some(status) => Err(Error::gateway(status, "scripted reconnect failure")),
            None => Ok(()),
        }
    }

    fn gateway_name(&self) -> &'static str {
        "scripted"
    }
}

/// Helper to create a minimal WatchdogConfig for testing
pub fn minimal_config(max_retry: u32) -> WatchdogConfig {
    WatchdogConfig {
        interface: "pppoe-out1".to_string(),
        target_network: "58.32.0.0/16".parse().unwrap(),
        check_interval_secs: 1,
        max_retry,
        hold_recovery_ticks: 0,
        tolerate_gateway_errors: true,
        event_channel_capacity: 100,
    }
}

/// Initialize a watchdog over `gateway`, panicking on startup failure
pub async fn start(
    gateway: &ScriptedGateway,
    config: WatchdogConfig,
) -> (Watchdog, mpsc::Receiver<WatchdogEvent>) {
    Watchdog::init(Box::new(gateway.clone()), config)
        .await
        .expect("watchdog initialization succeeds")
}

/// Drain every event currently buffered in the channel
pub fn drain_events(rx: &mut mpsc::Receiver<WatchdogEvent>) -> Vec<WatchdogEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
