//! PPPoE address watchdog
//!
//! The Watchdog is responsible for:
//! - Resolving the interface address and PPPoE session at startup
//! - Sampling the bound address once per check interval
//! - Reconnecting the session when the address is outside the target network
//! - Holding off once the reconnect budget is exhausted
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!              │   Watchdog   │── WatchdogEvent ──▶ (monitoring)
//!              └──────────────┘
//!                     │
//!        ┌────────────┼─────────────┐
//!        ▼            ▼             ▼
//!  fetch address  resolve id   trigger reconnect
//!        └────────────┼─────────────┘
//!                     ▼
//!             ┌───────────────┐
//!             │ RouterGateway │
//!             └───────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Retry counter at the threshold → hold (no gateway calls)
//! 2. Fetch the interface address; nothing bound → skip
//! 3. Address differs from the last observed one → record and log it
//! 4. In target → reset the retry counter
//! 5. Outside target → reconnect, bump the retry counter
//! 6. Sleep one check interval

use crate::config::WatchdogConfig;
use crate::error::{Error, Result};
use crate::network::in_target;
use crate::traits::{RouterGateway, SessionId};
use ipnet::Ipv4Net;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Events emitted by the Watchdog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// Polling loop started
    Started {
        interface: String,
        address: Ipv4Net,
        session: SessionId,
    },

    /// A sample returned a different address than the last one observed
    AddressChanged {
        previous: Ipv4Net,
        current: Ipv4Net,
    },

    /// Sampled address lies within the target network
    InRange {
        address: Ipv4Net,
    },

    /// Reconnect request accepted by the router
    ReconnectIssued {
        address: Ipv4Net,
        retry_count: u32,
    },

    /// Reconnect request failed (tolerated)
    ReconnectFailed {
        error: String,
        retry_count: u32,
    },

    /// Retry budget exhausted, no action taken this tick
    Holding {
        retry_count: u32,
    },

    /// Holding state cleared after the configured number of ticks
    HoldReleased {
        holding_ticks: u32,
    },

    /// The PPPoE session was re-resolved to a new identifier
    SessionRefreshed {
        previous: SessionId,
        current: SessionId,
    },

    /// Polling loop stopped
    Stopped {
        reason: String,
    },
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Retry budget exhausted; no gateway calls were made
    Holding { retry_count: u32 },

    /// Retry counter cleared after holding; no gateway calls were made
    HoldReleased,

    /// The interface had no bound address
    AddressUnavailable,

    /// Fetching the address failed (tolerated)
    SampleFailed,

    /// Address lies within the target network
    InRange { address: Ipv4Net },

    /// Address outside the target network; reconnect issued
    Reconnected { address: Ipv4Net, retry_count: u32 },

    /// Address outside the target network; reconnect failed (tolerated)
    ReconnectFailed { address: Ipv4Net, retry_count: u32 },
}

/// Mutable state of the control loop
///
/// Owned by a single [`Watchdog`]; nothing else mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopState {
    /// Last successfully fetched address
    current_address: Ipv4Net,

    /// PPPoE session to reconnect
    session: SessionId,

    /// Reconnects issued since the address was last in range
    retry_count: u32,

    /// Consecutive ticks spent holding
    holding_ticks: u32,
}

impl LoopState {
    fn new(current_address: Ipv4Net, session: SessionId) -> Self {
        Self {
            current_address,
            session,
            retry_count: 0,
            holding_ticks: 0,
        }
    }

    /// Last successfully fetched address
    pub fn current_address(&self) -> Ipv4Net {
        self.current_address
    }

    /// PPPoE session the watchdog reconnects
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Reconnects issued since the address was last in range
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Consecutive ticks spent holding
    pub fn holding_ticks(&self) -> u32 {
        self.holding_ticks
    }
}

/// PPPoE address watchdog
///
/// ## Lifecycle
///
/// 1. Resolve startup state with [`Watchdog::init()`]
/// 2. Start with [`Watchdog::run()`] or [`Watchdog::run_until()`]
/// 3. Loop runs until the shutdown future resolves or a fatal error occurs
///
/// ## Threading
///
/// All decisions run sequentially on the task that drives the loop. Gateway
/// calls are awaited one at a time.
pub struct Watchdog {
    /// Router management API
    gateway: Box<dyn RouterGateway>,

    /// PPPoE interface being watched
    interface: String,

    /// Network the address should fall within
    target: Ipv4Net,

    /// Sleep between ticks
    check_interval: Duration,

    /// Retry counter value that starts the holding state
    max_retry: u32,

    /// Holding ticks before the retry counter is cleared (0 = never)
    hold_recovery_ticks: u32,

    /// Whether gateway errors after startup are logged instead of returned
    tolerate_gateway_errors: bool,

    /// Loop-owned mutable state
    state: LoopState,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<WatchdogEvent>,
}

impl Watchdog {
    /// Resolve the startup state and create the watchdog
    ///
    /// Fetches the interface address and resolves the PPPoE session. Either
    /// one missing is fatal, as is any gateway error; there is no retry.
    ///
    /// # Returns
    ///
    /// A tuple of (watchdog, event_receiver) where event_receiver yields watchdog events
    pub async fn init(
        gateway: Box<dyn RouterGateway>,
        config: WatchdogConfig,
    ) -> Result<(Self, mpsc::Receiver<WatchdogEvent>)> {
        config.validate()?;

        let interface = config.interface.clone();

        let current_address = gateway
            .fetch_interface_address(&interface)
            .await?
            .ok_or_else(|| {
                Error::resolution(format!("Empty address on interface {}", interface))
            })?;
        info!("Get address {} on interface {}", current_address, interface);

        let session = gateway
            .resolve_session_id(&interface)
            .await?
            .ok_or_else(|| {
                Error::resolution(format!("PPPoE client {} not found", interface))
            })?;
        info!("Get PPPoE client {} on interface {}", session, interface);

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let watchdog = Self {
            gateway,
            interface,
            target: config.target_network,
            check_interval: config.check_interval(),
            max_retry: config.max_retry,
            hold_recovery_ticks: config.hold_recovery_ticks,
            tolerate_gateway_errors: config.tolerate_gateway_errors,
            state: LoopState::new(current_address, session),
            event_tx: tx,
        };

        Ok((watchdog, rx))
    }

    /// Override the interval between ticks
    ///
    /// Configuration only allows whole seconds; embedders and tests can use
    /// finer intervals.
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Current loop state
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Whether the retry budget is exhausted
    pub fn is_holding(&self) -> bool {
        self.state.retry_count >= self.max_retry
    }

    /// Run until Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run with an optional programmatic shutdown signal
    ///
    /// With `None` this behaves like [`Watchdog::run()`].
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        match shutdown_rx {
            Some(rx) => {
                self.run_until(async {
                    let _ = rx.await;
                })
                .await
            }
            None => self.run().await,
        }
    }

    /// Run the polling loop until `shutdown` resolves
    ///
    /// A shutdown arriving mid-tick or mid-sleep ends the loop immediately.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: A gateway error escaped a tick (only when errors are not tolerated)
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.emit_event(WatchdogEvent::Started {
            interface: self.interface.clone(),
            address: self.state.current_address,
            session: self.state.session.clone(),
        });
        info!(
            "Watching {} for an address in {} (interval {:?}, max retry {})",
            self.interface, self.target, self.check_interval, self.max_retry
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(WatchdogEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    return Ok(());
                }

                result = self.tick_and_wait() => {
                    if let Err(e) = result {
                        error!("Watchdog stopped: {}", e);
                        self.emit_event(WatchdogEvent::Stopped {
                            reason: e.to_string(),
                        });
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn tick_and_wait(&mut self) -> Result<()> {
        self.tick().await?;
        tokio::time::sleep(self.check_interval).await;
        Ok(())
    }

    /// Run one sample/decide/act iteration without sleeping
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        if self.is_holding() {
            return Ok(self.hold());
        }

        let sample = match self.gateway.fetch_interface_address(&self.interface).await {
            Ok(sample) => sample,
            Err(e) if self.tolerate_gateway_errors => {
                error!(
                    "Failed to fetch address on interface {}: {}. Retry after {:?}.",
                    self.interface, e, self.check_interval
                );
                return Ok(TickOutcome::SampleFailed);
            }
            Err(e) => return Err(e),
        };

        let Some(address) = sample else {
            warn!(
                "Cannot get address on interface {}. Retry after {:?}.",
                self.interface, self.check_interval
            );
            return Ok(TickOutcome::AddressUnavailable);
        };

        if address != self.state.current_address {
            let previous = std::mem::replace(&mut self.state.current_address, address);
            warn!("Get new address {} (previous: {})", address, previous);
            self.emit_event(WatchdogEvent::AddressChanged {
                previous,
                current: address,
            });
        }

        if in_target(&address, &self.target) {
            self.state.retry_count = 0;
            self.state.holding_ticks = 0;
            debug!(
                "Current address {} already in target network {}",
                address, self.target
            );
            self.emit_event(WatchdogEvent::InRange { address });
            return Ok(TickOutcome::InRange { address });
        }

        warn!(
            "Address {} is outside {}. Reconnect and check again after {:?}.",
            address, self.target, self.check_interval
        );

        match self.gateway.trigger_reconnect(&self.state.session).await {
            Ok(()) => {
                self.state.retry_count += 1;
                self.emit_event(WatchdogEvent::ReconnectIssued {
                    address,
                    retry_count: self.state.retry_count,
                });
                Ok(TickOutcome::Reconnected {
                    address,
                    retry_count: self.state.retry_count,
                })
            }
            Err(e) if self.tolerate_gateway_errors => {
                self.state.retry_count += 1;
                error!(
                    "Failed to reconnect PPPoE client {} (attempt {}): {}",
                    self.state.session, self.state.retry_count, e
                );
                self.emit_event(WatchdogEvent::ReconnectFailed {
                    error: e.to_string(),
                    retry_count: self.state.retry_count,
                });

                if e.is_not_found() {
                    self.refresh_session().await;
                }

                Ok(TickOutcome::ReconnectFailed {
                    address,
                    retry_count: self.state.retry_count,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Holding-state tick: no gateway calls
    fn hold(&mut self) -> TickOutcome {
        if self.hold_recovery_ticks > 0 {
            self.state.holding_ticks += 1;

            if self.state.holding_ticks >= self.hold_recovery_ticks {
                let holding_ticks = self.state.holding_ticks;
                self.state.retry_count = 0;
                self.state.holding_ticks = 0;
                warn!(
                    "Held for {} ticks, clearing retry counter and resuming checks",
                    holding_ticks
                );
                self.emit_event(WatchdogEvent::HoldReleased { holding_ticks });
                return TickOutcome::HoldReleased;
            }
        }

        error!(
            "Max retry exceeded ({} reconnects). Restart or remove this program.",
            self.state.retry_count
        );
        self.emit_event(WatchdogEvent::Holding {
            retry_count: self.state.retry_count,
        });
        TickOutcome::Holding {
            retry_count: self.state.retry_count,
        }
    }

    /// Look the PPPoE session up again after the router reported it missing
    async fn refresh_session(&mut self) {
        match self.gateway.resolve_session_id(&self.interface).await {
            Ok(Some(session)) if session != self.state.session => {
                info!(
                    "PPPoE client {} re-resolved: {} -> {}",
                    self.interface, self.state.session, session
                );
                let previous = std::mem::replace(&mut self.state.session, session.clone());
                self.emit_event(WatchdogEvent::SessionRefreshed {
                    previous,
                    current: session,
                });
            }
            Ok(Some(_)) => {
                debug!(
                    "PPPoE client {} still has id {}",
                    self.interface, self.state.session
                );
            }
            Ok(None) => {
                warn!("PPPoE client {} no longer exists", self.interface);
            }
            Err(e) => {
                warn!("Failed to re-resolve PPPoE client {}: {}", self.interface, e);
            }
        }
    }

    /// Emit a watchdog event
    fn emit_event(&self, event: WatchdogEvent) {
        // A closed channel just means nobody is listening
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("gateway", &self.gateway.gateway_name())
            .field("interface", &self.interface)
            .field("target", &self.target)
            .field("check_interval", &self.check_interval)
            .field("max_retry", &self.max_retry)
            .field("state", &self.state)
            .finish()
    }
}
