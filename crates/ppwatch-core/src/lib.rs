// # ppwatch-core
//
// Core library for the PPPoE address watchdog.
//
// ## Architecture Overview
//
// This library keeps a PPPoE session's address inside a target network:
// - **RouterGateway**: Trait for querying and reconnecting the PPPoE client
// - **Watchdog**: Control loop that samples, classifies and reconnects
// - **network**: Target network parsing and membership
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decisions live in the Watchdog, I/O in gateways
// 2. **Single Owner**: Loop state belongs to one Watchdog value, no globals
// 3. **Library-First**: The daemon is a thin wrapper around this crate

pub mod traits;
pub mod watchdog;
pub mod network;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{RouterGateway, SessionId};
pub use watchdog::{LoopState, TickOutcome, Watchdog, WatchdogEvent};
pub use config::{GatewayConfig, WatchdogConfig};
pub use error::{Error, Result};
