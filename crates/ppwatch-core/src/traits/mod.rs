//! Core traits for the PPPoE watchdog
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RouterGateway`]: Query and reconnect a PPPoE client on the router

pub mod gateway;

pub use gateway::{RouterGateway, SessionId};
