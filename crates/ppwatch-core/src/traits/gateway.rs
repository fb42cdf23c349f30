// # Router Gateway Trait
//
// Defines the interface the watchdog needs from the router's management API.
//
// ## Implementations
//
// - RouterOS REST: `ppwatch-routeros` crate
//
// ## Usage
//
// ```rust,ignore
// use ppwatch_core::RouterGateway;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let gateway = /* RouterGateway implementation */;
//
//     if let Some(address) = gateway.fetch_interface_address("pppoe-out1").await? {
//         println!("bound address: {}", address);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use ipnet::Ipv4Net;
use std::fmt;

/// Opaque identifier of a PPPoE client session on the router
///
/// The format belongs to the router (RouterOS uses `*1`, `*2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a router-provided identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier as the router reported it
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for router gateway implementations
///
/// A gateway is a thin capability layer over the router's management API.
/// It answers queries and executes the reconnect command; it never decides
/// when to reconnect.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by `Watchdog`)
/// - ❌ Cache addresses between calls (owned by `Watchdog`)
/// - ❌ Spawn tasks
///
/// Every method performs at most one request and reports non-success
/// responses as [`crate::Error::Gateway`].
#[async_trait]
pub trait RouterGateway: Send + Sync {
    /// Get the address currently bound to an interface
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Ipv4Net))`: The first bound address with its prefix length
    /// - `Ok(None)`: The interface has no address records
    /// - `Err(Error)`: The request failed or the router refused it
    async fn fetch_interface_address(
        &self,
        interface: &str,
    ) -> Result<Option<Ipv4Net>, crate::Error>;

    /// Resolve the PPPoE client session bound to an interface name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(SessionId))`: The session identifier
    /// - `Ok(None)`: No PPPoE client with that name exists
    /// - `Err(Error)`: The request failed or the router refused it
    async fn resolve_session_id(&self, interface: &str)
    -> Result<Option<SessionId>, crate::Error>;

    /// Tear down and re-establish a PPPoE session
    ///
    /// The router drops the session and renegotiates its address. The call
    /// returns as soon as the router accepts the request; the new address is
    /// only observable on a later fetch.
    async fn trigger_reconnect(&self, session: &SessionId) -> Result<(), crate::Error>;

    /// Get the gateway name (for logging/debugging)
    fn gateway_name(&self) -> &'static str;
}
