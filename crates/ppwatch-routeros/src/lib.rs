// # RouterOS REST Gateway
//
// This crate provides the RouterOS v7 REST implementation of `RouterGateway`.
//
// ## Implementation Status
//
// - ✅ One HTTP request per gateway call
// - ✅ Full error propagation to the watchdog (it decides what is fatal)
// - ✅ HTTP timeout configured
// - ✅ Password never appears in logs or Debug output
// - ❌ NO retry logic (owned by Watchdog)
// - ❌ NO caching (owned by Watchdog)
//
// ## Security
//
// Requests use HTTP basic authentication. Certificate validation is disabled
// by default because RouterOS ships a self-signed certificate; this is only
// acceptable when the router is reached over a trusted management network.
// Set `accept_invalid_certs = false` once the router has a trusted certificate.
//
// ## API Reference
//
// - Address records: GET `/rest/ip/address?actual-interface=...&.proplist=address`
// - PPPoE clients: GET `/rest/interface/pppoe-client?name=...&.proplist=.id`
// - Reconnect: PATCH `/rest/interface/pppoe-client/:id` with `{}`

use async_trait::async_trait;
use ipnet::Ipv4Net;
use ppwatch_core::config::GatewayConfig;
use ppwatch_core::network::parse_address;
use ppwatch_core::traits::{RouterGateway, SessionId};
use ppwatch_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Address record as returned by `/rest/ip/address`
#[derive(Debug, Clone, Deserialize)]
struct AddressRecord {
    /// Address with prefix length, e.g. "58.32.1.5/32"
    address: String,
}

/// PPPoE client record as returned by `/rest/interface/pppoe-client`
#[derive(Debug, Clone, Deserialize)]
struct PppoeClientRecord {
    /// Internal RouterOS identifier, e.g. "*1"
    #[serde(rename = ".id")]
    id: String,
}

/// RouterOS REST gateway
///
/// Holds one `reqwest::Client` that is reused for every request.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
pub struct RouterOsGateway {
    /// API root without trailing slash (e.g. "https://192.168.88.1")
    base_url: String,

    /// Basic-auth username
    username: String,

    /// Basic-auth password
    /// ⚠️ NEVER log this value
    password: String,

    /// Whether certificate validation is disabled
    accept_invalid_certs: bool,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for RouterOsGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterOsGateway")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl RouterOsGateway {
    /// Create a gateway from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(RouterOsGateway)`: Ready to issue requests
    /// - `Err(Error::Config)`: Invalid configuration or HTTP client setup failure
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            // The management endpoint sits on the local network
            .no_proxy()
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        if config.accept_invalid_certs && base_url.starts_with("https://") {
            tracing::warn!(
                "TLS certificate validation is disabled for {}. Only use this on a trusted network.",
                base_url
            );
        }

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            accept_invalid_certs: config.accept_invalid_certs,
            client,
        })
    }

    /// Full URL for a REST path (without leading slash)
    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/{}", self.base_url, path)
    }

    /// GET a REST collection filtered by `query`
    async fn list<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<T>> {
        let response = self
            .client
            .get(self.endpoint(path))
            .query(query)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| Error::transport(format!("GET {} failed: {}", path, e)))?;

        let response = check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response: {}", e)))?;

        Ok(serde_json::from_slice(&body)?)
    }
}

/// Map a non-success response to `Error::Gateway`
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    let message = match status.as_u16() {
        401 | 403 => format!("Authentication failed: check username/password. {}", error_text),
        _ => error_text,
    };

    Err(Error::gateway(status.as_u16(), message))
}

#[async_trait]
impl RouterGateway for RouterOsGateway {
    async fn fetch_interface_address(&self, interface: &str) -> Result<Option<Ipv4Net>> {
        tracing::debug!("Fetching address records for {}", interface);

        let records: Vec<AddressRecord> = self
            .list(
                "ip/address",
                &[("actual-interface", interface), (".proplist", "address")],
            )
            .await?;

        let Some(record) = records.first() else {
            return Ok(None);
        };

        let address = parse_address(&record.address);
        if address.is_none() {
            tracing::warn!(
                "Ignoring unparsable address '{}' on {}",
                record.address,
                interface
            );
        }

        Ok(address)
    }

    async fn resolve_session_id(&self, interface: &str) -> Result<Option<SessionId>> {
        tracing::debug!("Looking up PPPoE client {}", interface);

        let records: Vec<PppoeClientRecord> = self
            .list(
                "interface/pppoe-client",
                &[("name", interface), (".proplist", ".id")],
            )
            .await?;

        Ok(records.into_iter().next().map(|r| SessionId::new(r.id)))
    }

    async fn trigger_reconnect(&self, session: &SessionId) -> Result<()> {
        tracing::info!("Requesting reconnect of PPPoE client {}", session);

        let path = format!("interface/pppoe-client/{}", session);
        let response = self
            .client
            .patch(self.endpoint(&path))
            .basic_auth(&self.username, Some(&self.password))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| Error::transport(format!("PATCH {} failed: {}", path, e)))?;

        check_status(response).await?;
        Ok(())
    }

    fn gateway_name(&self) -> &'static str {
        "routeros"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> GatewayConfig {
        GatewayConfig {
            base_url: base_url.to_string(),
            password: "s3cret".to_string(),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_gateway_creation() {
        let gateway = RouterOsGateway::new(&GatewayConfig::default());
        assert!(gateway.is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = RouterOsGateway::new(&config("router.lan"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let gateway = RouterOsGateway::new(&config("https://192.168.88.1/")).unwrap();
        assert_eq!(
            gateway.endpoint("ip/address"),
            "https://192.168.88.1/rest/ip/address"
        );
    }

    #[test]
    fn test_gateway_name() {
        let gateway = RouterOsGateway::new(&config("https://192.168.88.1")).unwrap();
        assert_eq!(gateway.gateway_name(), "routeros");
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let gateway = RouterOsGateway::new(&config("https://192.168.88.1")).unwrap();
        let debug = format!("{:?}", gateway);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_record_deserialization_ignores_extra_fields() {
        let addresses: Vec<AddressRecord> = serde_json::from_str(
            r#"[{".id": "*5", "address": "58.32.1.5/32", "interface": "pppoe-out1"}]"#,
        )
        .unwrap();
        assert_eq!(addresses[0].address, "58.32.1.5/32");

        let clients: Vec<PppoeClientRecord> =
            serde_json::from_str(r#"[{".id": "*1"}]"#).unwrap();
        assert_eq!(clients[0].id, "*1");
    }
}
