// # ppwatchd - PPPoE Address Watchdog Daemon
//
// CRITICAL RULES:
// - This is a THIN integration layer ONLY
// - DO NOT add reconnect or retry decisions here
// - All watchdog logic MUST be in ppwatch-core
// - Configuration is via environment variables ONLY
//
// The ppwatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the RouterOS gateway
// 4. Running the watchdog until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Router
// - `ROS_REST_URL`: Router REST API root (default: https://127.0.0.1)
// - `ROS_USERNAME`: Basic-auth username (default: admin)
// - `ROS_PASSWORD`: Basic-auth password (default: empty)
// - `ROS_ACCEPT_INVALID_CERTS`: Skip TLS certificate validation (default: true)
// - `ROS_TIMEOUT`: Request timeout in seconds (default: 30)
//
// ### Watchdog
// - `PPPOE_INTERFACE`: PPPoE client interface (default: pppoe-out1)
// - `TARGET_NETWORK`: Desired address range in CIDR form (default: 58.32.0.0/16)
// - `CHECK_INTERVAL`: Seconds between checks (default: 5)
// - `MAX_RETRY`: Reconnects before holding (default: 20)
// - `HOLD_RECOVERY_TICKS`: Holding ticks before resuming, 0 = never (default: 0)
// - `TOLERATE_GATEWAY_ERRORS`: Retry on router errors instead of exiting (default: true)
//
// ### Logging
// - `LOG_LEVEL`: trace, debug, info, warn/warning, error/critical (default: INFO)
//
// ## Example
//
// ```bash
// export ROS_REST_URL=https://192.168.88.1
// export ROS_PASSWORD=your_password
// export TARGET_NETWORK=58.32.0.0/16
//
// ppwatchd
// ```

use anyhow::{Context, Result};
use ipnet::Ipv4Net;
use ppwatch_core::network::parse_target_network;
use ppwatch_core::{GatewayConfig, Watchdog, WatchdogConfig, WatchdogEvent};
use ppwatch_routeros::RouterOsGateway;
use std::env;
use std::fmt::Display;
use std::future::Future;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, error, info, trace, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration error
/// - 2: Runtime error (unexpected)
/// - 3: Interface address or PPPoE session could not be resolved at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// Startup resolution failure
    StartupError = 3,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    rest_url: String,
    username: String,
    password: String,
    accept_invalid_certs: bool,
    request_timeout_secs: u64,
    interface: String,
    target_network: Ipv4Net,
    check_interval_secs: u64,
    max_retry: u32,
    hold_recovery_ticks: u32,
    tolerate_gateway_errors: bool,
    log_level: Level,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let target = lookup("TARGET_NETWORK").unwrap_or_else(|| "58.32.0.0/16".to_string());

        Ok(Self {
            rest_url: lookup("ROS_REST_URL").unwrap_or_else(|| "https://127.0.0.1".to_string()),
            username: lookup("ROS_USERNAME").unwrap_or_else(|| "admin".to_string()),
            password: lookup("ROS_PASSWORD").unwrap_or_default(),
            accept_invalid_certs: parse_flag(&lookup, "ROS_ACCEPT_INVALID_CERTS", true)?,
            request_timeout_secs: parse_number(&lookup, "ROS_TIMEOUT", 30)?,
            interface: lookup("PPPOE_INTERFACE").unwrap_or_else(|| "pppoe-out1".to_string()),
            target_network: parse_target_network(&target)
                .with_context(|| format!("TARGET_NETWORK '{}' is not valid", target))?,
            check_interval_secs: parse_number(&lookup, "CHECK_INTERVAL", 5)?,
            max_retry: parse_number(&lookup, "MAX_RETRY", 20)?,
            hold_recovery_ticks: parse_number(&lookup, "HOLD_RECOVERY_TICKS", 0)?,
            tolerate_gateway_errors: parse_flag(&lookup, "TOLERATE_GATEWAY_ERRORS", true)?,
            log_level: parse_log_level(&lookup("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()))?,
        })
    }

    /// Validate the configuration
    ///
    /// Range and format checks are shared with the library configuration.
    fn validate(&self) -> Result<()> {
        self.watchdog_config()
            .validate()
            .context("Invalid watchdog configuration")?;
        self.gateway_config()
            .validate()
            .context("Invalid router configuration")?;

        if self.password.is_empty() {
            eprintln!("WARNING: ROS_PASSWORD is empty. Set it via: export ROS_PASSWORD=...");
        }

        if self.rest_url.starts_with("http://") {
            eprintln!(
                "WARNING: ROS_REST_URL uses HTTP (not HTTPS). \
                Credentials are sent in clear text."
            );
        }

        Ok(())
    }

    fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            interface: self.interface.clone(),
            target_network: self.target_network,
            check_interval_secs: self.check_interval_secs,
            max_retry: self.max_retry,
            hold_recovery_ticks: self.hold_recovery_ticks,
            tolerate_gateway_errors: self.tolerate_gateway_errors,
            ..WatchdogConfig::default()
        }
    }

    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.rest_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            accept_invalid_certs: self.accept_invalid_certs,
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// Parse a numeric variable, falling back to `default` when unset
fn parse_number<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a non-negative integer. Got '{}': {}", name, value, e)),
        None => Ok(default),
    }
}

/// Parse a boolean variable, falling back to `default` when unset
fn parse_flag<F>(lookup: &F, name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(default);
    };

    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got '{}'", name, value),
    }
}

/// Map a log level name to a tracing level
///
/// Accepts both tracing names and the WARNING/CRITICAL spellings.
fn parse_log_level(value: &str) -> Result<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "critical" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting ppwatchd daemon");
    info!(
        "Watching {} on {} for addresses in {}",
        config.interface, config.rest_url, config.target_network
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> DaemonExitCode {
    let gateway = match RouterOsGateway::new(&config.gateway_config()) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Failed to create RouterOS gateway: {}", e);
            return DaemonExitCode::ConfigError;
        }
    };

    let (mut watchdog, event_rx) =
        match Watchdog::init(Box::new(gateway), config.watchdog_config()).await {
            Ok(initialized) => initialized,
            Err(e) => {
                error!("Startup failed: {}", e);
                return DaemonExitCode::StartupError;
            }
        };

    let shutdown = match shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!("Shutdown handler error: {}", e);
            return DaemonExitCode::RuntimeError;
        }
    };

    let event_logger = tokio::spawn(log_events(event_rx));

    let result = watchdog.run_until(shutdown).await;

    // Closing the sender ends the event logger
    drop(watchdog);
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    match result {
        Ok(()) => {
            info!("Shutting down daemon");
            DaemonExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Watchdog error: {}", e);
            DaemonExitCode::RuntimeError
        }
    }
}

/// Forward watchdog events to the trace log
async fn log_events(event_rx: mpsc::Receiver<WatchdogEvent>) {
    let mut events = ReceiverStream::new(event_rx);
    while let Some(event) = events.next().await {
        trace!("Watchdog event: {:?}", event);
    }
}

/// Build a future that resolves on SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", received);
    })
}

/// Build a future that resolves on Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: SIGINT"),
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}
