// # ipwardend - IP Warden Daemon
//
// Thin integration layer: reads configuration from the environment,
// wires up the concrete resolver, store and Cloudflare client, and
// hands control to the poll engine in ipwarden-core. No propagation
// or scheduling logic lives here.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Baseline Database (required)
// - `DB_HOST`: PostgreSQL host
// - `DB_PORT`: PostgreSQL port
// - `DB_USER`: Database user
// - `DB_PASS`: Database password
// - `DB_NAME`: Database name
//
// ### Cloudflare (required)
// - `CF_API_KEY`: API token with zone DNS edit and account firewall
//   permissions
//
// ### Tuning (optional)
// - `IPWARDEN_ECHO_URL`: IP echo service URL (default: https://api.ipify.org)
// - `IPWARDEN_POLL_INTERVAL_SECS`: Base poll interval (default: 300)
// - `IPWARDEN_JITTER_SECS`: Jitter either side of the interval (default: 60)
// - `IPWARDEN_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export DB_HOST=localhost
// export DB_PORT=5432
// export DB_USER=ipwarden
// export DB_PASS=secret
// export DB_NAME=ipwarden
// export CF_API_KEY=your_token
//
// ipwardend
// ```

use anyhow::Result;
use ipwarden_core::{EngineEvent, PollConfig, PollEngine, StateStore as _};
use ipwarden_ip_http::{DEFAULT_ECHO_URL, HttpIpResolver};
use ipwarden_provider_cloudflare::CloudflareClient;
use ipwarden_store_postgres::{DbConfig, PostgresStateStore};
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum WardenExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<WardenExitCode> for ExitCode {
    fn from(code: WardenExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    db: DbConfig,
    api_token: String,
    echo_url: String,
    poll: PollConfig,
    log_level: String,
}

/// Read a required environment variable
fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| {
        anyhow::anyhow!("{name} is required. Set it via: export {name}=<value>")
    })
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Missing required variables fail here, at startup, so a
    /// misconfigured daemon never reaches the poll loop.
    fn from_env() -> Result<Self> {
        let port: u16 = required("DB_PORT")?
            .parse()
            .map_err(|_| anyhow::anyhow!("DB_PORT must be a port number"))?;

        let db = DbConfig {
            host: required("DB_HOST")?,
            port,
            user: required("DB_USER")?,
            password: required("DB_PASS")?,
            dbname: required("DB_NAME")?,
        };

        let mut poll = PollConfig::default();
        if let Ok(interval) = env::var("IPWARDEN_POLL_INTERVAL_SECS") {
            poll.interval_secs = interval
                .parse()
                .map_err(|_| anyhow::anyhow!("IPWARDEN_POLL_INTERVAL_SECS must be a number"))?;
        }
        if let Ok(jitter) = env::var("IPWARDEN_JITTER_SECS") {
            poll.jitter_secs = jitter
                .parse()
                .map_err(|_| anyhow::anyhow!("IPWARDEN_JITTER_SECS must be a number"))?;
        }

        Ok(Self {
            db,
            api_token: required("CF_API_KEY")?,
            echo_url: env::var("IPWARDEN_ECHO_URL").unwrap_or_else(|_| DEFAULT_ECHO_URL.to_string()),
            poll,
            log_level: env::var("IPWARDEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            anyhow::bail!("CF_API_KEY must not be empty");
        }

        if !self.echo_url.starts_with("https://") && !self.echo_url.starts_with("http://") {
            anyhow::bail!(
                "IPWARDEN_ECHO_URL must use HTTP or HTTPS scheme. Got: {}",
                self.echo_url
            );
        }

        self.poll.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "IPWARDEN_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return WardenExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {e}");
        return WardenExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return WardenExitCode::ConfigError.into();
    }

    info!("starting ipwardend");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {e}");
            return WardenExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("daemon error: {e}");
            WardenExitCode::RuntimeError
        } else {
            WardenExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wire up the components and run the poll engine until interrupted
async fn run_daemon(config: Config) -> Result<()> {
    let store = PostgresStateStore::connect(&config.db).await?;
    store.ensure_schema().await?;

    let resolver = HttpIpResolver::new(config.echo_url.clone());
    let cloudflare = CloudflareClient::new(config.api_token.clone());

    info!(
        "polling {} every {}s (±{}s jitter)",
        config.echo_url, config.poll.interval_secs, config.poll.jitter_secs
    );

    // The same client serves both propagation targets.
    let (engine, events) = PollEngine::new(
        Box::new(resolver),
        Box::new(store),
        Box::new(cloudflare.clone()),
        Box::new(cloudflare),
        config.poll,
    )?;

    tokio::spawn(log_events(events));

    engine.run().await?;

    info!("ipwardend stopped");
    Ok(())
}

/// Drain engine events into the log
///
/// The engine emits these for observability only; if this task falls
/// behind, the engine drops events rather than blocking.
async fn log_events(mut events: tokio::sync::mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::Started => info!("poll engine started"),
            EngineEvent::BaselineEstablished { ip } => {
                info!("baseline established at {ip}");
            }
            EngineEvent::IpUnchanged { .. } => {}
            EngineEvent::IpChangeDetected { old_ip, new_ip } => {
                info!("IP change detected: {old_ip} -> {new_ip}");
            }
            EngineEvent::DnsPropagated { summary, .. } => {
                info!(
                    "DNS propagation: {} matched, {} updated, {} errors",
                    summary.matched, summary.updated, summary.errors
                );
            }
            EngineEvent::FirewallPropagated { summary, .. } => {
                info!(
                    "firewall propagation: {} matched, {} updated, {} errors",
                    summary.matched, summary.updated, summary.errors
                );
            }
            EngineEvent::BaselineMoved { new_ip, .. } => {
                info!("baseline moved to {new_ip}");
            }
            EngineEvent::CycleFailed { error } => {
                warn!("poll cycle failed: {error}");
            }
            EngineEvent::Stopped { reason } => {
                info!("poll engine stopped: {reason}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            db: DbConfig {
                host: "localhost".to_string(),
                port: 5432,
                user: "ipwarden".to_string(),
                password: "secret".to_string(),
                dbname: "ipwarden".to_string(),
            },
            api_token: "a-real-looking-token".to_string(),
            echo_url: DEFAULT_ECHO_URL.to_string(),
            poll: PollConfig::default(),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn empty_token_is_rejected() {
        let mut config = valid_config();
        config.api_token = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_echo_url_is_rejected() {
        let mut config = valid_config();
        config.echo_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bogus_log_level_is_rejected() {
        let mut config = valid_config();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_jitter_is_rejected() {
        let mut config = valid_config();
        config.poll.interval_secs = 30;
        config.poll.jitter_secs = 60;
        assert!(config.validate().is_err());
    }
}
