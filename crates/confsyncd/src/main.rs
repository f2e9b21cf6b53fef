// # confsyncd - Config Sync Daemon
//
// Thin integration layer only: reads configuration from environment
// variables, wires concrete collaborators (file watcher, remote store,
// reloader) into the sync engines from confsync-core, and handles process
// lifecycle. All synchronization and editing logic lives in confsync-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Tracked files
// - `CONFSYNC_CONFIG_PATH`: primary config file (default /etc/dnsmasq.conf)
// - `CONFSYNC_CUSTOM_DNS_PATH`: auxiliary entries file (default /etc/dnsmasq.d/custom.conf)
// - `CONFSYNC_RESERVATIONS_PATH`: reservations file (default /etc/dnsmasq.d/reservations.conf)
// - `CONFSYNC_LEASES_PATH`: lease file (default /var/lib/misc/dnsmasq.leases)
// - `CONFSYNC_SYNC_LEASES`: also mirror the lease file (true/false, default false)
//
// ### Remote store
// - `CONFSYNC_STORE_TYPE`: remote store backend (memory)
//
// ### Reload
// - `CONFSYNC_RELOAD_COMMAND`: command run after each local mutation
//   (e.g. `supervisorctl signal SIGHUP dnsmasq`); unset means no reload
//
// ### Tuning
// - `CONFSYNC_RETRY_MAX_ATTEMPTS`, `CONFSYNC_RETRY_BACKOFF_MIN_MS`,
//   `CONFSYNC_RETRY_BACKOFF_MAX_MS`: remote-write retry loop
// - `CONFSYNC_REWATCH_MAX_ATTEMPTS`, `CONFSYNC_REWATCH_INITIAL_DELAY_MS`,
//   `CONFSYNC_REWATCH_MAX_DELAY_MS`: watch re-registration backoff
// - `CONFSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export CONFSYNC_CONFIG_PATH=/etc/dnsmasq.conf
// export CONFSYNC_RELOAD_COMMAND="supervisorctl signal SIGHUP dnsmasq"
//
// confsyncd
// ```

mod reload;

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use confsync_core::config::{RetryConfig, RewatchConfig, SyncConfig};
use confsync_core::store::MemoryRemoteStore;
use confsync_core::sync::SyncEngine;
use confsync_core::traits::reloader::NoopReloader;
use confsync_core::traits::{FileWatcher, RemoteStore, ServiceReloader};
use confsync_watch_notify::NotifyFileWatcher;

use reload::CommandReloader;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum ConfsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<ConfsyncExitCode> for ExitCode {
    fn from(code: ConfsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    config_path: Option<String>,
    custom_dns_path: Option<String>,
    reservations_path: Option<String>,
    leases_path: Option<String>,
    sync_leases: bool,
    store_type: String,
    reload_command: Option<String>,
    retry_max_attempts: Option<usize>,
    retry_backoff_min_ms: Option<u64>,
    retry_backoff_max_ms: Option<u64>,
    rewatch_max_attempts: Option<usize>,
    rewatch_initial_delay_ms: Option<u64>,
    rewatch_max_delay_ms: Option<u64>,
    log_level: String,
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} is not a valid value for {}", raw, name)),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            config_path: env::var("CONFSYNC_CONFIG_PATH").ok(),
            custom_dns_path: env::var("CONFSYNC_CUSTOM_DNS_PATH").ok(),
            reservations_path: env::var("CONFSYNC_RESERVATIONS_PATH").ok(),
            leases_path: env::var("CONFSYNC_LEASES_PATH").ok(),
            sync_leases: parse_env("CONFSYNC_SYNC_LEASES")?.unwrap_or(false),
            store_type: env::var("CONFSYNC_STORE_TYPE").unwrap_or_else(|_| "memory".to_string()),
            reload_command: env::var("CONFSYNC_RELOAD_COMMAND").ok(),
            retry_max_attempts: parse_env("CONFSYNC_RETRY_MAX_ATTEMPTS")?,
            retry_backoff_min_ms: parse_env("CONFSYNC_RETRY_BACKOFF_MIN_MS")?,
            retry_backoff_max_ms: parse_env("CONFSYNC_RETRY_BACKOFF_MAX_MS")?,
            rewatch_max_attempts: parse_env("CONFSYNC_REWATCH_MAX_ATTEMPTS")?,
            rewatch_initial_delay_ms: parse_env("CONFSYNC_REWATCH_INITIAL_DELAY_MS")?,
            rewatch_max_delay_ms: parse_env("CONFSYNC_REWATCH_MAX_DELAY_MS")?,
            log_level: env::var("CONFSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "memory" => {}
            _ => anyhow::bail!(
                "CONFSYNC_STORE_TYPE '{}' is not supported. \
                Supported types: memory",
                self.store_type
            ),
        }

        if let Some(ref command) = self.reload_command
            && command.split_whitespace().next().is_none()
        {
            anyhow::bail!("CONFSYNC_RELOAD_COMMAND must not be empty when set");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "CONFSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.sync_config().validate()?;
        Ok(())
    }

    /// Engine configuration with environment overrides applied over defaults
    fn sync_config(&self) -> SyncConfig {
        let mut sync = SyncConfig::default();
        if let Some(ref path) = self.config_path {
            sync.primary_config_path = path.into();
        }
        if let Some(ref path) = self.custom_dns_path {
            sync.custom_dns_path = path.into();
        }
        if let Some(ref path) = self.reservations_path {
            sync.reservations_path = path.into();
        }
        if let Some(ref path) = self.leases_path {
            sync.leases_path = path.into();
        }
        sync.sync_leases = self.sync_leases;

        let retry_defaults = RetryConfig::default();
        sync.retry = RetryConfig {
            max_attempts: self.retry_max_attempts.unwrap_or(retry_defaults.max_attempts),
            backoff_min_ms: self
                .retry_backoff_min_ms
                .unwrap_or(retry_defaults.backoff_min_ms),
            backoff_max_ms: self
                .retry_backoff_max_ms
                .unwrap_or(retry_defaults.backoff_max_ms),
        };

        let rewatch_defaults = RewatchConfig::default();
        sync.rewatch = RewatchConfig {
            max_attempts: self
                .rewatch_max_attempts
                .unwrap_or(rewatch_defaults.max_attempts),
            initial_delay_ms: self
                .rewatch_initial_delay_ms
                .unwrap_or(rewatch_defaults.initial_delay_ms),
            max_delay_ms: self
                .rewatch_max_delay_ms
                .unwrap_or(rewatch_defaults.max_delay_ms),
        };

        sync
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ConfsyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ConfsyncExitCode::ConfigError.into();
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
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ConfsyncExitCode::ConfigError.into();
    }

    info!("Starting confsyncd daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ConfsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            ConfsyncExitCode::RuntimeError
        } else {
            ConfsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let sync_config = config.sync_config();

    let store: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
    let watcher: Arc<dyn FileWatcher> = Arc::new(NotifyFileWatcher::new());
    let reloader: Arc<dyn ServiceReloader> = match config.reload_command {
        Some(ref command) => {
            info!("Reload command: {}", command);
            Arc::new(CommandReloader::from_command_line(command)?)
        }
        None => {
            info!("No reload command configured; mutations will not signal the service");
            Arc::new(NoopReloader)
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut engines = JoinSet::new();
    for pair in sync_config.tracked_pairs() {
        info!(
            "Tracking {} <-> {}",
            pair.file_path.display(),
            pair.collection_key
        );
        let engine = SyncEngine::new(pair, store.clone(), watcher.clone(), reloader.clone())
            .with_retry_policy(sync_config.retry.policy())
            .with_rewatch_policy(sync_config.rewatch.policy());
        let rx = shutdown_rx.clone();
        engines.spawn(async move { engine.run(rx).await });
    }
    drop(shutdown_rx);

    tokio::select! {
        signal = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", signal?);
        }
        Some(finished) = engines.join_next() => {
            // Engines only return early on a fatal error; take the rest down.
            let _ = shutdown_tx.send(true);
            while engines.join_next().await.is_some() {}
            match finished {
                Ok(Ok(())) => anyhow::bail!("sync engine exited unexpectedly"),
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    info!("Shutting down daemon");
    let _ = shutdown_tx.send(true);
    while let Some(finished) = engines.join_next().await {
        match finished {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Sync engine failed during shutdown: {}", e),
            Err(e) => error!("Sync engine task panicked: {}", e),
        }
    }

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
