//! medrep-daemon - clinician report daemon.
//!
//! Startup is fail-closed: configuration is validated in full (signing
//! secret, listen address, registry URL, bootstrap account) before the
//! store is opened or the listener is bound. A daemon that cannot sign
//! session tokens must not come up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use medrep_core::config::{BootstrapConfig, DaemonConfig};
use medrep_core::password::{dummy_hash, hash_password};
use medrep_core::token::TokenMinter;
use medrep_daemon::http;
use medrep_daemon::registry::HttpRegistryClient;
use medrep_daemon::state::AppState;
use medrep_daemon::store::Store;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// medrep daemon - clinician health-report service
#[derive(Parser, Debug)]
#[command(name = "medrep-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "medrep.toml")]
    config: PathBuf,

    /// SQLite database path (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Listen address, host:port (overrides the config file)
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = if args.config.exists() {
        DaemonConfig::from_file(&args.config).context("failed to load configuration")?
    } else {
        info!(path = %args.config.display(), "no config file found, using defaults");
        DaemonConfig::default()
    };

    // CLI args override the config file.
    if let Some(db) = args.db {
        config.storage.db_path = db;
    }
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }

    config
        .validate()
        .context("startup configuration check failed")?;
    let token_secret = config
        .resolve_token_secret()
        .context("failed to resolve token signing secret")?;
    let listen_addr = config.listen_addr()?;

    let store =
        Store::open(&config.storage.db_path).context("failed to open the report database")?;
    bootstrap_account(&store, config.bootstrap.as_ref())?;

    let registry = HttpRegistryClient::new(
        config.registry_base_url()?,
        Duration::from_secs(config.registry.connect_timeout_secs),
        Duration::from_secs(config.registry.request_timeout_secs),
    )
    .context("failed to build the registry client")?;

    let dummy = dummy_hash().context("failed to prepare the login dummy hash")?;
    let state = Arc::new(AppState::new(
        store,
        TokenMinter::new(token_secret),
        Arc::new(registry),
        config.http.secure_cookies,
        dummy,
    ));
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .context("failed to bind HTTP listener")?;
    info!(addr = %listen_addr, "medrep daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("medrep daemon stopped");
    Ok(())
}

/// Ensures the configured bootstrap account exists. Credentials never reach
/// the logs; only the resulting account id does.
fn bootstrap_account(store: &Store, bootstrap: Option<&BootstrapConfig>) -> Result<()> {
    let Some(bootstrap) = bootstrap else {
        return Ok(());
    };
    if store.find_account_by_email(&bootstrap.email)?.is_some() {
        debug!("bootstrap account already present");
        return Ok(());
    }

    let password_hash =
        hash_password(&bootstrap.password).context("failed to hash the bootstrap password")?;
    let account = store
        .create_account(&bootstrap.email, &password_hash, Utc::now())
        .context("failed to create the bootstrap account")?;
    info!(account_id = %account.id, "bootstrap account created");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_account_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let bootstrap = BootstrapConfig {
            email: "clinician@example.com".to_string(),
            password: "password123".to_string(),
        };

        bootstrap_account(&store, Some(&bootstrap)).unwrap();
        let first = store
            .find_account_by_email("clinician@example.com")
            .unwrap()
            .unwrap();

        // A second run must leave the existing account alone.
        bootstrap_account(&store, Some(&bootstrap)).unwrap();
        let second = store
            .find_account_by_email("clinician@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.password_hash, second.password_hash);
    }

    #[test]
    fn bootstrap_is_skipped_without_configuration() {
        let store = Store::open_in_memory().unwrap();
        bootstrap_account(&store, None).unwrap();
        assert!(store
            .find_account_by_email("clinician@example.com")
            .unwrap()
            .is_none());
    }
}
