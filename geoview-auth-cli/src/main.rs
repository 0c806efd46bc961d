//! geoview-auth command line
//!
//! Obtains tokens for secured map services, remembers credentials for
//! silent re-authentication and reports what is stored.

use clap::Parser;
use geoview_auth::{AuthConfig, ExchangeMode, LoggingConfig, StorageBackend};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::Init { path } = &cli.command {
        init_logging(&LoggingConfig::default());
        if let Err(e) = init_config(path) {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    let config = match AuthConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            eprintln!("Run `geoview-auth init` to create a default configuration.");
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(e) = commands::run(cli.command, &config).await {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    // Logging is best effort; a second subscriber is simply ignored
    let _ = if logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn init_config(config_path: &str) -> anyhow::Result<()> {
    if std::path::Path::new(config_path).exists() {
        anyhow::bail!(
            "Configuration file '{}' already exists. Remove it first if you want to create a new one.",
            config_path
        );
    }

    let config = AuthConfig::default();
    config.save(config_path)?;
    info!("Wrote default configuration to {}", config_path);

    println!("Configuration file '{config_path}' created successfully!");
    println!();
    println!("Default configuration includes:");
    match config.exchange.mode {
        ExchangeMode::Proxy => println!("  • Token exchange via proxy {}", config.exchange.proxy_url),
        ExchangeMode::Direct => println!("  • Direct token exchange"),
    }
    match config.storage.backend {
        StorageBackend::File => println!("  • Remembered credentials in the user data directory"),
        StorageBackend::Keyring => println!("  • Remembered credentials in the OS keychain"),
        StorageBackend::Memory => println!("  • Credentials kept in memory only"),
    }
    println!();
    println!("Set \"default_server\" to skip --server on every command.");
    Ok(())
}
