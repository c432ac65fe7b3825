//! Disk Cache - command-line front end
//!
//! Reads and writes a persistent cache from shell scripts and cron jobs.
//! Values go to stdout; logs go to stderr.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use disk_cache::cli::{Cli, Command};
use disk_cache::{Cache, CacheConfig, DirResolver, SnapshotStore, SystemTempDir};

/// Exit status for a key that is absent or expired.
const EXIT_MISS: u8 = 1;
/// Exit status for any error.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    // Defaults to "warn", can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "disk_cache=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = cli.resolve_config(CacheConfig::from_env());
    debug!(filename = %config.filename, validity = config.validity, "Configuration loaded");

    let resolver: Box<dyn DirResolver> = match &cli.dir {
        Some(dir) => Box::new(dir.clone()),
        None => Box::new(SystemTempDir),
    };

    match &cli.command {
        Command::Path => {
            let store = SnapshotStore::new(resolver.as_ref(), &config.filename)?;
            println!("{}", store.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Get { key } => {
            let mut cache = open_cache(&config, resolver.as_ref())?;
            match cache.get(key)? {
                Some(value) => {
                    println!("{}", value);
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::from(EXIT_MISS)),
            }
        }
        Command::Set { key, value } => {
            let mut cache = open_cache(&config, resolver.as_ref())?;
            cache
                .set(key.clone(), value.clone())
                .with_context(|| format!("failed to store '{}'", key))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_cache(config: &CacheConfig, resolver: &dyn DirResolver) -> anyhow::Result<Cache<String, String>> {
    Cache::builder(config.filename.clone())
        .validity(config.validity)
        .resolver(resolver.dir())
        .build()
        .with_context(|| format!("failed to open cache '{}'", config.filename))
}
