//! shoplist - drive the offline cache of the shopping list app from the terminal.
//!
//! Installs and activates cache versions against a live origin, serves single
//! requests through the caching policy, and lists the cache stores on disk.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shoplist_core::offline::{
    CacheStorage, ClientRegistry, DiskStorage, HttpNetwork, Method, OfflineCacheManager, Request,
    Url,
};
use shoplist_core::Config;

// ============================================================================
// Constants
// ============================================================================

/// When set, logs are also written to a daily-rolling file in this directory
const ENV_LOG_DIR: &str = "SHOPLIST_LOG_DIR";

const LOG_FILE_PREFIX: &str = "shoplist.log";

const USAGE: &str = "\
Usage: shoplist <command>

Commands:
  install                        Fetch and store the seed resources for the current version
  activate                       Install, then evict stale cache stores
  fetch <path-or-url> [--method M]
                                 Serve one request through the caching policy
  caches                         List cache stores on disk
  init                           Write the default config file
  --help                         Show this message

Environment:
  SHOPLIST_ORIGIN, SHOPLIST_VERSION, SHOPLIST_CACHE_DIR override the config file.
  SHOPLIST_LOG_DIR enables file logging. RUST_LOG sets the log level.";

type Manager = OfflineCacheManager<DiskStorage, HttpNetwork, ClientRegistry>;

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    if command == "--help" || command == "-h" {
        println!("{}", USAGE);
        return Ok(());
    }
    if command == "init" {
        return init_config();
    }

    let config = Config::load()?;
    info!(origin = %config.origin, version = %config.version, "shoplist starting");

    match command.as_str() {
        "install" => install(&config).await,
        "activate" => activate(&config).await,
        "fetch" => fetch(&config, &args[1..]).await,
        "caches" => list_caches(&config).await,
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }
}

/// Write the default config so it can be edited. Never overwrites.
fn init_config() -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    Config::default()
        .save()
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn build_manager(config: &Config) -> Result<Manager> {
    let settings = config.cache_settings()?;
    let storage = Arc::new(DiskStorage::new(config.stores_dir()?));
    let network =
        Arc::new(HttpNetwork::new(config.fetch_timeout()).context("Failed to build HTTP client")?);
    Ok(OfflineCacheManager::new(
        settings,
        storage,
        network,
        Arc::new(ClientRegistry::new()),
    ))
}

async fn install(config: &Config) -> Result<()> {
    let manager = build_manager(config)?;
    let report = manager.install().await?;

    println!("Installed {}", manager.cache_name());
    for url in &report.cached {
        println!("  cached  {}", url);
    }
    for (url, reason) in &report.failed {
        println!("  failed  {} ({})", url, reason);
    }
    Ok(())
}

async fn activate(config: &Config) -> Result<()> {
    let manager = build_manager(config)?;
    let installed = manager.install().await?;
    let report = manager.activate().await?;

    println!(
        "Activated {} ({} seeded, {} failed)",
        manager.cache_name(),
        installed.cached.len(),
        installed.failed.len()
    );
    for name in &report.deleted {
        println!("  deleted {}", name);
    }
    Ok(())
}

/// Parse `<path-or-url> [--method M]`
fn parse_fetch_args(config: &Config, args: &[String]) -> Result<Request> {
    let mut target = None;
    let mut method = Method::GET;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--method" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow::anyhow!("--method needs a value"))?;
            method = Method::from_bytes(value.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid method: {}", value))?;
        } else if target.is_none() {
            target = Some(arg.clone());
        } else {
            anyhow::bail!("Unexpected argument: {}", arg);
        }
    }

    let target = target.ok_or_else(|| anyhow::anyhow!("fetch needs a path or URL"))?;
    let url = if target.starts_with("http://") || target.starts_with("https://") {
        Url::parse(&target).with_context(|| format!("Invalid URL: {}", target))?
    } else {
        config
            .origin_url()?
            .join(&target)
            .with_context(|| format!("Invalid path: {}", target))?
    };
    Ok(Request::new(method, url))
}

async fn fetch(config: &Config, args: &[String]) -> Result<()> {
    let request = parse_fetch_args(config, args)?;
    let manager = build_manager(config)?;

    if !manager.resume().await? {
        info!(cache = manager.cache_name(), "No active cache store, installing");
        manager.install().await?;
        manager.activate().await?;
    }

    let served = manager.handle_fetch(request).await?;
    println!(
        "{} {} ({} bytes, {})",
        served.response.status,
        served.source,
        served.response.body.len(),
        served.response.header("content-type").unwrap_or("no content type")
    );

    // Let background writes and revalidation finish before exiting
    manager.settle().await;
    Ok(())
}

async fn list_caches(config: &Config) -> Result<()> {
    let settings = config.cache_settings()?;
    let storage = DiskStorage::new(config.stores_dir()?);

    let names = storage.keys().await?;
    if names.is_empty() {
        println!("No cache stores in {}", storage.root().display());
        return Ok(());
    }

    for name in names {
        let count = storage.entries(&name).await.map(|e| e.len()).unwrap_or(0);
        let marker = if name == settings.cache_name { "*" } else { " " };
        println!("{} {} ({} entries)", marker, name, count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn config() -> Config {
        Config {
            origin: "https://shop.example".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_parse_fetch_path() {
        let request = parse_fetch_args(&config(), &args(&["/menu"])).unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url.as_str(), "https://shop.example/menu");
    }

    #[test]
    fn test_parse_fetch_url_and_method() {
        let request = parse_fetch_args(
            &config(),
            &args(&["https://cdn.example/x.js", "--method", "post"]),
        )
        .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.host_str(), Some("cdn.example"));
    }

    #[test]
    fn test_parse_fetch_errors() {
        assert!(parse_fetch_args(&config(), &args(&[])).is_err());
        assert!(parse_fetch_args(&config(), &args(&["/a", "/b"])).is_err());
        assert!(parse_fetch_args(&config(), &args(&["/a", "--method"])).is_err());
    }
}
