//! carecache - inspect and maintain the on-device data cache.
//!
//! Works against the same persistent store directory the app uses, so it
//! can show what is cached, evict collections, perform the logout flush,
//! or read through the cache against the live document API.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use carecache_core::cache::FileStore;
use carecache_core::remote::HttpDocumentStore;
use carecache_core::utils::truncate_string;
use carecache_core::{CacheConfig, CacheManager, Collection, Config, DataAccess, ReadOptions};

/// Environment variable overriding the configured API base URL
const API_URL_ENV: &str = "CARECACHE_API_URL";

/// Environment variable holding the bearer token for `fetch`
const TOKEN_ENV: &str = "CARECACHE_TOKEN";

/// Longest payload preview printed by `get`
const PREVIEW_CHARS: usize = 2000;

const USAGE: &str = "\
Usage: carecache <command>

Commands:
  stats                         Entry counts per cache tier
  get <key>                     Show a cached entry (e.g. users:id:U1)
  clear-prefix <prefix>         Evict every key starting with <prefix>
  clear                         Evict all cached data
  logout                        Evict all cached data and forget the last user
  fetch <collection> [id] [--refresh]
                                Read through the cache from the document API";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let mut config = Config::load()?;
    let store_dir = config.store_dir()?;
    debug!(?store_dir, "Cache store directory");
    let store = FileStore::new(&store_dir)
        .with_context(|| format!("Failed to open cache store at {}", store_dir.display()))?;
    let cache = Arc::new(CacheManager::new(Arc::new(store), CacheConfig::default()));
    cache.ready().await;

    match (command, &args[1..]) {
        ("stats", []) => {
            let stats = cache.stats().await;
            println!("store:      {}", store_dir.display());
            println!("version:    {}", cache.stored_version().await.unwrap_or_default());
            println!("persistent: {}", stats.persistent_entry_count);
        }
        ("get", [key]) => match cache.get_entry::<Value>(key).await {
            Some(entry) => {
                let pretty = serde_json::to_string_pretty(&entry.payload)?;
                println!("written {} (ttl {}s)", entry.age_display(), entry.ttl_millis / 1000);
                println!("{}", truncate_string(&pretty, PREVIEW_CHARS));
            }
            None => println!("{}: not cached or expired", key),
        },
        ("clear-prefix", [prefix]) => {
            cache.clear_by_prefix(prefix).await;
            println!("Evicted keys starting with {}", prefix);
        }
        ("clear", []) => {
            cache.clear_all().await;
            println!("Cache cleared");
        }
        ("logout", []) => {
            cache.clear_all().await;
            config.last_username = None;
            config.save()?;
            info!("Logged out, cache cleared");
            println!("Logged out");
        }
        ("fetch", rest) => fetch(cache.clone(), &config, rest).await?,
        _ => bail!("Unrecognised command\n\n{}", USAGE),
    }

    cache.flush().await;
    Ok(())
}

/// Read a collection or one document through the cache.
async fn fetch(cache: Arc<CacheManager>, config: &Config, args: &[String]) -> Result<()> {
    let refresh = args.iter().any(|a| a == "--refresh");
    let positional: Vec<&str> = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();

    let (name, id) = match positional.as_slice() {
        [name] => (*name, None),
        [name, id] => (*name, Some(*id)),
        _ => bail!("Usage: carecache fetch <collection> [id] [--refresh]"),
    };
    let collection = Collection::by_name(name).with_context(|| {
        let known: Vec<&str> = Collection::ALL.iter().map(|c| c.name).collect();
        format!("Unknown collection {} (known: {})", name, known.join(", "))
    })?;

    let base_url = std::env::var(API_URL_ENV)
        .ok()
        .or_else(|| config.api_base_url.clone())
        .with_context(|| format!("No API URL configured; set {}", API_URL_ENV))?;
    let mut remote = HttpDocumentStore::new(&base_url)?;
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        remote.set_token(token);
    }

    let access = DataAccess::new(cache, Arc::new(remote));
    let options = if refresh {
        ReadOptions::refresh()
    } else {
        ReadOptions::default()
    };

    let output: Value = match id {
        Some(id) => access
            .read_by_id::<Value>(collection, id, options)
            .await?
            .unwrap_or(Value::Null),
        None => Value::Array(access.read_all::<Value>(collection, options).await?),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
