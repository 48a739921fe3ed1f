use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use feedcrawl::config::Config;
use feedcrawl::crawl::Importer;
use feedcrawl::storage::{Database, DatabaseError, FeedSource, StoredNewsItem};
use feedcrawl::util::validate_url;

/// Get the config directory path (~/.config/feedcrawl/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedcrawl"))
}

fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // SEC-007: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "feedcrawl", about = "Crawl RSS and Atom feeds into a local news store")]
struct Cli {
    /// Config file (default: ~/.config/feedcrawl/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config file
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a feed
    Add {
        url: String,
        /// Display name (defaults to the URL's host)
        #[arg(long)]
        name: Option<String>,
    },
    /// Crawl one feed source, or all of them
    Crawl {
        #[arg(long)]
        id: Option<i64>,
        /// Also consider entries older than the newest stored item
        #[arg(long)]
        include_older: bool,
    },
    /// List stored items of a feed source, newest first
    Items {
        id: i64,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Full-text search over stored items
    Search { query: String },
    /// List feed sources with their last crawl status
    Sources,
    /// Unsubscribe from a feed and drop its items
    Remove { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = get_config_dir()?;
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            ensure_config_dir(&config_dir)?;
            config_dir.join("config.toml")
        }
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = match (&cli.database, &config.database_path) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => PathBuf::from(path),
        (None, None) => {
            ensure_config_dir(&config_dir)?;
            config_dir.join("feedcrawl.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The database is locked by another process. Please try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    match cli.command {
        Command::Add { url, name } => {
            let parsed = validate_url(&url).with_context(|| format!("Invalid feed URL: {url}"))?;
            let name = name
                .or_else(|| parsed.host_str().map(str::to_string))
                .unwrap_or_else(|| url.clone());
            let source = db
                .insert_feed_source(&name, parsed.as_str())
                .await
                .context("Failed to add feed source")?;
            println!("Added feed {}: {} ({})", source.id, source.name, source.url);
        }
        Command::Crawl { id, include_older } => {
            let sources = match id {
                Some(id) => vec![db
                    .get_feed_source(id)
                    .await
                    .context("Failed to load feed source")?
                    .ok_or_else(|| anyhow::anyhow!("No feed source with id {id}"))?],
                None => db.list_feed_sources().await.context("Failed to list feed sources")?,
            };
            let ids: Vec<i64> = sources.iter().map(|s| s.id).collect();

            let importer = Importer::from_config(&config, db.clone())
                .context("Failed to build HTTP clients")?;
            importer.import_all(sources, !include_older).await;

            for id in ids {
                if let Some(source) = db.get_feed_source(id).await? {
                    print_source(&source);
                }
            }
        }
        Command::Items { id, limit } => {
            let items = db
                .items_for_source(id, Some(limit))
                .await
                .context("Failed to load items")?;
            items.iter().for_each(print_item);
        }
        Command::Search { query } => {
            let items = db.search_items(&query).await.context("Search failed")?;
            if items.is_empty() {
                println!("No matches.");
            }
            items.iter().for_each(print_item);
        }
        Command::Sources => {
            let sources = db.list_feed_sources().await.context("Failed to list feed sources")?;
            sources.iter().for_each(print_source);
        }
        Command::Remove { id } => {
            if db.delete_feed_source(id).await.context("Failed to remove feed source")? {
                println!("Removed feed {id}");
            } else {
                anyhow::bail!("No feed source with id {id}");
            }
        }
    }

    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn print_source(source: &FeedSource) {
    let crawled = source
        .last_crawled_at
        .map(format_timestamp)
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{:>4}  {}  {}\n      last crawl: {}  status: {}",
        source.id,
        source.name,
        source.url,
        crawled,
        source.last_crawl_status.as_deref().unwrap_or("-")
    );
}

fn print_item(item: &StoredNewsItem) {
    println!(
        "{}  {}\n      {}",
        item.published_at.format("%Y-%m-%d %H:%M"),
        item.title,
        item.link
    );
}
