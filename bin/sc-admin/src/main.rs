//! SocialConnect Admin CLI
//!
//! Inspects and maintains the connection collection. Results are printed
//! as JSON on stdout; logs go to stderr.
//!
//! `--in-memory` runs a command against a process-local store instead of
//! MongoDB, optionally seeded from a JSON array of records (`--seed`), so
//! changes can be tried without touching the database.
//!
//! ## Configuration
//!
//! Loaded from `--config`, `SOCIALCONNECT_CONFIG` or the standard search
//! paths, then overridden by `SOCIALCONNECT_*` environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SOCIALCONNECT_MONGODB_URI` | `mongodb://localhost:27017` | MongoDB connection string |
//! | `SOCIALCONNECT_MONGODB_DATABASE` | `socialconnect` | Database name |
//! | `SOCIALCONNECT_COLLECTION` | `userConnections` | Connection collection |
//! | `SOCIALCONNECT_ENSURE_INDEXES` | `true` | Create indexes on startup |
//! | `SOCIALCONNECT_PROVIDERS` | - | Comma-separated registered providers |
//! | `LOG_FORMAT` | `text` | `json` for structured logs |
//! | `RUST_LOG` | `info` | Log level |

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use sc_common::ConnectionData;
use sc_config::{AppConfig, ConfigLoader};
use sc_connect::{
    ensure_indexes, ConnectionRecord, ConnectionStore, InMemoryConnectionStore, MongoConnectionStore,
    StaticProviderRegistry, UsersConnectionRepository,
};

/// SocialConnect connection store administration
#[derive(Parser, Debug)]
#[command(name = "sc-admin")]
#[command(about = "Inspect and maintain SocialConnect user connections")]
struct Args {
    /// Config file (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Use an in-memory store instead of MongoDB (dry run)
    #[arg(long, global = true)]
    in_memory: bool,

    /// JSON array of connection records to load into the in-memory store
    #[arg(long, global = true, requires = "in_memory")]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an example config file
    ExampleConfig,

    /// Create the connection collection indexes
    InitIndexes,

    /// List a user's connections, by provider then rank
    List {
        user_id: String,

        /// Only connections to this provider
        #[arg(long)]
        provider: Option<String>,
    },

    /// Show a user's primary connection to a provider
    Primary { user_id: String, provider_id: String },

    /// Find the local users owning provider user ids
    UserIds {
        provider_id: String,

        #[arg(required = true)]
        provider_user_ids: Vec<String>,
    },

    /// Add a connection after the user's existing ones
    Add {
        user_id: String,
        provider_id: String,
        provider_user_id: String,

        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        profile_url: Option<String>,

        #[arg(long)]
        image_url: Option<String>,

        #[arg(long, env = "SOCIALCONNECT_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,

        /// Token expiry, epoch milliseconds
        #[arg(long)]
        expire_time: Option<i64>,
    },

    /// Remove one connection, or every connection to the provider
    Remove {
        user_id: String,
        provider_id: String,
        provider_user_id: Option<String>,
    },

    /// Show the rank the next connection to a provider would get
    NextRank { user_id: String, provider_id: String },
}

/// Connection as printed. Credentials are left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionView {
    user_id: String,
    provider_id: String,
    provider_user_id: String,
    rank: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire_time: Option<i64>,
    expired: bool,
}

impl From<ConnectionRecord> for ConnectionView {
    fn from(record: ConnectionRecord) -> Self {
        let expired = record.to_data().has_expired();
        Self {
            user_id: record.user_id,
            provider_id: record.provider_id,
            provider_user_id: record.provider_user_id,
            rank: record.rank,
            display_name: record.display_name,
            profile_url: record.profile_url,
            image_url: record.image_url,
            expire_time: record.expire_time,
            expired,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Removed {
    removed: u64,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_in_memory(seed: Option<&Path>) -> Result<InMemoryConnectionStore> {
    let records: Vec<ConnectionRecord> = match seed {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read seed file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid seed file {}", path.display()))?
        }
        None => Vec::new(),
    };

    let store = InMemoryConnectionStore::with_records(records)?;
    info!(records = store.len(), "Using in-memory connection store");
    Ok(store)
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    loader.load().context("Failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    sc_common::logging::init_logging("sc-admin");

    let args = Args::parse();

    if let Command::ExampleConfig = args.command {
        print!("{}", AppConfig::example_toml());
        return Ok(());
    }

    let mut config = load_config(args.config)?;
    debug!(
        database = %config.mongodb.database,
        collection = %config.connections.collection,
        "Configuration loaded"
    );

    if let Command::InitIndexes = args.command {
        if args.in_memory {
            bail!("init-indexes needs MongoDB and cannot run with --in-memory");
        }
        // Reported below rather than failing the connect
        config.connections.ensure_indexes = false;
        let store = MongoConnectionStore::connect(&config)
            .await
            .context("Failed to connect to MongoDB")?;

        let result = ensure_indexes(&store.collection().clone_with_type()).await;
        print_json(&serde_json::json!({
            "indexesCreated": result.indexes_created,
            "failed": result.failed,
            "warnings": result.warnings,
        }))?;
        if !result.is_success() {
            bail!("Index initialization finished with {} warning(s)", result.warnings.len());
        }
        return Ok(());
    }

    let store: Arc<dyn ConnectionStore> = if args.in_memory {
        Arc::new(open_in_memory(args.seed.as_deref())?)
    } else {
        Arc::new(
            MongoConnectionStore::connect(&config)
                .await
                .context("Failed to connect to MongoDB")?,
        )
    };

    match args.command {
        Command::ExampleConfig | Command::InitIndexes => {}

        Command::List { user_id, provider } => {
            let records = match provider {
                Some(provider_id) => store.list_by_user_and_provider(&user_id, &provider_id).await?,
                None => store.list_by_user(&user_id).await?,
            };
            let views: Vec<ConnectionView> = records.into_iter().map(ConnectionView::from).collect();
            print_json(&views)?;
        }

        Command::Primary { user_id, provider_id } => {
            let primary = store.get_primary(&user_id, &provider_id).await?;
            print_json(&primary.map(ConnectionView::from))?;
        }

        Command::UserIds { provider_id, provider_user_ids } => {
            let mut user_ids: Vec<String> = if provider_user_ids.len() == 1 {
                store.user_ids_with_connection(&provider_id, &provider_user_ids[0]).await?
            } else {
                let ids: HashSet<String> = provider_user_ids.into_iter().collect();
                store
                    .user_ids_connected_to(&provider_id, &ids)
                    .await?
                    .into_iter()
                    .collect()
            };
            user_ids.sort();
            print_json(&user_ids)?;
        }

        Command::Add {
            user_id,
            provider_id,
            provider_user_id,
            display_name,
            profile_url,
            image_url,
            access_token,
            expire_time,
        } => {
            let users = UsersConnectionRepository::new(
                Arc::clone(&store),
                Arc::new(StaticProviderRegistry::from_config(&config.connections)),
            );
            let repository = users.create_connection_repository(&user_id)?;

            let mut connection = ConnectionData::new(provider_id.clone(), provider_user_id.clone());
            connection.display_name = display_name;
            connection.profile_url = profile_url;
            connection.image_url = image_url;
            connection.access_token = access_token;
            connection.expire_time = expire_time;

            repository.add_connection(&connection).await?;

            let stored = store
                .get_by_key(&user_id, &provider_id, &provider_user_id)
                .await?
                .context("Connection missing after add")?;
            print_json(&ConnectionView::from(stored))?;
        }

        Command::Remove { user_id, provider_id, provider_user_id } => {
            let removed = match provider_user_id {
                Some(provider_user_id) => {
                    store.remove_by_key(&user_id, &provider_id, &provider_user_id).await?
                }
                None => store.remove_by_provider(&user_id, &provider_id).await?,
            };
            info!(user_id = %user_id, provider_id = %provider_id, removed, "Remove finished");
            print_json(&Removed { removed })?;
        }

        Command::NextRank { user_id, provider_id } => {
            let rank = store.next_rank(&user_id, &provider_id).await?;
            print_json(&rank)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_in_memory_flag_is_global() {
        let args = Args::try_parse_from(["sc-admin", "list", "joey", "--in-memory"]).unwrap();
        assert!(args.in_memory);
        assert!(matches!(args.command, Command::List { .. }));
    }

    #[test]
    fn test_seed_requires_in_memory() {
        let result = Args::try_parse_from(["sc-admin", "--seed", "records.json", "list", "joey"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_seeded_in_memory_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"userId": "joey", "providerId": "twitter", "providerUserId": "@joey_ramones", "rank": 1}},
                {{"userId": "joey", "providerId": "twitter", "providerUserId": "@JeffreyHyman", "rank": 2, "displayName": "joey r."}}
            ]"#
        )
        .unwrap();

        let store = open_in_memory(Some(file.path())).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.next_rank("joey", "twitter").await.unwrap(), 3);

        let primary = store.get_primary("joey", "twitter").await.unwrap().unwrap();
        assert_eq!(primary.provider_user_id, "@joey_ramones");
    }

    #[test]
    fn test_seed_with_duplicate_connection_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"userId": "cj", "providerId": "fake", "providerUserId": "c-j", "rank": 1}},
                {{"userId": "cj", "providerId": "fake", "providerUserId": "c-j", "rank": 2}}
            ]"#
        )
        .unwrap();

        assert!(open_in_memory(Some(file.path())).is_err());
    }

    #[test]
    fn test_unseeded_in_memory_store_is_empty() {
        assert!(open_in_memory(None).unwrap().is_empty());
    }
}
