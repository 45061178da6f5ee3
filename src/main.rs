use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use rentala_lib::db::open_sqlite_pool;
use rentala_lib::entity::{PaymentFields, PropertyFields, TenantFields};
use rentala_lib::logging::{self, LogOptions};
use rentala_lib::{
    stats, AppError, Config, Entity, EntityFields, EntityId, EntityStore, FilterView,
    HttpSyncClient, OfflineClient, SnapshotCache, SqliteCache, StoreError, SyncClient,
};

/// Exit code for rejected input: bad JSON, invalid fields, unknown ids.
const EXIT_REJECTED: i32 = 2;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("RENTALA_GIT_HASH"),
    ")"
);

#[derive(Debug, Parser)]
#[command(
    name = "rentala",
    about = "Manage Rentala properties, tenants and payments",
    version,
    long_version = LONG_VERSION
)]
struct Cli {
    /// Configuration file (JSON). Defaults to `<data dir>/config.json`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the cache database.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Base URL of the REST API.
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Bearer token sent with every request.
    #[arg(long, global = true)]
    token: Option<String>,
    /// Skip the API entirely and work from the cache.
    #[arg(long, global = true)]
    offline: bool,
    /// Install example records on a first run without API or cache.
    #[arg(long, global = true)]
    seed_examples: bool,
    /// Emit logs on stderr as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,
    /// Also write JSON logs to a daily file in this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand)]
    Properties(Action),
    #[command(subcommand)]
    Tenants(Action),
    #[command(subcommand)]
    Payments(Action),
}

#[derive(Debug, Subcommand)]
enum Action {
    /// List records, filtered and paginated.
    List {
        /// Status name, or `all`.
        #[arg(long)]
        status: Option<String>,
        /// Case-insensitive text matched against the searchable fields.
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
        /// Return every match on one page.
        #[arg(long)]
        all: bool,
    },
    /// Show one record.
    Show { id: String },
    /// Create a record from a JSON object (`@path` reads a file).
    Create {
        #[arg(long)]
        data: String,
    },
    /// Apply a partial JSON update to a record.
    Update {
        id: String,
        #[arg(long)]
        data: String,
    },
    Delete { id: String },
    /// Summary figures for the whole collection.
    Stats,
}

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start async runtime: {err}");
            process::exit(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let _log_guard = logging::init_with(&LogOptions {
        json: cli.json_logs,
        file_dir: cli.log_dir.clone(),
    })
    .context("initialize logging")?;

    let mut config = Config::load(cli.config.as_deref()).context("load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(base) = cli.api_base {
        config.api_base = base;
    }
    if let Some(token) = cli.token {
        config.api_token = Some(token);
    }
    config.seed_examples |= cli.seed_examples;

    let pool = open_sqlite_pool(&config.cache_db_path())
        .await
        .context("open cache database")?;
    let cache = SnapshotCache::new(
        Arc::new(SqliteCache::new(pool.clone()).await?),
        config.cache_prefix.clone(),
    );

    let code = match cli.command {
        Commands::Properties(action) => {
            let store = build_store::<PropertyFields>(&config, &cache, cli.offline)?;
            run_action(store, action, &config, |all| {
                to_value(stats::property_summary(all))
            })
            .await?
        }
        Commands::Tenants(action) => {
            let store = build_store::<TenantFields>(&config, &cache, cli.offline)?;
            run_action(store, action, &config, |all| to_value(stats::tenant_summary(all))).await?
        }
        Commands::Payments(action) => {
            let store = build_store::<PaymentFields>(&config, &cache, cli.offline)?;
            run_action(store, action, &config, |all| to_value(stats::payment_summary(all))).await?
        }
    };

    pool.close().await;
    Ok(code)
}

fn build_store<F: EntityFields>(
    config: &Config,
    cache: &SnapshotCache,
    offline: bool,
) -> Result<EntityStore<F>> {
    let client: Arc<dyn SyncClient<F>> = if offline {
        Arc::new(OfflineClient)
    } else {
        Arc::new(HttpSyncClient::<F>::new(
            &config.api_base,
            config.api_token.clone(),
            config.request_timeout(),
        )?)
    };
    Ok(EntityStore::new(client, cache.clone()).with_options(config.store_options()))
}

async fn run_action<F: EntityFields>(
    mut store: EntityStore<F>,
    action: Action,
    config: &Config,
    summarize: fn(&[Entity<F>]) -> serde_json::Result<Value>,
) -> Result<i32> {
    let loaded = store.load().await;

    match action {
        Action::List {
            status,
            query,
            page,
            page_size,
            all,
        } => {
            let mut view = FilterView::<F>::new();
            view.set_page_size(if all { None } else { page_size.or(config.page_size()) });
            if let Some(status) = status {
                view.set_filter(&status);
            }
            if let Some(query) = query {
                view.set_query(&query);
            }
            view.set_page(page);
            let page = view.compute(store.entities());
            print_json(&json!({
                "load": loaded.status,
                "resurrected": loaded.resurrected,
                "discarded": loaded.discarded,
                "page": page,
            }))?;
        }
        Action::Show { id } => {
            let id = EntityId::from(id);
            match store.by_id(&id) {
                Some(entity) => print_json(entity)?,
                None => return reject(StoreError::NotFound { kind: F::KIND, id }),
            }
        }
        Action::Create { data } => {
            let fields: F = match parse_body(&data) {
                Ok(fields) => fields,
                Err(err) => return reject(err),
            };
            match store.create(fields).await {
                Ok(mutation) => print_json(&json!({ "load": loaded.status, "mutation": mutation }))?,
                Err(err) => return reject(err),
            }
        }
        Action::Update { id, data } => {
            let patch: F::Patch = match parse_body(&data) {
                Ok(patch) => patch,
                Err(err) => return reject(err),
            };
            match store.update(&EntityId::from(id), patch).await {
                Ok(mutation) => print_json(&json!({ "load": loaded.status, "mutation": mutation }))?,
                Err(err) => return reject(err),
            }
        }
        Action::Delete { id } => match store.delete(&EntityId::from(id)).await {
            Ok(mutation) => print_json(&json!({ "load": loaded.status, "mutation": mutation }))?,
            Err(err) => return reject(err),
        },
        Action::Stats => {
            print_json(&json!({
                "load": loaded.status,
                "stats": summarize(store.entities())?,
            }))?;
        }
    }

    Ok(0)
}

fn parse_body<T: DeserializeOwned>(data: &str) -> Result<T, AppError> {
    let raw = match data.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| AppError::from(e).with_context("path", path))?,
        None => data.to_string(),
    };
    serde_json::from_str(&raw).map_err(|e| AppError::from(e).with_context("input", "--data"))
}

fn reject(err: impl Into<AppError>) -> Result<i32> {
    let err: AppError = err.into();
    eprintln!("{}", serde_json::to_string_pretty(&err)?);
    Ok(EXIT_REJECTED)
}

fn to_value<T: Serialize>(value: T) -> serde_json::Result<Value> {
    serde_json::to_value(value)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
