//! Datastore tool - inspect and hydrate a SQLite-backed datastore.

use datastore_engine::{
    ChangeFeed, KeySchema, MemoryOutbox, MergeEngine, PersistentStore, Storage,
};
use datastore_sqlite::{cli::USAGE, AppError, Command, Config, SqliteBackend};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "datastore=info,datastore_engine=info,datastore_sqlite=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(AppError::Usage(message)) => {
            eprintln!("{message}");
            if message != USAGE {
                eprintln!("{USAGE}");
            }
            std::process::exit(2);
        }
        Err(err) => return Err(err.into()),
    };

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::debug!(url = %config.database_url, "Opening datastore");
    let pool = datastore_sqlite::create_pool(&config.database_url, config.max_connections).await?;
    datastore_sqlite::run_migrations(&pool).await?;

    let store = PersistentStore::with_keys(
        SqliteBackend::new(pool),
        KeySchema::new(config.engine.namespace.clone()),
    );
    let storage = Arc::new(Storage::with_feed(
        store,
        ChangeFeed::new(config.engine.feed_capacity),
    ));

    // This tool never records local mutations, so the outbox stays empty.
    let outbox = Arc::new(MemoryOutbox::new());
    let engine = MergeEngine::with_config(storage, outbox, &config.engine);

    let mut stdout = std::io::stdout().lock();
    command.run(&engine, &mut stdout).await?;

    Ok(())
}
