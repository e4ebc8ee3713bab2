use clap::{Parser, Subcommand};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::time::Duration;

use store_sync::configuration::get_configuration;
use store_sync::connectors::StoreApiClient;
use store_sync::storage::PgStoreStorage;
use store_sync::sync::run_sync_store;
use store_sync::telemetry::{get_subscriber, init_subscriber};

#[derive(Parser, Debug)]
#[command(name = "store-sync", version, about = "Synchronize the external store feed into the dashboard database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single sync pass and print its JSON report
    Run,
    /// Run sync passes on a fixed interval; the first pass starts immediately
    Schedule {
        /// Seconds between passes
        #[arg(long, env = "STORE_SYNC_INTERVAL_SECS", default_value_t = 3600)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let subscriber = get_subscriber("store-sync".into(), "info".into());
    init_subscriber(subscriber);

    let settings = get_configuration().expect("Failed to read configuration.");

    tracing::info!(
        db_host = %settings.database.host,
        db_port = settings.database.port,
        db_name = %settings.database.database_name,
        "Connecting to PostgreSQL"
    );

    // one connection stays pinned to the advisory lock for the whole pass
    if (settings.database.max_connections as usize) <= settings.sync.concurrency {
        tracing::warn!(
            max_connections = settings.database.max_connections,
            concurrency = settings.sync.concurrency,
            "Connection pool is not larger than the sync concurrency; workers will contend for connections"
        );
    }

    let connect_options = PgConnectOptions::new()
        .host(&settings.database.host)
        .port(settings.database.port)
        .username(&settings.database.username)
        .password(&settings.database.password)
        .database(&settings.database.database_name)
        .ssl_mode(PgSslMode::Disable);

    let pg_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options)
        .await
        .expect("Failed to connect to database.");

    let storage = PgStoreStorage::new(pg_pool);
    let api = StoreApiClient::new(&settings.store_api);

    match cli.command {
        Commands::Run => {
            let report = run_sync_store(&api, &storage, &settings.sync).await?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Commands::Schedule { interval_secs } => {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                // a pass skipped on the lock is already reported by the
                // orchestrator; only hard failures need surfacing here, and
                // they must not kill the scheduler
                if let Err(err) = run_sync_store(&api, &storage, &settings.sync).await {
                    tracing::error!(error = %err, "Scheduled sync pass failed");
                }
            }
        }
    }

    Ok(())
}
