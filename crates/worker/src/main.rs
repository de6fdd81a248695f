//! `nfse-worker` -- command-line driver for the synchronization engine.
//!
//! One invocation is one run: mirror a company over a date range, sweep
//! every active company, rebuild rows from the artifact bucket, refresh
//! presigned links, or repair incomplete rows.
//!
//! # Environment variables
//!
//! | Variable            | Required | Default                        | Description                    |
//! |---------------------|----------|--------------------------------|--------------------------------|
//! | `DATABASE_URL`      | yes      | --                             | Postgres connection string     |
//! | `PLUGNOTAS_API_KEY` | yes      | --                             | Remote API key                 |
//! | `PLUGNOTAS_BASE_URL`| no       | `https://api.plugnotas.com.br` | Remote API base URL            |
//! | `AWS_ACCESS_KEY`    | yes      | --                             | Bucket access key              |
//! | `AWS_SECRET_KEY`    | yes      | --                             | Bucket secret key              |
//! | `AWS_REGION`        | no       | `sa-east-1`                    | Bucket region                  |
//! | `AWS_BUCKET`        | no       | `plug-notas`                   | Artifact bucket name           |
//! | `AWS_ENDPOINT`      | no       | --                             | Custom S3 endpoint             |
//! | `PAGE_SIZE`         | no       | `50`                           | Listing page size              |
//! | `LINK_TTL_SECS`     | no       | `86400`                        | Presigned link lifetime        |

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nfse_cloud::ObjectStore;
use nfse_plugnotas::PlugnotasApi;
use nfse_sync::{RunOutcome, SyncConfig, SyncEngine, SyncError};

#[derive(Debug, Parser)]
#[command(name = "nfse-worker")]
#[command(about = "NFS-e mirror and reconciliation worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Mirror one company's notes over a date range.
    Sync {
        /// Recipient CNPJ, punctuated or digits.
        cnpj: String,
        /// First day covered.
        #[arg(default_value = "2024-01-01")]
        from: NaiveDate,
        /// Last day covered; defaults to today.
        to: Option<NaiveDate>,
    },
    /// Mirror every active company over the recent months.
    SyncAll,
    /// Rebuild note rows from the artifact bucket.
    StorageSync {
        /// Limit the listing to one recipient CNPJ.
        cnpj: Option<String>,
    },
    /// Re-presign the stored artifact access links.
    RefreshLinks,
    /// Re-fetch rows still missing a total or a structured recipient.
    Repair {
        /// Most rows handled in one pass.
        #[arg(default_value_t = 100)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nfse_worker=info,nfse_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = SyncConfig::from_env().unwrap_or_else(|error| {
        tracing::error!(%error, "configuration is incomplete");
        std::process::exit(1);
    });

    let pool = nfse_db::create_pool(&config.database_url)
        .await
        .unwrap_or_else(|error| {
            tracing::error!(%error, "database connection failed");
            std::process::exit(1);
        });

    if let Err(error) = nfse_db::health_check(&pool).await {
        tracing::error!(%error, "database health check failed");
        std::process::exit(1);
    }

    if let Err(error) = nfse_db::run_migrations(&pool).await {
        tracing::error!(%error, "database migrations failed");
        std::process::exit(1);
    }

    let source = PlugnotasApi::new(config.base_url.clone(), config.api_key.clone());
    let store = ObjectStore::connect(config.store.clone()).await;
    let engine = SyncEngine::new(pool, source, store, config.page_size, config.link_ttl);

    let result: Result<(), SyncError> = match cli.command {
        Command::Sync { cnpj, from, to } => {
            let to = to.unwrap_or_else(|| Utc::now().date_naive());
            engine.sync_company(&cnpj, from, to).await.map(report_run)
        }
        Command::SyncAll => engine.sync_all().await.map(report_run),
        Command::StorageSync { cnpj } => {
            engine.sync_storage(cnpj.as_deref()).await.map(report_run)
        }
        Command::RefreshLinks => engine.refresh_links().await.map(|o| {
            tracing::info!(
                scanned = o.scanned,
                refreshed = o.refreshed,
                errors = o.errors,
                "link refresh complete"
            );
        }),
        Command::Repair { limit } => engine.repair_incomplete(limit).await.map(|o| {
            tracing::info!(
                scanned = o.scanned,
                repaired = o.repaired,
                misses = o.misses,
                errors = o.errors,
                "repair complete"
            );
        }),
    };

    if let Err(error) = result {
        tracing::error!(%error, "run failed");
        std::process::exit(1);
    }
}

fn report_run(outcome: RunOutcome) {
    tracing::info!(
        found = outcome.found,
        synced = outcome.synced,
        skipped = outcome.skipped,
        errors = outcome.errors,
        "run complete"
    );
}
