use anyhow::Result;
use clap::Parser;
use decaywatch_core::config::{DecayDetectionConfig, DispatchConfig, Settings, TrendConfig};
use decaywatch_db::gateway::PgGateway;
use decaywatch_db::queries;
use decaywatch_dispatch::{Dispatcher, EmailProviderConfig, HttpSenders};
use futures_util::StreamExt;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

mod jobs;

/// Runs one decay analysis sweep over active tracked URLs. Scheduling is
/// external (cron or a container job); the binary exits when the sweep
/// finishes.
#[derive(Debug, Parser)]
#[command(name = "decaywatch-worker")]
struct Args {
    /// Restrict the sweep to a single user.
    #[arg(long)]
    user: Option<String>,

    /// Restrict the sweep to a single URL.
    #[arg(long)]
    url: Option<String>,

    /// Score and record history but never send alerts.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    let decay_config = DecayDetectionConfig::default();
    decay_config.validate()?;
    let trend_config = TrendConfig::default();
    trend_config.validate()?;

    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let senders = HttpSenders::new(
        client,
        EmailProviderConfig {
            api_url: settings.email_api_url.clone(),
            api_key: settings.email_api_key.clone(),
            from: settings.email_from.clone(),
        },
    );
    let gateway = PgGateway::new(db.clone());
    let dispatcher = Dispatcher::new(senders, gateway.clone(), DispatchConfig::default());

    let state = jobs::WorkerState {
        gateway,
        dispatcher,
        decay_config,
        trend_config,
        dry_run: args.dry_run,
    };

    let urls =
        queries::tracked_urls::list_active(&db, args.user.as_deref(), args.url.as_deref()).await?;
    info!(count = urls.len(), dry_run = args.dry_run, "starting analysis sweep");

    let state = &state;
    futures_util::stream::iter(urls)
        .for_each_concurrent(settings.worker_concurrency, |tracked| async move {
            if let Err(err) = jobs::analysis::analyze_url(state, &tracked).await {
                error!(url = %tracked.url, error = %err, "analysis failed");
            }
        })
        .await;

    info!("sweep complete");
    Ok(())
}
