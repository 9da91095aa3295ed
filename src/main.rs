use referral_rewards::{bootstrap, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing::{error, info};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,referral_rewards=debug,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting referral reward worker");

    let config = config::Config::from_env()?;
    let worker = bootstrap::initialize_worker(&config).await?;

    if config.run_once {
        let report = worker.run_once().await?;
        info!(
            rewarded_links = report.rewarded_links,
            dispatch_failures = report.dispatch_failures,
            "🏁 Single reward pass finished"
        );
        return Ok(());
    }

    worker
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;
    info!("👋 Worker stopped");

    Ok(())
}
