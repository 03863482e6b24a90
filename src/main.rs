use anyhow::Context;
use clap::Parser;

use perpbot::config::AppConfig;
use perpbot::engine::Engine;
use perpbot::exchange::RestExchangeClient;
use perpbot::persistence::RedisScalarStore;

#[derive(Parser, Debug)]
#[command(
    name = "perpbot",
    about = "Position-management engine for a single derivatives exchange account"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Run a single reconciliation cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config).context("configuration rejected")?;

    tracing::info!("🚀 perpbot starting");
    tracing::info!("  markets: {:?}", config.engine.markets);
    tracing::info!("  strategy: {:?}", config.strategy.kind);
    tracing::info!("  interval: {}s", config.engine.interval_secs);

    let client = RestExchangeClient::new(
        config.exchange.base_url.clone(),
        config.exchange.api_key.clone(),
    );
    let store = RedisScalarStore::connect(&config.persistence.redis_url).await?;
    let engine = Engine::new(client, store, config)?;

    if cli.once {
        engine.run_cycle().await;
        return Ok(());
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  received ctrl-c, shutting down");
        }
        result = engine.run() => {
            if let Err(e) = result {
                tracing::error!("engine loop exited: {e}");
            }
        }
    }

    tracing::info!("👋 perpbot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perpbot=info".into()),
        )
        .init();
}
