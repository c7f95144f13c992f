use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xcloud_tv::cli::{self, Cli};
use xcloud_tv::config::Config;
use xcloud_tv::db::{create_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xcloud_tv=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();

    tracing::info!("Starting Xcloud TV v{}", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;

    cli::run(cli, config, pool).await
}
