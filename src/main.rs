use clap::Parser;
use docscan_ocr::config::{Args, Config};
use docscan_ocr::server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from(args);

    tracing::info!("Starting docscan-ocr-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        save_debug = config.save_debug,
        rotation = config.rotation.as_str(),
        "Binding to {}:{}",
        config.host,
        config.port
    );

    server::run(config).await
}
