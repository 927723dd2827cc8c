use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guide_providers::{
    config::Config, guide_providers::GuideProvider, services::GuideAggregator,
    utils::StandardHttpClient, xmltv,
};

#[derive(Parser)]
#[command(name = "guide-providers")]
#[command(version)]
#[command(about = "Collect EPG data from XMLTV feeds and Schedules Direct into one XMLTV file")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = guide_providers::config::defaults::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output file, `-` for stdout (overrides config file)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `--output -` leaves stdout clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("guide_providers={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting guide-providers v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config.display());

    if let Some(output) = cli.output {
        config.output.path = output;
    }

    let http_client = StandardHttpClient::from_config(&config.http)?;

    let mut providers: Vec<Arc<dyn GuideProvider>> = Vec::new();
    for provider_config in config.provider_configurations() {
        match provider_config.get_provider_with_client(http_client.clone()) {
            Ok(provider) => {
                info!("Configured guide provider '{}'", provider.name());
                providers.push(provider);
            }
            Err(e) => error!("Skipping provider '{}': {}", provider_config.label(), e),
        }
    }

    if providers.is_empty() {
        if config.providers.is_empty() {
            warn!("No guide providers configured, writing an empty guide");
        } else {
            bail!("None of the {} configured providers could be set up", config.providers.len());
        }
    }

    let aggregator = GuideAggregator::new(providers, config.output.generator_name.clone());
    let (tv, stats) = aggregator.collect().await;

    for name in &stats.degraded_providers {
        warn!("Provider '{}' did not refresh this cycle", name);
    }

    let document = xmltv::write_document(&tv)?;

    if config.output.path.as_os_str() == "-" {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(document.as_bytes()).await?;
        stdout.flush().await?;
    } else {
        tokio::fs::write(&config.output.path, document.as_bytes()).await?;
        info!(
            "Wrote {} channels and {} programmes to {}",
            stats.channels,
            stats.programmes,
            config.output.path.display()
        );
    }

    Ok(())
}
