use clap::Parser;
use poloniex_candle_collector::config::AppConfig;
use poloniex_candle_collector::supervisor::Supervisor;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (missing file is not an error).
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    init_tracing(&config.general.log_level);

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, shutting down");
            shutdown_cancel.cancel();
        }
    });

    let supervisor = Supervisor::new(config, cancel);
    if let Err(e) = supervisor.run().await {
        error!(error = %e, "collector exited with an error");
        return Err(e.into());
    }

    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
