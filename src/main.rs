use std::{error, io::IsTerminal, path::PathBuf};

use clap::Parser;
use tracing::{error, info};

use kafkasync_dashboard::{
    config::{CliOverrides, DashboardConfig},
    download_client::DownloadClient,
    logging::init_logging,
    poller::Poller,
    ui::{self, TerminalGuard},
};

#[derive(Debug, Parser)]
#[command(name = "kafkasync-dashboard", version, about = "Live view of KafkaSync file downloads")]
struct Args {
    /// Extra config file, applied over the user and project config
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Download API endpoint (default http://localhost:8080/api/downloads)
    #[arg(long)]
    api_url: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Write logs here instead of the default state directory
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level for the dashboard, overridden by RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        return Self {
            config_path: args.config,
            api_url: args.api_url,
            interval_ms: args.interval_ms,
            timeout_ms: args.timeout_ms,
            log_file: args.log_file,
            log_level: args.log_level,
        };
    }
}

async fn dashboard(config: DashboardConfig) -> Result<(), Box<dyn error::Error>> {
    let client = DownloadClient::init(&config.api)?;
    info!(url = %client.url(), interval_ms = config.poll.interval_ms, "starting dashboard");

    let poller = Poller::new(client, config.poll.interval());
    let handle = poller.start();

    let mut guard = TerminalGuard::enter()?;
    let result = ui::run(guard.terminal_mut(), &poller).await;
    drop(guard);

    handle.stop().await;
    result?;
    return Ok(());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = Args::parse();

    if !std::io::stdout().is_terminal() {
        eprintln!("kafkasync-dashboard needs an interactive terminal.");
        return Ok(());
    }

    let config = DashboardConfig::load_hierarchy(&CliOverrides::from(args))?;
    let log_path = init_logging(&config.log)?;

    return match dashboard(config).await {
        Ok(_) => {
            info!("dashboard closed");
            Ok(())
        },
        Err(e) => {
            error!(error = %e, "dashboard failed");
            if let Some(path) = log_path {
                eprintln!("see {} for details", path.display());
            }
            Err(e)
        },
    };
}
