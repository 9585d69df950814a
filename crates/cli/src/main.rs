use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, warn};

use uproot_kubehub::KubeClient;
use uproot_teardown::{Outcome, Teardown, TeardownOptions, TermPrompt};

#[derive(Parser, Debug)]
#[command(name = "uprootctl", version, about = "uproot CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tear down an uproot installation from the current cluster
    Uninstall {
        /// Also delete user data (secrets, volumes, the default namespace)
        #[arg(long = "all", action = ArgAction::SetTrue)]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(long = "force", short = 'f', action = ArgAction::SetTrue)]
        force: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("UPROOT_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("UPROOT_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid UPROOT_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Uninstall { all, force } => {
            info!(all, force, "uninstall invoked");
            let client = KubeClient::try_default().await?;
            let installed = uproot_manifest::installed()?;
            let teardown =
                Teardown::new(Arc::new(client), installed, TeardownOptions { all, force });
            match teardown.run(&TermPrompt).await? {
                Outcome::Aborted => {
                    warn!("uninstall aborted by operator");
                    println!("Aborting uninstall");
                }
                Outcome::TornDown => println!("uproot uninstalled"),
            }
        }
    }

    Ok(())
}
