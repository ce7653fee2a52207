//! Portex: expansion service for cross-runtime pipeline transforms

use anyhow::Context;
use clap::{Parser, Subcommand};
use portex_core::{BindMode, ServiceConfig};
use portex_service::{start_server, ExpansionService};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portex", about = "Portex: transform expansion service")]
struct Cli {
    /// JSON config file (default: $PORTEX_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP expansion service
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        /// loopback or lan
        #[arg(short, long)]
        bind: Option<String>,
        /// Environment URN stamped on primitive transforms
        #[arg(long)]
        environment: Option<String>,
    },
    /// Expand one request read from a JSON file and print the response
    Expand {
        /// Request file; `-` reads stdin
        #[arg(short, long)]
        request: PathBuf,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// List registered transform URNs
    Transforms,
    /// Show version
    Version,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portex=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ServiceConfig> {
    let config = match path {
        Some(p) => ServiceConfig::load(p),
        None => ServiceConfig::discover(),
    };
    config.context("loading service config")
}

fn read_request(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut std::io::stdin(), &mut buf)?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Serve {
            port,
            bind,
            environment,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            info!("Loaded config (port {}, environment {})", config.port, config.environment);
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind = BindMode::parse(&bind);
            }
            if let Some(environment) = environment {
                config.environment = environment;
            }
            start_server(config).await?;
        }

        Commands::Expand { request, pretty } => {
            let config = load_config(cli.config.as_ref())?;
            let service = ExpansionService::from_config(&config)?;
            let body = read_request(&request)?;
            info!("Expanding request from {} ({} bytes)", request.display(), body.len());
            let response = service.expand_json(&body);
            match (&response.error, &response.transform) {
                (Some(err), _) => warn!("Expansion failed: {}: {}", err.kind, err.message),
                (None, Some(root)) => info!(
                    "Expanded {} into {} subtransform(s)",
                    root.unique_name,
                    root.subtransforms.len()
                ),
                (None, None) => {}
            }
            let out = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{}", out);
            if response.is_error() {
                std::process::exit(1);
            }
        }

        Commands::Transforms => {
            let config = load_config(cli.config.as_ref())?;
            let service = ExpansionService::from_config(&config)?;
            for t in service.transforms() {
                println!("{}\t{}", t.urn, t.description);
            }
        }

        Commands::Version => {
            println!("portex v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
