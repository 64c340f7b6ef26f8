use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datacap_chain::{api::run_chain_srv, Config};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lotus-datacap-chain", version, about = "lotus datacap of chain")]
struct Cli {
    /// Optional YAML config file; flags and environment override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print debug logs
    #[arg(long = "vv", global = true)]
    very_verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// run the chain server
    ChainSrv {
        /// Lotus repo directory
        #[arg(long, env = "LOTUS_PATH")]
        repo: Option<String>,

        /// Address to listen on
        #[arg(long)]
        listen: Option<String>,

        /// Node API info as token:multiaddr
        #[arg(long, env = "FULLNODE_API_INFO")]
        api_info: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.very_verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::ChainSrv {
            repo,
            listen,
            api_info,
        } => {
            if let Some(repo) = repo {
                config.repo = repo;
            }
            if let Some(listen) = listen {
                config.listen = listen;
            }
            if api_info.is_some() {
                config.api_info = api_info;
            }
            config.validate()?;

            info!("Starting lotus-datacap-chain {}", env!("CARGO_PKG_VERSION"));
            info!("Repo: {}", config.repo_path().display());
            run_chain_srv(config).await?;
        }
    }

    Ok(())
}
