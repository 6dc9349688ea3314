//! shopsurfer - command line entry point
//!
//! `serve` runs the web form, `search` runs one query from the terminal and
//! `config` validates (and optionally prints) the configuration.

use clap::{Parser, Subcommand};
use shopsurfer::config::ShopperConfig;
use shopsurfer::observability::init_default_logging;
use shopsurfer::service::ShoppingService;
use shopsurfer::web;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

/// AI shopping assistant: verify, research, find deals, report
#[derive(Parser)]
#[command(name = "shopsurfer")]
#[command(about = "Multi-agent shopping research assistant")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the search form over HTTP
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one search and print the report
    Search {
        /// What to shop for
        query: String,

        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
        openai_key: String,

        #[arg(long, env = "SERPER_API_KEY", hide_env_values = true, default_value = "")]
        serper_key: String,

        /// Print every stage output, not just the report
        #[arg(long)]
        all_stages: bool,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { port } => run_server(config, port).await,
        Commands::Search {
            query,
            openai_key,
            serper_key,
            all_stages,
        } => run_search(config, &query, &openai_key, &serper_key, all_stages).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

/// Load the given file, else the first default location found, else defaults
fn load_configuration(config_path: Option<&Path>) -> Result<ShopperConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(ShopperConfig::load_from_file(path)?);
    }

    for path_str in ["shopsurfer.toml", "config/shopsurfer.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(ShopperConfig::load_from_file(&path)?);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(ShopperConfig::default())
}

async fn run_server(
    mut config: ShopperConfig,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    info!("Starting shopsurfer v{}", env!("CARGO_PKG_VERSION"));
    let server = config.server.clone();
    web::serve(ShoppingService::from_config(config), &server).await?;

    info!("Application shutdown complete");
    Ok(())
}

async fn run_search(
    config: ShopperConfig,
    query: &str,
    openai_key: &str,
    serper_key: &str,
    all_stages: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = ShoppingService::from_config(config);

    if !all_stages {
        println!("{}", service.search_products(openai_key, serper_key, query).await);
        return Ok(());
    }

    match service.run(openai_key, serper_key, query).await {
        Ok(report) => {
            for stage in &report.stages {
                println!("===== {} =====\n{}\n", stage.kind, stage.output);
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", e.to_user_message());
            Err(e.into())
        }
    }
}

fn handle_config_command(config: &ShopperConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
