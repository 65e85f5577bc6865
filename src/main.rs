use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use medpredict::{
    config::Config,
    domain::Domain,
    pipeline::train_and_save,
    predictor::Registry,
    server,
};

#[derive(Parser)]
#[command(
    name = "medpredict",
    about = "Train clinical binary classifiers and serve their predictions",
    long_about = "Trains breast cancer, heart disease and diabetes classifiers from CSV datasets, \
                  writes each model with its feature scaler, and serves predictions over HTTP."
)]
struct Cli {
    /// Path to a TOML config file (defaults to ./medpredict.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding <domain>_model.toml files
    #[arg(long, global = true, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Directory holding <domain>_model_scaler.toml files
    #[arg(long, global = true, value_name = "DIR")]
    scaler_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit scaler and model for one domain, or all of them
    #[command(about = "Train models (outputs: model/*.toml, scaler/*.toml)")]
    Train {
        /// breast-cancer, heart-disease, diabetes or all
        target: String,

        /// Directory holding <domain>_data.csv files
        #[arg(long, value_name = "DIR")]
        dataset_dir: Option<PathBuf>,
    },

    /// Load every trained domain and answer prediction requests
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => match cli.command {
            Commands::Train {
                target,
                dataset_dir,
            } => train_command(&config, &target, dataset_dir),
            Commands::Serve { host, port } => serve_command(config, host, port).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.model_dir {
        config.artifacts.model_dir.clone_from(dir);
    }
    if let Some(dir) = &cli.scaler_dir {
        config.artifacts.scaler_dir.clone_from(dir);
    }
    Ok(config)
}

fn train_command(
    config: &Config,
    target: &str,
    dataset_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let domains = if target == "all" {
        Domain::ALL.to_vec()
    } else {
        vec![target.parse::<Domain>()?]
    };
    let dataset_dir = dataset_dir.unwrap_or_else(|| config.artifacts.dataset_dir.clone());

    for domain in domains {
        let report = train_and_save(domain, &dataset_dir, config)?;
        println!(
            "{domain}: test accuracy {:.3}% ({} train / {} test samples)",
            report.test_accuracy * 100.0,
            report.train_samples,
            report.test_samples
        );
    }

    Ok(())
}

async fn serve_command(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let registry = Registry::load(&config)?;
    server::serve(&config.server, registry).await?;
    Ok(())
}
