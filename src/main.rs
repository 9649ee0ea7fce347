use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use aoi_report::add_features::{add_features, parse_features};
use aoi_report::config::{ReportConfig, DEFAULT_CONFIG_PATH};
use aoi_report::portal;
use aoi_report::service::HttpRestClient;
use aoi_report::WarningLog;

#[derive(Parser)]
#[command(name = "aoi-report", version, about = "AOI report tooling")]
struct Cli {
    /// Config file; defaults to $REPORT_CONFIG, then ./config.json.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add features to a feature service layer.
    AddFeatures {
        /// Feature service layer URL.
        #[arg(long)]
        service_url: String,
        /// JSON array of features.
        #[arg(long)]
        features: String,
    },
    /// Load and validate the config, then list its layouts.
    CheckConfig,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ReportConfig> {
    let config = match path {
        Some(path) => {
            dotenvy::dotenv().ok();
            let mut config = ReportConfig::load(&path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
        None => ReportConfig::from_env(DEFAULT_CONFIG_PATH)?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aoi_report::init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config).context("could not load configuration")?;

    match cli.command {
        Command::AddFeatures { service_url, features } => {
            let features = parse_features(&features)?;
            let client = HttpRestClient::new(config.verify_tls)?;

            let mut warnings = WarningLog::new();
            let token = portal::sign_in(&client, &config.portal, &mut warnings).await;
            let response = add_features(&client, &service_url, &features, token.as_deref()).await?;
            println!("{}", serde_json::to_string(&response)?);
        }
        Command::CheckConfig => {
            log::info!("Configuration for {} is valid", config.project_name);
            for (key, layout) in &config.layouts {
                println!(
                    "{}: layout '{}', map {}, page {}",
                    key,
                    layout.name,
                    layout.map.as_deref().unwrap_or("-"),
                    layout.placement
                );
            }
        }
    }
    Ok(())
}
