use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use snailstat_service::analysis::TrendPolicy;
use snailstat_service::config::ServiceConfig;
use snailstat_service::ingest::http::DEFAULT_TIMEOUT_SECS;
use snailstat_service::logging::{self, Component};
use snailstat_service::model::{AnalyticsError, Result};
use snailstat_service::service::{endpoints, AnalyticsService};
use snailstat_service::verify::{self, VerificationStatus};

#[derive(Parser)]
#[command(name = "snailstat")]
#[command(about = "Statistical analytics over snail field observations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the scientific-data API at this URL
    #[arg(long, global = true, conflicts_with_all = ["dataset_file", "synthetic"])]
    dataset_url: Option<String>,

    /// Use a snapshot exported to this file
    #[arg(long, global = true, conflicts_with = "synthetic")]
    dataset_file: Option<PathBuf>,

    /// Use a generated dataset with this seed
    #[arg(long, global = true)]
    synthetic: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one analytics endpoint and print its JSON envelope
    Compute {
        /// Endpoint name, e.g. t_test_depth or kriging_map
        endpoint: String,

        /// Query parameters as key=value (source=citizen grid=50)
        params: Vec<String>,

        /// Report the fitted regression slope with its true sign
        #[arg(long)]
        true_sign: bool,

        /// Pretty-print the JSON
        #[arg(short, long)]
        pretty: bool,
    },

    /// Check that a snapshot endpoint is reachable and well formed
    Verify {
        /// Base URL of the scientific-data API
        url: String,

        /// Request timeout in seconds
        #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Show how many observations each endpoint can use
    Audit {
        /// Print the audit as JSON
        #[arg(long)]
        json: bool,
    },

    /// List endpoints with their parameters
    Endpoints,
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Endpoints => {
            for info in endpoints() {
                let params = if info.parameters.is_empty() {
                    "-".to_string()
                } else {
                    info.parameters.join(", ")
                };
                println!("{:<24} params: {:<28} {}", info.endpoint, params, info.example);
            }
            Ok(0)
        }
        Commands::Verify { url, timeout } => {
            let result = verify::run_endpoint_verification(&url, Duration::from_secs(timeout));
            verify::print_verification(&result);
            Ok(if result.status == VerificationStatus::Failed { 2 } else { 0 })
        }
        Commands::Audit { json } => {
            let config = load_config(&cli.config, &cli.dataset_url, &cli.dataset_file, cli.synthetic)?;
            let provider = config.backend()?.into_provider()?;
            let dataset = provider.fetch()?;
            let audit = verify::audit_dataset(&dataset);
            if json {
                println!("{}", serde_json::to_string_pretty(&audit)?);
            } else {
                verify::print_audit(&audit);
            }
            Ok(0)
        }
        Commands::Compute {
            endpoint,
            params,
            true_sign,
            pretty,
        } => {
            let config = load_config(&cli.config, &cli.dataset_url, &cli.dataset_file, cli.synthetic)?;
            let mut query = parse_params(&params)?;
            query.insert("endpoint".to_string(), endpoint);

            let policy = if true_sign {
                TrendPolicy::TrueSign
            } else {
                TrendPolicy::UpwardDisplay
            };
            let service = AnalyticsService::from_config(&config)?.with_trend_policy(policy);
            let response = service.respond(&query);
            let rendered = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{}", rendered);
            Ok(if response["ok"] == true { 0 } else { 2 })
        }
    }
}

/// File, then environment, then command-line flags; validated last.
fn load_config(
    path: &Option<PathBuf>,
    dataset_url: &Option<String>,
    dataset_file: &Option<PathBuf>,
    synthetic: Option<u64>,
) -> Result<ServiceConfig> {
    let config = ServiceConfig::load_with(path.as_deref(), |config| {
        if dataset_url.is_some() || dataset_file.is_some() || synthetic.is_some() {
            config.dataset.url = dataset_url.clone();
            config.dataset.path = dataset_file.clone();
            config.dataset.synthetic_seed = synthetic;
        }
    })?;

    logging::init_logger(config.log_level()?, config.logging.file.as_deref())?;
    logging::debug(Component::System, None, "configuration loaded");
    Ok(config)
}

fn parse_params(params: &[String]) -> Result<HashMap<String, String>> {
    params
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| AnalyticsError::InvalidParameter(format!("expected key=value, got '{}'", pair)))
        })
        .collect()
}
