//! planguard command line
//!
//! `planguard analyze plan.json` runs every validator over a plan exported
//! with `terraform show -json` and prints the report segments.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use planguard::analysis::{degraded_result, Collaborators, PlanAnalyzer};
use planguard::config::AnalyzerConfig;
use planguard::models::RunStatus;
use planguard::observability::TracingMetrics;

#[derive(Parser, Debug)]
#[command(name = "planguard")]
#[command(about = "Policy analysis for Terraform plans", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a plan JSON document
    Analyze {
        /// Path to the output of `terraform show -json`
        plan: PathBuf,

        /// Region used for resources that do not name one
        #[arg(long)]
        region: Option<String>,

        /// Overall analysis deadline in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered validators and their input schemas
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = AnalyzerConfig::from_env().context("Invalid configuration")?;

    match cli.command {
        Command::Analyze {
            plan,
            region,
            deadline_secs,
            json,
        } => {
            if let Some(region) = region {
                config.region = region;
            }
            if let Some(secs) = deadline_secs {
                config.deadline = Duration::from_secs(secs);
            }

            let text = std::fs::read_to_string(&plan)
                .with_context(|| format!("Failed to read plan file {}", plan.display()))?;

            let analyzer = PlanAnalyzer::from_config(config, &Collaborators::offline(), Arc::new(TracingMetrics::default()))
                .context("Failed to configure language backend")?;

            let result = match analyzer.run_plan_analysis(&text, None).await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, path = %plan.display(), "Plan could not be analyzed");
                    degraded_result(&e)
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}: {}", result.status.as_str(), result.message);
                for segment in &result.results {
                    println!("\n# {}\n\n{}", segment.description, segment.body);
                }
            }

            if result.status == RunStatus::Failed {
                std::process::exit(2);
            }
        }
        Command::Tools => {
            let analyzer = PlanAnalyzer::new(config, &Collaborators::offline(), Arc::new(TracingMetrics::default()));
            let specs = analyzer.registry().to_tool_specs();
            println!("{}", serde_json::to_string_pretty(&specs)?);
        }
    }

    Ok(())
}
