//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::client::{AnalysisClient, CancellationToken, ProgressCallback};
use crate::config::{BackendShape, ClientConfig};
use crate::models::{
    AnalysisRequest, ConnectionMonitor, ImageBlob, PatientMetadata, UploadProgress,
};

use super::helpers::{patient_from_args, print_health, print_result};

#[derive(Parser)]
#[command(name = "hemoscan")]
#[command(about = "Upload CT scans to a hemorrhage detection backend")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ./hemoscan.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the inference service
    #[arg(long, global = true)]
    url: Option<String>,

    /// Backend contract: predict or analyze-dicom
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the inference service is reachable
    Health,

    /// Analyze a CT image
    Analyze {
        /// Image or DICOM file to upload
        file: PathBuf,
        /// Patient name
        #[arg(long)]
        name: Option<String>,
        /// Patient age in years
        #[arg(long)]
        age: Option<u32>,
        /// Patient gender
        #[arg(long)]
        gender: Option<String>,
        /// Presenting symptoms
        #[arg(long)]
        symptoms: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a blank test image to verify the full analysis path
    SmokeTest,

    /// Show the effective configuration
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Health => cmd_health(config).await,
        Commands::Analyze {
            file,
            name,
            age,
            gender,
            symptoms,
            json,
        } => {
            let patient = patient_from_args(name, age, gender, symptoms);
            cmd_analyze(config, file, patient, json).await
        }
        Commands::SmokeTest => cmd_smoke_test(config).await,
        Commands::Config => cmd_config(&config),
    }
}

/// Resolve configuration: file and environment, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.url {
        config = config.with_base_url(url);
    }
    if let Some(backend) = &cli.backend {
        let shape = BackendShape::from_str(backend)
            .ok_or_else(|| anyhow::anyhow!("Unknown backend '{}'", backend))?;
        config = config.with_backend(shape);
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_health(config: ClientConfig) -> anyhow::Result<()> {
    let client = AnalysisClient::new(config)?;
    let mut monitor = ConnectionMonitor::new();

    monitor.begin_check();
    let outcome = client.check_health().await;
    let state = monitor.record_health(&outcome);
    print_health(client.config(), state, &outcome);

    if !monitor.can_analyze() {
        anyhow::bail!("Inference service unavailable");
    }
    Ok(())
}

async fn cmd_analyze(
    config: ClientConfig,
    file: PathBuf,
    patient: Option<PatientMetadata>,
    json: bool,
) -> anyhow::Result<()> {
    let image = ImageBlob::from_file(&file).await?;
    let mut request = AnalysisRequest::new(image);
    if let Some(patient) = patient {
        request = request.with_patient(patient);
    }
    request.validate()?;

    let client = AnalysisClient::new(config)?;
    let mut monitor = ConnectionMonitor::new();

    monitor.begin_check();
    let health = client.check_health().await;
    monitor.record_health(&health);
    if let Err(e) = health {
        println!(
            "{} Cannot reach {}: {}",
            style("✗").red(),
            client.config().base_url,
            e
        );
        anyhow::bail!("Inference service unavailable, retry once it is running");
    }

    let bar = ProgressBar::new(request.image.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Uploading [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
            .progress_chars("#>-"),
    );
    let progress_bar = bar.clone();
    let on_progress: ProgressCallback = Arc::new(move |p: UploadProgress| {
        progress_bar.set_length(p.total);
        progress_bar.set_position(p.loaded);
        progress_bar.set_message(format!("{}%", p.percentage));
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = client.analyze_with(&request, Some(on_progress), &cancel).await;
    signal_task.abort();
    bar.finish_and_clear();

    match outcome {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&file, &result);
            }
            Ok(())
        }
        Err(e) => {
            let state = monitor.record_analysis_failure(&e);
            println!("{} Analysis failed: {}", style("✗").red(), e);
            if e.is_connectivity_loss() {
                println!(
                    "  Connection is now {}. Run `hemoscan health` to retry.",
                    style(state).yellow()
                );
            }
            Err(e.into())
        }
    }
}

async fn cmd_smoke_test(config: ClientConfig) -> anyhow::Result<()> {
    let client = AnalysisClient::new(config)?;
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Running smoke test against {}", client.config().base_url));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let passed = client.smoke_test().await;
    spinner.finish_and_clear();

    if passed {
        println!("{} Smoke test passed ({})", style("✓").green(), client.shape());
        Ok(())
    } else {
        println!("{} Smoke test failed ({})", style("✗").red(), client.shape());
        anyhow::bail!("Smoke test failed")
    }
}

fn cmd_config(config: &ClientConfig) -> anyhow::Result<()> {
    println!("{}", style("Effective configuration").bold());
    print!("{}", config.to_toml()?);
    Ok(())
}
