//! VisionXaid screening client (vxaid-screen) - command-line entry point
//!
//! `vxaid-screen predict <IMAGE>` classifies one fundus image and prints the
//! result; `--report` additionally saves the PDF report.
//! `vxaid-screen health` checks that the backend is up.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vxaid_common::config::{self, CliOverrides, ScreenConfig};
use vxaid_common::events::{EventBus, ScreeningEvent};
use vxaid_common::format_percent;
use vxaid_screen::{
    ApiClient, Notice, PredictOutcome, ReportOutcome, ReportWriter, ScreeningBackend,
    ScreeningOutput, ScreeningSession, SelectOutcome,
};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ", ",
    env!("BUILD_PROFILE"),
    ")"
);

/// Command-line arguments for vxaid-screen
#[derive(Parser, Debug)]
#[command(name = "vxaid-screen")]
#[command(about = "Retinal fundus screening client for the VisionXaid backend")]
#[command(version, long_version = LONG_VERSION)]
struct Args {
    /// Backend base URL (overrides VXAID_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Config file (default: <config dir>/vxaid/config.toml)
    #[arg(long, global = true, env = "VXAID_CONFIG")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a fundus image
    Predict {
        /// JPG or PNG image (max. 10MB)
        image: PathBuf,

        /// Also generate and save the PDF report
        #[arg(long)]
        report: bool,

        /// Directory for saved reports
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
    /// Check that the backend is up and the model is loaded
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let toml_config =
        config::load_toml_config(args.config.as_deref()).context("Failed to load config file")?;

    init_tracing(&toml_config.logging.level);

    let report_dir = match &args.command {
        Command::Predict { report_dir, .. } => report_dir.clone(),
        Command::Health => None,
    };
    let config = ScreenConfig::resolve(
        &CliOverrides {
            api_url: args.api_url.clone(),
            report_dir,
        },
        &toml_config,
    )
    .context("Invalid configuration")?;

    info!(
        "VisionXaid screening client {} (backend {})",
        env!("CARGO_PKG_VERSION"),
        config.api_url
    );

    let client = ApiClient::new(&config.api_url).context("Invalid backend URL")?;

    match args.command {
        Command::Predict { image, report, .. } => {
            run_predict(client, &config, &image, report, args.json).await
        }
        Command::Health => run_health(client, args.json).await,
    }
}

/// Tracing goes to stderr so stdout carries only results
fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("vxaid_screen={default_level},vxaid_common={default_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_predict(
    client: ApiClient,
    config: &ScreenConfig,
    image: &Path,
    with_report: bool,
    json: bool,
) -> Result<ExitCode> {
    let session = ScreeningSession::new(
        client,
        ReportWriter::new(&config.report_dir),
        EventBus::default(),
    )
    .with_max_upload_bytes(config.max_upload_bytes);
    let logger = spawn_event_logger(session.event_bus().subscribe());

    let exit = screen(&session, image, with_report, json).await;

    logger.abort();
    exit
}

async fn screen(
    session: &ScreeningSession<ApiClient>,
    image: &Path,
    with_report: bool,
    json: bool,
) -> Result<ExitCode> {
    let mut output = ScreeningOutput::default();

    match session.select_path(image).await {
        SelectOutcome::Selected(_) => {}
        SelectOutcome::Rejected(notice) => return finish_with_notice(output, notice, json),
        SelectOutcome::Superseded => {
            warn!("Image selection was superseded");
            return Ok(ExitCode::FAILURE);
        }
    }

    match session.predict().await {
        PredictOutcome::Completed(result) => {
            if !json {
                println!("{}", session.result_pane());
            }
            output.result = Some(result);
        }
        PredictOutcome::Failed(notice) => return finish_with_notice(output, notice, json),
        other => {
            warn!(outcome = ?other, "Prediction did not run");
            return Ok(ExitCode::FAILURE);
        }
    }

    if with_report {
        match session.generate_report().await {
            ReportOutcome::Saved(path) => {
                if !json {
                    println!("Report saved to {}", path.display());
                }
                output.report_path = Some(path);
            }
            ReportOutcome::Failed(notice) => return finish_with_notice(output, notice, json),
            other => {
                warn!(outcome = ?other, "Report did not run");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(ExitCode::SUCCESS)
}

/// Report a notice and fail; in JSON mode it joins whatever was produced so far
fn finish_with_notice(
    mut output: ScreeningOutput,
    notice: Notice,
    json: bool,
) -> Result<ExitCode> {
    if json {
        output.notice = Some(notice);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!("{}", notice.message);
    }
    Ok(ExitCode::FAILURE)
}

async fn run_health(client: ApiClient, json: bool) -> Result<ExitCode> {
    let status = match client.check_health().await {
        Ok(status) => status,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Backend:  {}", client.base_url());
        println!("Status:   {}", status.status);
        if let Some(message) = &status.message {
            println!("Message:  {message}");
        }
        if let Some(loaded) = status.model_loaded {
            println!("Model:    {}", if loaded { "loaded" } else { "not loaded" });
        }
        if let Some(gradcam) = status.gradcam_enabled {
            println!("Grad-CAM: {}", if gradcam { "enabled" } else { "disabled" });
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Log session events at debug level until the bus closes
fn spawn_event_logger(mut rx: broadcast::Receiver<ScreeningEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ScreeningEvent::PredictionCompleted {
                    prediction,
                    top_confidence,
                    ..
                }) => {
                    debug!(
                        "Event PredictionCompleted: {} ({})",
                        prediction,
                        format_percent(Some(top_confidence))
                    );
                }
                Ok(event) => {
                    debug!(event_type = event.event_type(), session_id = %event.session_id(), "Event");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
