use anyhow::{Context, Result};
use clap::Parser;
use image_sweeper::app::App;
use image_sweeper::models::Config;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "image-sweeper")]
#[command(about = "Convert uploaded images to JPEG and remove the originals")]
struct CliArgs {
    /// Download source images from the asset store before converting.
    #[arg(long)]
    download: bool,

    /// Number of files converted at the same time.
    #[arg(short, long, value_name = "N", value_parser = parse_jobs_arg)]
    jobs: Option<usize>,

    /// Write a JSON report of every file's outcome to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

fn parse_jobs_arg(input: &str) -> std::result::Result<usize, String> {
    match input.parse::<usize>() {
        Ok(jobs) if jobs > 0 => Ok(jobs),
        _ => Err(format!(
            "Invalid job count '{}'. Expected a positive integer",
            input
        )),
    }
}

fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if args.download {
        config.download_enabled = true;
    }
    if let Some(jobs) = args.jobs {
        config.concurrency = jobs;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_sweeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting image-sweeper");

    let args = CliArgs::parse();

    let app = match load_config(&args).and_then(|config| App::new(config).map_err(Into::into)) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {:#}", e);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing files already in progress");
                cancel.cancel();
            }
        }
    });

    match app.run(&cancel).await {
        Ok(report) => {
            if let Some(path) = &args.report {
                let json = report.to_json()?;
                std::fs::write(path, json)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                info!("Saved report at: {}", path.display());
            }
            info!("Conversion completed");
            Ok(())
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            std::process::exit(1);
        }
    }
}
