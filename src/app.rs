//! Application orchestration for a conversion run.

#[cfg(feature = "remote-assets")]
use crate::assets::{download_assets, AssetStore, CloudinaryClient, DownloadLimits};
use crate::batch::{plan, BatchReport, FileOutcome, SkipReason};
use crate::collector;
use crate::convert::{prepare_output_dir, ConversionService, JpegConverter};
use crate::models::Config;
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Coordinates the optional asset download, scanning and conversion of one run.
pub struct App {
    converter: Box<dyn ConversionService>,
    #[cfg(feature = "remote-assets")]
    assets: Option<Box<dyn AssetStore>>,
    #[cfg(feature = "remote-assets")]
    download_limits: DownloadLimits,
    config: Config,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub converter: Box<dyn ConversionService>,
    #[cfg(feature = "remote-assets")]
    pub assets: Option<Box<dyn AssetStore>>,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices, config: Config) -> Self {
        Self {
            converter: services.converter,
            #[cfg(feature = "remote-assets")]
            assets: services.assets,
            #[cfg(feature = "remote-assets")]
            download_limits: DownloadLimits::default(),
            config,
        }
    }

    #[cfg(feature = "remote-assets")]
    pub fn with_download_limits(mut self, limits: DownloadLimits) -> Self {
        self.download_limits = limits;
        self
    }

    /// Construct the production app from validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let converter: Box<dyn ConversionService> =
            Box::new(JpegConverter::new(&config.output_dir));

        #[cfg(feature = "remote-assets")]
        let assets: Option<Box<dyn AssetStore>> = match &config.asset_store {
            Some(store) if config.download_enabled => {
                info!("Asset download enabled (cloud: {})", store.cloud_name);
                Some(Box::new(CloudinaryClient::new(store)?))
            }
            _ => None,
        };

        Ok(Self::with_services(
            AppServices {
                converter,
                #[cfg(feature = "remote-assets")]
                assets,
            },
            config,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one batch: download (if enabled), scan, convert and report.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<BatchReport> {
        self.download(cancel).await;

        prepare_output_dir(&self.config.output_dir)?;
        info!(
            "Output directory ready: {}",
            self.config.output_dir.display()
        );

        let scan_dir = self.config.scan_dir();
        let candidates = tokio::task::spawn_blocking({
            let scan_dir = scan_dir.clone();
            move || collector::scan(&scan_dir)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Scan task join error: {}", e)))??;
        info!(
            "Files to check: {} under {}",
            candidates.len(),
            scan_dir.display()
        );

        let batch = plan(candidates, &self.config.source_formats, |input: &Path| {
            self.converter.output_path(input)
        });
        info!(
            "{} files selected for conversion, {} skipped",
            batch.jobs.len(),
            batch.skipped.len()
        );

        let mut outcomes = batch.skipped;
        let converted: Vec<FileOutcome> = stream::iter(batch.jobs)
            .map(|input| self.convert_one(input, cancel))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        outcomes.extend(converted);

        let report = BatchReport::new(outcomes);
        if report.failed() > 0 {
            warn!("{}", report.summary());
        } else {
            info!("{}", report.summary());
        }
        Ok(report)
    }

    async fn convert_one(&self, input: PathBuf, cancel: &CancellationToken) -> FileOutcome {
        if cancel.is_cancelled() {
            return FileOutcome::skipped(input, SkipReason::Cancelled);
        }

        match self.converter.convert(&input).await {
            Ok(converted) => {
                info!(
                    "Converted file: {} -> {}",
                    converted.input.display(),
                    converted.output.display()
                );
                FileOutcome::converted(&converted)
            }
            Err(e) => {
                error!("Error converting file: {}", e);
                FileOutcome::failed(&e)
            }
        }
    }

    #[cfg(feature = "remote-assets")]
    async fn download(&self, cancel: &CancellationToken) {
        if !self.config.download_enabled {
            return;
        }
        let Some(store) = self.assets.as_deref() else {
            warn!("Asset download enabled but no asset store is configured");
            return;
        };

        info!(
            "Downloading assets into {}",
            self.config.app_folder.display()
        );
        if let Err(e) = download_assets(
            store,
            &self.config.app_folder,
            &self.download_limits,
            cancel,
        )
        .await
        {
            error!("Asset download failed: {}. Continuing with local files.", e);
        }
    }

    #[cfg(not(feature = "remote-assets"))]
    async fn download(&self, _cancel: &CancellationToken) {
        if self.config.download_enabled {
            warn!("Asset download requested but this build has no remote-assets support");
        }
    }
}
