//! Remote asset store integration
//!
//! Lists images held by a Cloudinary-compatible asset store page by page and
//! downloads them into the local upload folder ahead of conversion.

pub mod client;
pub mod downloader;
pub mod mock;

pub use client::CloudinaryClient;
pub use downloader::{download_assets, DownloadLimits, DownloadReport};
pub use mock::MockAssetStore;

use crate::models::AssetPage;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Asset API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse asset listing: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset '{0}' does not map to a path inside the download folder")]
    UnsafePublicId(String),

    #[error("Asset '{0}' has no download URL")]
    MissingUrl(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// List one page of assets, starting after `cursor` (`None` for the first page).
    async fn list_page(&self, cursor: Option<&str>, page_size: u32) -> Result<AssetPage, AssetError>;

    /// Fetch the raw bytes behind an asset URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError>;
}
