use super::{AssetError, AssetStore};
use crate::models::{Asset, AssetPage};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio_retry::{strategy::FixedInterval, Retry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DownloadLimits {
    pub page_size: u32,
    /// Stop once this many assets have been downloaded.
    pub max_assets: usize,
    pub list_retry_interval: Duration,
    pub list_retries: usize,
}

impl Default for DownloadLimits {
    fn default() -> Self {
        Self {
            page_size: 5,
            max_assets: 200,
            list_retry_interval: Duration::from_secs(2),
            list_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub pages: usize,
    pub downloaded: usize,
    pub skipped_existing: usize,
}

/// Local file an asset is stored at: `<dest>/<public_id>.<format>`.
///
/// Public ids may contain folders, but never anything that escapes `dest`.
pub fn local_path_for(asset: &Asset, dest: &Path) -> Result<PathBuf, AssetError> {
    let relative = PathBuf::from(asset.file_name());
    let safe = !asset.public_id.is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !safe {
        return Err(AssetError::UnsafePublicId(asset.public_id.clone()));
    }
    Ok(dest.join(relative))
}

async fn list_with_retry(
    store: &dyn AssetStore,
    cursor: Option<&str>,
    limits: &DownloadLimits,
) -> Result<AssetPage, AssetError> {
    let retry_strategy = FixedInterval::new(limits.list_retry_interval).take(limits.list_retries);

    Retry::spawn(retry_strategy, move || async move {
        store
            .list_page(cursor, limits.page_size)
            .await
            .map_err(|e| {
                warn!("Listing assets failed: {}. Will retry...", e);
                e
            })
    })
    .await
}

async fn save_asset(bytes: &[u8], local: &Path) -> Result<(), AssetError> {
    if let Some(parent) = local.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut partial = local.as_os_str().to_os_string();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    tokio::fs::write(&partial, bytes).await?;
    if let Err(e) = tokio::fs::rename(&partial, local).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}

/// Page through `store` and download every asset not already present under `dest`.
pub async fn download_assets(
    store: &dyn AssetStore,
    dest: &Path,
    limits: &DownloadLimits,
    cancel: &CancellationToken,
) -> Result<DownloadReport, AssetError> {
    let mut report = DownloadReport::default();
    let mut cursor: Option<String> = None;

    'pages: while report.downloaded < limits.max_assets {
        if cancel.is_cancelled() {
            warn!("Asset download cancelled");
            break;
        }

        let page = list_with_retry(store, cursor.as_deref(), limits).await?;
        report.pages += 1;

        for asset in &page.assets {
            if report.downloaded >= limits.max_assets {
                break 'pages;
            }
            if cancel.is_cancelled() {
                warn!("Asset download cancelled");
                break 'pages;
            }

            let local = local_path_for(asset, dest)?;
            if tokio::fs::try_exists(&local).await? {
                info!("File already exists: {}", local.display());
                report.skipped_existing += 1;
                continue;
            }

            let url = asset
                .download_url()
                .ok_or_else(|| AssetError::MissingUrl(asset.public_id.clone()))?;
            info!("Downloading {}", local.display());
            let bytes = store.fetch(url).await?;
            save_asset(&bytes, &local).await?;
            report.downloaded += 1;
        }

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    info!(
        "Asset download finished: {} downloaded, {} already present, {} pages",
        report.downloaded, report.skipped_existing, report.pages
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MockAssetStore;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn asset(id: &str) -> Asset {
        Asset {
            public_id: id.to_string(),
            format: "png".to_string(),
            url: Some(format!("http://assets.test/{}.png", id)),
            secure_url: None,
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> AssetPage {
        AssetPage {
            assets: ids.iter().map(|id| asset(id)).collect(),
            next_cursor: next.map(str::to_string),
        }
    }

    fn store_with_files(store: MockAssetStore, ids: &[&str]) -> MockAssetStore {
        ids.iter().fold(store, |store, id| {
            store.with_file(format!("http://assets.test/{}.png", id), id.as_bytes().to_vec())
        })
    }

    fn fast_limits() -> DownloadLimits {
        DownloadLimits {
            list_retry_interval: Duration::from_millis(1),
            ..DownloadLimits::default()
        }
    }

    #[test]
    fn test_local_path_for_nested_public_id() {
        let path = local_path_for(&asset("subidas/cat"), Path::new("uploads")).unwrap();
        assert_eq!(path, PathBuf::from("uploads/subidas/cat.png"));
    }

    #[test]
    fn test_local_path_rejects_escaping_ids() {
        for id in ["../etc/passwd", "/abs/file", "a/../../b", ""] {
            let err = local_path_for(&asset(id), Path::new("uploads")).unwrap_err();
            assert!(matches!(err, AssetError::UnsafePublicId(_)), "{}", id);
        }
    }

    #[tokio::test]
    async fn test_download_follows_cursors_and_skips_existing() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("subidas")).unwrap();
        fs::write(dir.path().join("subidas/b.png"), b"already here").unwrap();

        let store = store_with_files(
            MockAssetStore::new()
                .with_page(None, page(&["subidas/a", "subidas/b"], Some("c2")))
                .with_page(Some("c2"), page(&["subidas/c"], None)),
            &["subidas/a", "subidas/b", "subidas/c"],
        );

        let report = download_assets(
            &store,
            dir.path(),
            &fast_limits(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            DownloadReport {
                pages: 2,
                downloaded: 2,
                skipped_existing: 1,
            }
        );
        assert_eq!(fs::read(dir.path().join("subidas/a.png")).unwrap(), b"subidas/a");
        assert_eq!(fs::read(dir.path().join("subidas/b.png")).unwrap(), b"already here");
        assert_eq!(fs::read(dir.path().join("subidas/c.png")).unwrap(), b"subidas/c");
        assert!(!dir.path().join("subidas/a.png.part").exists());
        assert_eq!(store.get_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_download_stops_at_cap() {
        let dir = tempdir().unwrap();
        let store = store_with_files(
            MockAssetStore::new()
                .with_page(None, page(&["a", "b", "c"], Some("more")))
                .with_page(Some("more"), page(&["d", "e"], None)),
            &["a", "b", "c", "d", "e"],
        );
        let limits = DownloadLimits {
            max_assets: 4,
            page_size: 3,
            ..fast_limits()
        };

        let report = download_assets(&store, dir.path(), &limits, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.downloaded, 4);
        assert!(dir.path().join("d.png").exists());
        assert!(!dir.path().join("e.png").exists());
    }

    #[tokio::test]
    async fn test_download_retries_listing() {
        let dir = tempdir().unwrap();
        let store = store_with_files(
            MockAssetStore::new()
                .with_list_failures(2)
                .with_page(None, page(&["a"], None)),
            &["a"],
        );

        let report = download_assets(&store, dir.path(), &fast_limits(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.downloaded, 1);
        assert_eq!(store.get_list_count(), 3);
    }

    #[tokio::test]
    async fn test_download_gives_up_after_retries() {
        let dir = tempdir().unwrap();
        let store = MockAssetStore::new()
            .with_list_failures(10)
            .with_page(None, page(&["a"], None));

        let err = download_assets(&store, dir.path(), &fast_limits(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::Api { status: 503, .. }));
        assert_eq!(store.get_list_count(), 4);
    }

    #[tokio::test]
    async fn test_download_fetch_failure_aborts() {
        let dir = tempdir().unwrap();
        let store = MockAssetStore::new().with_page(None, page(&["a"], None));

        let err = download_assets(&store, dir.path(), &fast_limits(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::NotFound(_)));
        assert!(!dir.path().join("a.png").exists());
    }

    #[tokio::test]
    async fn test_download_honours_cancellation() {
        let dir = tempdir().unwrap();
        let store = MockAssetStore::new().with_page(None, page(&["a"], None));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = download_assets(&store, dir.path(), &fast_limits(), &cancel)
            .await
            .unwrap();

        assert_eq!(report, DownloadReport::default());
        assert_eq!(store.get_list_count(), 0);
    }
}
