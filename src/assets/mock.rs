use super::{AssetError, AssetStore};
use crate::models::AssetPage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Asset store backed by in-memory pages keyed by cursor.
#[derive(Clone)]
pub struct MockAssetStore {
    pages: Arc<Mutex<HashMap<String, AssetPage>>>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    list_count: Arc<Mutex<usize>>,
    fetch_count: Arc<Mutex<usize>>,
    list_failures: Arc<Mutex<usize>>,
}

impl MockAssetStore {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(HashMap::new())),
            files: Arc::new(Mutex::new(HashMap::new())),
            list_count: Arc::new(Mutex::new(0)),
            fetch_count: Arc::new(Mutex::new(0)),
            list_failures: Arc::new(Mutex::new(0)),
        }
    }

    /// Register the page returned for `cursor` (`None` is the first page).
    pub fn with_page(self, cursor: Option<&str>, page: AssetPage) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(cursor.unwrap_or_default().to_string(), page);
        self
    }

    pub fn with_file(self, url: String, content: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(url, content);
        self
    }

    /// Fail the next `count` listing calls with a server error.
    pub fn with_list_failures(self, count: usize) -> Self {
        *self.list_failures.lock().unwrap() = count;
        self
    }

    pub fn get_list_count(&self) -> usize {
        *self.list_count.lock().unwrap()
    }

    pub fn get_fetch_count(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }
}

impl Default for MockAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetStore for MockAssetStore {
    async fn list_page(&self, cursor: Option<&str>, page_size: u32) -> Result<AssetPage, AssetError> {
        *self.list_count.lock().unwrap() += 1;

        {
            let mut failures = self.list_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(AssetError::Api {
                    status: 503,
                    body: "Mock failure".to_string(),
                });
            }
        }

        let key = cursor.unwrap_or_default();
        let pages = self.pages.lock().unwrap();
        let mut page = pages
            .get(key)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(format!("page for cursor '{}'", key)))?;
        page.assets.truncate(page_size as usize);
        Ok(page)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        *self.fetch_count.lock().unwrap() += 1;

        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(url.to_string()))
    }
}
