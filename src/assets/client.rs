use super::{AssetError, AssetStore};
use crate::models::{AssetPage, AssetStoreConfig};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Admin API client for a Cloudinary account.
pub struct CloudinaryClient {
    client: Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(config: &AssetStoreConfig) -> Result<Self, AssetError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self::new_with_client(config, client))
    }

    pub fn new_with_client(config: &AssetStoreConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    fn resources_url(&self) -> String {
        format!("{}/v1_1/{}/resources/image", self.base_url, self.cloud_name)
    }

    async fn error_for(response: reqwest::Response) -> AssetError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::error!("Asset API error (status {}): {}", status, body);
        AssetError::Api { status, body }
    }
}

#[async_trait]
impl AssetStore for CloudinaryClient {
    async fn list_page(&self, cursor: Option<&str>, page_size: u32) -> Result<AssetPage, AssetError> {
        let mut query = vec![("max_results", page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("next_cursor", cursor.to_string()));
        }

        let response = self
            .client
            .get(self.resources_url())
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to asset API: {}", e);
                e
            })?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse asset listing: {}\nBody: {}", e, body);
            AssetError::Parse(e)
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> AssetStoreConfig {
        AssetStoreConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            base_url: server.uri(),
        }
    }

    #[tokio::test]
    async fn test_list_page_sends_cursor_and_auth() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1_1/demo/resources/image"))
            .and(query_param("max_results", "5"))
            .and(query_param("next_cursor", "page-2"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resources": [
                    {"public_id": "subidas/cat", "format": "png", "url": "http://img/cat.png"}
                ],
                "next_cursor": "page-3"
            })))
            .mount(&server)
            .await;

        let client = CloudinaryClient::new(&config_for(&server)).unwrap();
        let page = client.list_page(Some("page-2"), 5).await.unwrap();

        assert_eq!(page.assets.len(), 1);
        assert_eq!(page.assets[0].public_id, "subidas/cat");
        assert_eq!(page.next_cursor.as_deref(), Some("page-3"));
    }

    #[tokio::test]
    async fn test_list_page_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1_1/demo/resources/image"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let client = CloudinaryClient::new(&config_for(&server)).unwrap();
        let err = client.list_page(None, 5).await.unwrap_err();

        assert!(matches!(err, AssetError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_list_page_invalid_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1_1/demo/resources/image"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = CloudinaryClient::new(&config_for(&server)).unwrap();
        let err = client.list_page(None, 5).await.unwrap_err();

        assert!(matches!(err, AssetError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_returns_body_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/images/cat.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, 0x50, 0x4E, 0x47]))
            .mount(&server)
            .await;

        let client = CloudinaryClient::new(&config_for(&server)).unwrap();
        let bytes = client
            .fetch(&format!("{}/images/cat.png", server.uri()))
            .await
            .unwrap();

        assert_eq!(bytes, vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[tokio::test]
    async fn test_fetch_missing_asset() {
        let server = MockServer::start().await;

        let client = CloudinaryClient::new(&config_for(&server)).unwrap();
        let err = client
            .fetch(&format!("{}/images/gone.png", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::Api { status: 404, .. }));
    }
}
