//! Data Plane API HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use url::Url;

use crate::dataplane::{DataPlaneError, DataPlaneResult, ProxyControl};

const RAW_CONFIG_PATH: &str = "services/haproxy/configuration/raw";

/// Basic-auth credentials for the Data Plane API.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// HTTP client for the HAProxy Data Plane API.
#[derive(Debug, Clone)]
pub struct DataPlaneClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl DataPlaneClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://127.0.0.1:5555/v2/`).
    pub fn new(base_url: Url, credentials: Credentials, timeout: Duration) -> DataPlaneResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            credentials,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn raw_config_url(&self, only_validate: bool) -> DataPlaneResult<Url> {
        let mut url = self
            .base_url
            .join(RAW_CONFIG_PATH)
            .map_err(|e| DataPlaneError::InvalidUrl(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("skip_version", "true");
            if only_validate {
                query.append_pair("only_validate", "true");
            }
        }

        Ok(url)
    }

    async fn post_config(&self, config: &str, only_validate: bool) -> DataPlaneResult<()> {
        let url = self.raw_config_url(only_validate)?;

        let response = self
            .http
            .post(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(CONTENT_TYPE, "text/plain")
            .body(config.to_string())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => DataPlaneError::Unauthorized,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                DataPlaneError::Rejected(body)
            }
            _ => DataPlaneError::Http {
                status: status.as_u16(),
                body,
            },
        })
    }
}

#[async_trait]
impl ProxyControl for DataPlaneClient {
    async fn ready(&self) -> bool {
        let result = self
            .http
            .get(self.base_url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await;

        match result {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!(error = %e, "Data Plane API probe failed");
                false
            }
        }
    }

    async fn validate(&self, config: &str) -> DataPlaneResult<()> {
        self.post_config(config, true).await
    }

    async fn apply(&self, config: &str) -> DataPlaneResult<()> {
        self.post_config(config, false).await
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
