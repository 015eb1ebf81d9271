//! HTTP client for the CDN image transformation endpoint
//!
//! The transformation URL is the endpoint base plus a fixed parameter block
//! plus the image's public source URL, mirroring Cloudflare-style
//! `/cdn-cgi/image/<params>/<url>` resizing paths.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::debug;

use crate::domain::error::ReplaceError;
use crate::domain::repositories::TransformFetcher;
use crate::infrastructure::config::TransformConfig;

#[derive(Clone)]
pub struct TransformClient {
    client: Client,
    endpoint_base: String,
    params: String,
}

impl TransformClient {
    pub fn new(config: &TransformConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let params = format!(
            "w={},h={},fit={},background={},quality={}",
            config.width, config.height, config.fit, config.background, config.quality
        );

        Ok(Self {
            client,
            endpoint_base: config.endpoint_base.trim_end_matches('/').to_string(),
            params,
        })
    }

    /// Transformation request URL for an image's public source URL.
    pub fn transform_url(&self, source_url: &str) -> String {
        format!("{}/{}/{}", self.endpoint_base, self.params, source_url)
    }
}

#[async_trait]
impl TransformFetcher for TransformClient {
    async fn fetch_transformed(&self, source_url: &str) -> Result<Vec<u8>, ReplaceError> {
        let url = self.transform_url(source_url);
        debug!(%url, "fetching transformed image");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReplaceError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplaceError::BadStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReplaceError::Http(e.to_string()))?;

        if bytes.is_empty() {
            return Err(ReplaceError::EmptyBody);
        }

        Ok(bytes.to_vec())
    }
}
