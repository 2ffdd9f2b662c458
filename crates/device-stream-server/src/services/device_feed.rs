use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::debug;

use crate::config::DeviceFeedConfig;
use crate::models::DeviceListResponse;

const DEVICE_LIST_PATH: &str = "/v3/api/public/device";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("Error making API request: {0}")]
    Request(String),

    #[error("API request timed out")]
    Timeout,

    #[error("API returned non-200 status code: {0}")]
    Status(u16),

    #[error("Error decoding API response: {0}")]
    Decode(String),
}

/// Source of the live device list shown on every stream tick.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceFeed: Send + Sync {
    async fn fetch_devices(&self) -> Result<DeviceListResponse, FeedError>;
}

/// Third-party tracking API client. The API key travels as a query parameter.
#[derive(Clone)]
pub struct HttpDeviceFeed {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpDeviceFeed {
    pub fn new(config: &DeviceFeedConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn device_list_url(&self) -> Result<Url, FeedError> {
        Url::parse_with_params(
            &format!("{}{}", self.base_url, DEVICE_LIST_PATH),
            &[("latest_point", "true"), ("api-key", self.api_key.as_str())],
        )
        .map_err(|e| FeedError::Request(format!("invalid feed URL: {}", e)))
    }
}

#[async_trait]
impl DeviceFeed for HttpDeviceFeed {
    async fn fetch_devices(&self) -> Result<DeviceListResponse, FeedError> {
        if self.api_key.is_empty() {
            return Err(FeedError::MissingApiKey);
        }

        let response = self
            .client
            .get(self.device_list_url()?)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let devices: DeviceListResponse =
            serde_json::from_slice(&body).map_err(|e| FeedError::Decode(e.to_string()))?;

        debug!("Fetched {} devices from feed", devices.result_list.len());
        Ok(devices)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FeedError {
    if e.is_timeout() {
        FeedError::Timeout
    } else {
        FeedError::Request(e.to_string())
    }
}
