use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::traits::{ImageSource, ProgressReporter};
use crate::config::EngineConfig;
use crate::error::FetchError;

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn map_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err.to_string())
    }
}

#[async_trait]
impl ImageSource for HttpSource {
    async fn fetch(&self, url: &Url, progress: &ProgressReporter) -> Result<Bytes, FetchError> {
        let mut resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_transport)?;

        let status = resp.status();
        debug!("http fetch status={} url={}", status.as_u16(), url);
        if !status.is_success() {
            warn!("http fetch failed status={} url={}", status.as_u16(), url);
            return Err(FetchError::Status(status.as_u16()));
        }

        let total = resp.content_length().filter(|len| *len > 0);
        let mut body = BytesMut::with_capacity(total.unwrap_or(0).min(16 * 1024 * 1024) as usize);
        let mut received = 0u64;
        let mut last_percent = None;

        progress.report(0);
        while let Some(chunk) = resp.chunk().await.map_err(map_transport)? {
            received += chunk.len() as u64;
            body.extend_from_slice(&chunk);

            // Only publish when the floored percentage moves.
            if let Some(total) = total {
                let percent = (received.saturating_mul(100) / total).min(100);
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    progress.report_bytes(received, total);
                }
            }
        }

        debug!("http fetch done bytes={} url={}", received, url);
        Ok(body.freeze())
    }
}
