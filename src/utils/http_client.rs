use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::HttpConfig;
use crate::errors::{AppError, AppResult, SourceError};
use crate::utils::url::UrlUtils;
use crate::utils::{CompressionFormat, DecompressionService};

/// HTTP client trait that provides automatic decompression for all content types
#[async_trait]
pub trait DecompressingHttpClient {
    /// Fetch URL and return decompressed text content
    async fn fetch_text(&self, url: &str) -> AppResult<String>;

    /// Fetch URL and return raw decompressed bytes
    async fn fetch_bytes(&self, url: &str) -> AppResult<Vec<u8>>;

    /// Fetch URL with custom headers and decode the JSON body
    async fn fetch_json_with_headers<T: DeserializeOwned + Send>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> AppResult<T>;

    /// POST a JSON body with custom headers and decode the JSON response
    async fn post_json<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        url: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> AppResult<T>;
}

/// Default implementation of DecompressingHttpClient using reqwest
///
/// Cheap to clone; every backend gets its own handle on the same pool.
#[derive(Clone, Debug)]
pub struct StandardHttpClient {
    client: Client,
}

impl StandardHttpClient {
    /// Create new HTTP client with the default timeouts
    pub fn new() -> AppResult<Self> {
        Self::from_config(&HttpConfig::default())
    }

    /// Create a client carrying the configured deadlines and user agent
    pub fn from_config(config: &HttpConfig) -> AppResult<Self> {
        Self::build(config.timeout, config.connect_timeout, &config.user_agent)
    }

    fn build(timeout: Duration, connect_timeout: Duration, user_agent: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn send(request: RequestBuilder, url: &str) -> AppResult<Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                return SourceError::Timeout {
                    url: UrlUtils::obfuscate_credentials(url),
                }
                .into();
            }
            AppError::ExternalService {
                service: "http_client".to_string(),
                message: UrlUtils::obfuscate_credentials(&e.to_string()),
            }
        })
    }

    /// Process response with automatic decompression
    async fn process_response_to_bytes(response: Response, url: &str) -> AppResult<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!(
                    "{} - URL: {}{}",
                    status.canonical_reason().unwrap_or("Unknown"),
                    UrlUtils::obfuscate_credentials(url),
                    if snippet.is_empty() {
                        String::new()
                    } else {
                        format!(" - {snippet}")
                    }
                ),
            }
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::source_error(format!("Failed to read response: {e}")))?;

        debug!("Fetched {} bytes of raw content", bytes.len());

        let compression_format = DecompressionService::detect_compression_format(&bytes);
        let decompressed_bytes = match compression_format {
            CompressionFormat::Uncompressed => bytes.to_vec(),
            _ => {
                debug!("Content is compressed ({:?}), decompressing", compression_format);
                DecompressionService::decompress(bytes).map_err(|e| {
                    AppError::source_error(format!("Failed to decompress content: {e}"))
                })?
            }
        };

        debug!(
            "Successfully processed {} bytes of content (compression: {:?})",
            decompressed_bytes.len(),
            compression_format
        );

        Ok(decompressed_bytes)
    }

    fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> AppResult<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| SourceError::parse("json", format!("Failed to parse JSON: {e}")).into())
    }
}

#[async_trait]
impl DecompressingHttpClient for StandardHttpClient {
    async fn fetch_text(&self, url: &str) -> AppResult<String> {
        let bytes = self.fetch_bytes(url).await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            SourceError::parse("text", format!("Failed to decode content as UTF-8: {e}"))
        })?;

        debug!("Successfully fetched {} characters of text content", content.len());
        Ok(content)
    }

    async fn fetch_bytes(&self, url: &str) -> AppResult<Vec<u8>> {
        debug!("Fetching content from: {}", UrlUtils::obfuscate_credentials(url));

        let response = Self::send(self.client.get(url), url).await?;
        Self::process_response_to_bytes(response, url).await
    }

    async fn fetch_json_with_headers<T: DeserializeOwned + Send>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> AppResult<T> {
        debug!("Fetching JSON content from: {}", UrlUtils::obfuscate_credentials(url));

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = Self::send(request, url).await?;
        let bytes = Self::process_response_to_bytes(response, url).await?;
        Self::decode_json(&bytes)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        url: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> AppResult<T> {
        debug!("Posting JSON to: {}", UrlUtils::obfuscate_credentials(url));

        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = Self::send(request, url).await?;
        let bytes = Self::process_response_to_bytes(response, url).await?;
        Self::decode_json(&bytes)
    }
}
