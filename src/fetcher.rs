use crate::types::{FetchConfig, Result, ShowTransmissionError};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Downloads feed documents, over HTTP or from the local filesystem.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Returns the document at `location`. Anything that is not an http(s) URL is read as a path.
    pub async fn fetch(&self, location: &str) -> Result<String> {
        match Url::parse(location) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => self.fetch_url(&url).await,
            Ok(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|_| {
                    ShowTransmissionError::Config(format!("Invalid file URL: {}", location))
                })?;
                self.fetch_file(&path).await
            }
            _ => self.fetch_file(Path::new(location)).await,
        }
    }

    async fn fetch_file(&self, path: &Path) -> Result<String> {
        debug!("Reading feed from file: {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Ok(content)
    }

    async fn fetch_url(&self, url: &Url) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.fetch_once(url).await {
                Ok(content) => {
                    info!(
                        "Fetched feed: {} ({} bytes in {}ms)",
                        url,
                        content.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(content);
                }
                Err(e @ ShowTransmissionError::Parse(_)) => return Err(e),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                    break;
                }
            }
        }

        error!(
            "Failed to fetch feed after {} attempts: {}",
            self.config.max_retries + 1,
            url
        );
        Err(last_error.unwrap_or_else(|| ShowTransmissionError::HttpStatus {
            status: 0,
            url: url.to_string(),
        }))
    }

    async fn fetch_once(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ShowTransmissionError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(content_length) = response.content_length() {
            let size_mb = content_length as usize / (1024 * 1024);
            if size_mb > self.config.max_feed_size_mb {
                return Err(ShowTransmissionError::Parse(format!(
                    "Feed too large: {}MB",
                    size_mb
                )));
            }
        }

        Ok(response.text().await?)
    }
}
