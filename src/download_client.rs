
use std::{future::Future, time::Duration};

use reqwest::{Client, Url};
use tracing::debug;

use crate::{config::ApiConfig, error::{ConfigError, FetchError}, models::DownloadRecord};

/// Anything that can produce the current list of download records.</br>
/// [`DownloadClient`] is the real implementation; the poller only depends on this trait.
pub trait DownloadSource: Send + Sync + 'static {
    fn fetch_downloads(&self) -> impl Future<Output = Result<Vec<DownloadRecord>, FetchError>> + Send;
}

/// Reads download records from the KafkaSync API server.
/// # Example
/// ```no_run
/// # use kafkasync_dashboard::config::ApiConfig;
/// # use kafkasync_dashboard::download_client::{DownloadClient, DownloadSource};
/// # tokio_test::block_on(async {
/// let client = DownloadClient::init(&ApiConfig::default()).unwrap();
/// match client.fetch_downloads().await {
///     Ok(records) => {
///         for record in records {
///             println!("#{} {} {}", record.id, record.filename, record.status);
///         }
///     },
///     Err(_) => {
///         // server down or returned a non-2xx status
///     },
/// }
/// # })
/// ```
#[derive(Debug, Clone)]
pub struct DownloadClient {
    client: Client,
    url: Url,
}

impl DownloadClient {

    /// Builds a client for the endpoint and timeout in `config`.
    pub fn init(config: &ApiConfig) -> Result<Self, ConfigError> {
        let url = config.parsed_url()?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        return Ok(Self { client, url });
    }

    pub fn url(&self) -> &Url {
        return &self.url;
    }
}

impl DownloadSource for DownloadClient {

    /// Issues a single `GET` against the endpoint.</br>
    /// Any non-2xx status fails with [`FetchError::Status`] without looking at the body.
    /// A `null` body is an empty list.
    async fn fetch_downloads(&self) -> Result<Vec<DownloadRecord>, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let records = response.json::<Option<Vec<DownloadRecord>>>().await?.unwrap_or_default();
        debug!(url = %self.url, records = records.len(), "fetched downloads");
        return Ok(records);
    }
}
