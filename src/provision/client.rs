use super::types::*;
use crate::config::types::ProvisionConfig;
use crate::config::ApiCredentials;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("management API returned error status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("source '{0}' has no receiver URL")]
    MissingUrl(String),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Client for the collector management API
#[derive(Debug)]
pub struct ProvisionClient {
    base_url: String,
    credentials: ApiCredentials,
    client: reqwest::Client,
}

impl ProvisionClient {
    pub fn new(config: &ProvisionConfig, credentials: ApiCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    pub async fn find_collector(&self, name: &str) -> Result<Option<Collector>> {
        let url = format!("{}/collectors", self.base_url);
        let response: CollectorsResponse = self.get(&url).await?;
        Ok(response.collectors.into_iter().find(|c| c.name == name))
    }

    pub async fn create_collector(&self, name: &str) -> Result<Collector> {
        let url = format!("{}/collectors", self.base_url);
        let request = NewCollectorRequest {
            collector: NewCollector {
                name,
                description: CREATED_BY,
                collector_type: COLLECTOR_TYPE_HOSTED,
            },
        };
        let response: CollectorEnvelope = self.post(&url, &request).await?;
        Ok(response.collector)
    }

    pub async fn find_source(&self, collector_id: i64, name: &str) -> Result<Option<Source>> {
        let url = format!("{}/collectors/{}/sources", self.base_url, collector_id);
        let response: SourcesResponse = self.get(&url).await?;
        Ok(response.sources.into_iter().find(|s| s.name == name))
    }

    /// Creates an HTTP source whose host name and category are both `name`
    pub async fn create_source(&self, collector_id: i64, name: &str) -> Result<Source> {
        let url = format!("{}/collectors/{}/sources", self.base_url, collector_id);
        let request = NewSourceRequest {
            source: NewSource {
                name,
                description: CREATED_BY,
                source_type: SOURCE_TYPE_HTTP,
                message_per_request: false,
                multiline_processing_enabled: true,
                host_name: name,
                category: name,
            },
        };
        let response: SourceEnvelope = self.post(&url, &request).await?;
        Ok(response.source)
    }

    /// Finds or creates the collector and HTTP source named `name` and
    /// returns the source's receiver URL
    pub async fn resolve_receiver_url(&self, name: &str) -> Result<String> {
        let collector = match self.find_collector(name).await? {
            Some(collector) => collector,
            None => {
                info!(name = name, "Creating hosted collector");
                self.create_collector(name).await?
            }
        };
        debug!(collector_id = collector.id, "Using collector");

        let source = match self.find_source(collector.id, name).await? {
            Some(source) => source,
            None => {
                info!(name = name, collector_id = collector.id, "Creating HTTP source");
                self.create_source(collector.id, name).await?
            }
        };

        match source.url {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(ProvisionError::MissingUrl(source.name)),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = url, "GET");
        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.access_id, Some(&self.credentials.access_key))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        debug!(url = url, "POST");
        let response = self
            .client
            .post(url)
            .basic_auth(&self.credentials.access_id, Some(&self.credentials.access_key))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(ProvisionError::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}
