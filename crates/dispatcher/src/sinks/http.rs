//! HttpSink - POSTs the JSON wire body to a downstream endpoint

use std::collections::HashMap;

use contracts::{BatchSink, ContractError, Envelope};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, warn};

/// Configuration for HttpSink
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Full URL receiving the batch sets
    pub endpoint: String,
}

impl HttpSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let endpoint = params
            .get("endpoint")
            .ok_or_else(|| ContractError::config_validation("params.endpoint", "missing"))?;

        Ok(Self {
            endpoint: endpoint.clone(),
        })
    }
}

/// Sink that forwards each batch set as one HTTP request
pub struct HttpSink {
    name: String,
    config: HttpSinkConfig,
    client: Client,
}

impl HttpSink {
    /// Create a new HttpSink
    pub fn new(name: impl Into<String>, config: HttpSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = Client::builder()
            .build()
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        Ok(Self {
            name,
            config,
            client,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let config = HttpSinkConfig::from_params(params)?;
        Self::new(name, config)
    }

    /// Target endpoint
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn classify(&self, error: reqwest::Error) -> ContractError {
        if error.is_connect() {
            ContractError::sink_connection(&self.name, error.to_string())
        } else {
            ContractError::sink_write(&self.name, error.to_string())
        }
    }
}

impl BatchSink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, dispatch_id = envelope.dispatch_id)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(envelope.body.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(
                sink = %self.name,
                endpoint = %self.config.endpoint,
                status = status.as_u16(),
                "Endpoint rejected batch set"
            );
            return Err(ContractError::sink_write(
                &self.name,
                format!("endpoint returned {}: {}", status.as_u16(), message),
            ));
        }

        debug!(sink = %self.name, status = status.as_u16(), "Batch set posted");
        Ok(())
    }

    #[instrument(name = "http_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "http_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "HttpSink closed");
        Ok(())
    }
}
