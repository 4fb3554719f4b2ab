//! Transport between a job and its endpoint.
//!
//! A [`Transport`] carries one [`Message`] and returns the endpoint's raw JSON
//! answer. Interpreting that answer is the job's business.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{HalError, HalResult};
use crate::wire::Message;

/// Delivers messages to one execution endpoint.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send a message and wait for the raw answer.
    async fn send(&self, message: Message) -> HalResult<Value>;
}

/// HTTP transport to a remote endpoint service.
///
/// The underlying client is built on first use.
pub struct HttpTransport {
    base_url: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    client: OnceCell<Client>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("connected", &self.client.initialized())
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport for `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, &ClientConfig::default())
    }

    /// Create a transport with the timeouts from `config`.
    pub fn with_config(base_url: impl Into<String>, config: &ClientConfig) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            connect_timeout: config.connect_timeout(),
            client: OnceCell::new(),
        }
    }

    /// The endpoint's base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn client(&self) -> HalResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                debug!("Connecting to {}", self.base_url);
                Client::builder()
                    .timeout(self.request_timeout)
                    .connect_timeout(self.connect_timeout)
                    .build()
                    .map_err(|e| HalError::transport(&self.base_url, e))
            })
            .await
    }

    fn url(&self, message: &Message) -> String {
        let path = match message {
            Message::Run(_) => "run",
            Message::UpdateParameters(_) => "parameters",
        };
        format!("{}/{path}", self.base_url)
    }

    /// Handle HTTP response: return the JSON body or a transport failure.
    async fn handle_response(&self, response: reqwest::Response) -> HalResult<Value> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| HalError::transport(&self.base_url, e))
        } else {
            let message = response.text().await.unwrap_or_default();
            let message = match status {
                StatusCode::NOT_FOUND => format!("no such route on endpoint: {message}"),
                _ => format!("HTTP {}: {message}", status.as_u16()),
            };
            Err(HalError::transport(&self.base_url, message))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, message), fields(circuit = %message.circuit_id()))]
    async fn send(&self, message: Message) -> HalResult<Value> {
        let url = self.url(&message);
        debug!("POST {}", url);

        let response = self
            .client()
            .await?
            .post(&url)
            .json(&message)
            .send()
            .await
            .map_err(|e| HalError::transport(&self.base_url, e))?;

        self.handle_response(response).await
    }
}
