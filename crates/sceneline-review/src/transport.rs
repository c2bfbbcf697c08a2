//! Transports to the external decision service.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::prompt::ReviewPayload;

/// One way of reaching the decision service.
///
/// Implementations return the raw text the service produced; parsing and
/// reconciliation happen in the coordinator.
#[async_trait]
pub trait ReviewTransport: Send + Sync {
    /// Short name recorded in response metadata (`primary`, `fallback`, ...).
    fn label(&self) -> &str;

    async fn complete(
        &self,
        payload: &ReviewPayload,
        model: &str,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}

#[cfg(feature = "http")]
pub use http::MessagesTransport;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, info};

    use super::ReviewTransport;
    use crate::error::TransportError;
    use crate::prompt::ReviewPayload;

    const API_VERSION: &str = "2023-06-01";
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Messages-API client.
    pub struct MessagesTransport {
        label: String,
        client: reqwest::Client,
        messages_url: String,
        api_key: String,
    }

    #[derive(Serialize)]
    struct MessagesRequest<'a> {
        model: &'a str,
        max_tokens: u32,
        system: &'a str,
        messages: [Message<'a>; 1],
        temperature: f64,
    }

    #[derive(Serialize)]
    struct Message<'a> {
        role: &'static str,
        content: &'a str,
    }

    #[derive(Deserialize)]
    struct MessagesResponse {
        #[serde(default)]
        content: Vec<ContentBlock>,
    }

    #[derive(Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    enum ContentBlock {
        Text {
            text: String,
        },
        #[serde(other)]
        Other,
    }

    impl MessagesTransport {
        /// `base_url` should be like `https://api.anthropic.com` (a trailing
        /// slash is trimmed).
        pub fn new(
            label: impl Into<String>,
            base_url: &str,
            api_key: impl Into<String>,
        ) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()?;
            Ok(Self {
                label: label.into(),
                client,
                messages_url: format!("{}/v1/messages", base_url.trim_end_matches('/')),
                api_key: api_key.into(),
            })
        }

        pub fn messages_url(&self) -> &str {
            &self.messages_url
        }
    }

    #[async_trait]
    impl ReviewTransport for MessagesTransport {
        fn label(&self) -> &str {
            &self.label
        }

        async fn complete(
            &self,
            payload: &ReviewPayload,
            model: &str,
            timeout: Duration,
        ) -> Result<String, TransportError> {
            let body = MessagesRequest {
                model,
                max_tokens: payload.max_tokens,
                system: &payload.system,
                messages: [Message {
                    role: "user",
                    content: &payload.user,
                }],
                temperature: 0.0,
            };

            info!(transport = %self.label, url = %self.messages_url, "calling decision service");
            let resp = self
                .client
                .post(&self.messages_url)
                .timeout(timeout)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(timeout_aware)?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(TransportError::Server {
                    status: status.as_u16(),
                    body,
                });
            }

            let raw = resp.text().await.map_err(timeout_aware)?;
            let parsed: MessagesResponse = serde_json::from_str(&raw)?;
            let text: String = parsed
                .content
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text),
                    ContentBlock::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n");

            if text.trim().is_empty() {
                return Err(TransportError::EmptyResponse);
            }
            debug!(transport = %self.label, chars = text.len(), "decision service replied");
            Ok(text)
        }
    }

    fn timeout_aware(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(err)
        }
    }

}
