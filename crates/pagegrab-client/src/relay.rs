use std::sync::Arc;
use std::time::Duration;

use pagegrab_core::config::GrabConfig;
use pagegrab_core::error::{AppError, RelayFailure};
use pagegrab_core::models::{FetchedPage, Relay};
use pagegrab_core::traits::{AttemptObserver, Fetcher};
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::form_urlencoded;

/// One relay in the chain and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoint {
    pub relay: Relay,
    /// `None` for [`Relay::Direct`], which requests the target itself.
    pub base_url: Option<String>,
}

impl RelayEndpoint {
    /// Endpoint at the relay's public address.
    pub fn new(relay: Relay) -> Self {
        Self {
            relay,
            base_url: relay.default_base_url().map(str::to_string),
        }
    }

    /// Endpoint at a custom address, e.g. a self-hosted relay or a test server.
    pub fn with_base_url(relay: Relay, base_url: impl Into<String>) -> Self {
        Self {
            relay,
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
        }
    }

    /// The URL to GET in order to have this relay fetch `target`.
    pub fn request_url(&self, target: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
        let base = self.base_url.as_deref().unwrap_or_default();
        match self.relay {
            Relay::AllOrigins => format!("{base}/get?url={encoded}"),
            Relay::CorsProxy => format!("{base}/?{encoded}"),
            Relay::Direct => target.to_string(),
        }
    }
}

/// allorigins.win response body.
#[derive(Deserialize)]
struct AllOriginsEnvelope {
    contents: Option<String>,
}

/// HTTP fetcher that goes through public CORS relays.
///
/// Relays are tried strictly one after another in priority order, each
/// attempt bounded by its own timeout. The first success wins; if every
/// relay fails the caller gets a single [`AppError::AllRelaysFailed`]
/// listing each cause.
#[derive(Clone)]
pub struct RelayFetcher {
    client: Client,
    chain: Arc<[RelayEndpoint]>,
    attempt_timeout: Duration,
}

impl RelayFetcher {
    /// allorigins.win, then corsproxy.io, 15 s per attempt.
    pub fn new() -> Result<Self, AppError> {
        Self::from_config(&GrabConfig::default())
    }

    pub fn from_config(config: &GrabConfig) -> Result<Self, AppError> {
        let chain = config.relays.iter().copied().map(RelayEndpoint::new).collect();
        Self::with_endpoints(chain, config.attempt_timeout, &config.user_agent)
    }

    pub fn with_endpoints(
        chain: Vec<RelayEndpoint>,
        attempt_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(attempt_timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            chain: chain.into(),
            attempt_timeout,
        })
    }

    /// Relays in the order they will be tried.
    pub fn relays(&self) -> Vec<Relay> {
        self.chain.iter().map(|e| e.relay).collect()
    }

    /// A single request through one relay, without timeout handling.
    async fn attempt(&self, endpoint: &RelayEndpoint, target: &str) -> Result<String, AppError> {
        let label = endpoint.relay.host_label();
        let response = self
            .client
            .get(endpoint.request_url(target))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.attempt_timeout.as_secs())
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection to {label} failed: {e}"))
                } else {
                    AppError::HttpError(format!("{label}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "{label} responded with status {}",
                status.as_u16()
            )));
        }

        match endpoint.relay {
            Relay::AllOrigins => {
                let envelope: AllOriginsEnvelope = response.json().await.map_err(|e| {
                    AppError::InvalidEnvelope(format!("{label} returned malformed JSON: {e}"))
                })?;
                match envelope.contents {
                    Some(contents) if !contents.is_empty() => Ok(contents),
                    _ => Err(AppError::InvalidEnvelope(format!(
                        "{label} returned empty contents"
                    ))),
                }
            }
            Relay::CorsProxy | Relay::Direct => response.text().await.map_err(|e| {
                AppError::HttpError(format!("Failed to read response body from {label}: {e}"))
            }),
        }
    }
}

impl Fetcher for RelayFetcher {
    async fn fetch(
        &self,
        url: &str,
        on_attempt: Option<&AttemptObserver>,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage, AppError> {
        let mut failures = Vec::with_capacity(self.chain.len());

        for endpoint in self.chain.iter() {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            if let Some(observer) = on_attempt {
                observer(endpoint.relay);
            }
            tracing::info!(relay = %endpoint.relay, %url, "Trying relay");

            // Dropping the losing branch aborts the in-flight request.
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(AppError::Cancelled),
                result = tokio::time::timeout(self.attempt_timeout, self.attempt(endpoint, url)) => {
                    result.unwrap_or_else(|_| Err(AppError::Timeout(self.attempt_timeout.as_secs())))
                }
            };

            match outcome {
                Ok(html) => {
                    tracing::info!(relay = %endpoint.relay, bytes = html.len(), "Relay succeeded");
                    return Ok(FetchedPage {
                        html,
                        used_relay: endpoint.relay,
                    });
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(relay = %endpoint.relay, error = %e, "Relay failed");
                    failures.push(RelayFailure {
                        relay: endpoint.relay,
                        cause: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::AllRelaysFailed { failures })
    }
}
