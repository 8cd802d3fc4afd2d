use std::time::Duration;

use crate::error::AppError;
use crate::models::Relay;

/// Per-attempt deadline used when nothing else is configured.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

pub const DEFAULT_USER_AGENT: &str = "pagegrab/0.1 (chapter grabber)";

/// Configuration for the relay fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrabConfig {
    /// Relays in priority order.
    pub relays: Vec<Relay>,
    pub attempt_timeout: Duration,
    pub user_agent: String,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            relays: Relay::DEFAULT_CHAIN.to_vec(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl GrabConfig {
    /// Read configuration from environment variables.
    ///
    /// - `PAGEGRAB_RELAYS` (optional, comma-separated, defaults to `allorigins,corsproxy`)
    /// - `PAGEGRAB_TIMEOUT_SECS` (optional, defaults to 15)
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("PAGEGRAB_RELAYS") {
            config.relays = parse_relay_list(&raw)?;
        }

        if let Ok(raw) = std::env::var("PAGEGRAB_TIMEOUT_SECS") {
            config.attempt_timeout = parse_timeout_secs(&raw)?;
        }

        Ok(config)
    }

    /// Replace the relay chain, rejecting empty or repeated entries.
    pub fn with_relays(mut self, relays: Vec<Relay>) -> Result<Self, AppError> {
        validate_chain(&relays)?;
        self.relays = relays;
        Ok(self)
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Result<Self, AppError> {
        if timeout.is_zero() {
            return Err(AppError::ConfigError(
                "Attempt timeout must be greater than zero".into(),
            ));
        }
        self.attempt_timeout = timeout;
        Ok(self)
    }
}

/// Parse a comma-separated relay chain such as `"allorigins, corsproxy"`.
pub fn parse_relay_list(raw: &str) -> Result<Vec<Relay>, AppError> {
    let relays = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.parse::<Relay>())
        .collect::<Result<Vec<_>, _>>()?;
    validate_chain(&relays)?;
    Ok(relays)
}

fn parse_timeout_secs(raw: &str) -> Result<Duration, AppError> {
    let secs: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid PAGEGRAB_TIMEOUT_SECS '{raw}': must be a positive integer"
        ))
    })?;
    if secs == 0 {
        return Err(AppError::ConfigError(
            "PAGEGRAB_TIMEOUT_SECS must be at least 1".into(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn validate_chain(relays: &[Relay]) -> Result<(), AppError> {
    if relays.is_empty() {
        return Err(AppError::ConfigError(
            "Relay chain must contain at least one relay".into(),
        ));
    }
    for (i, relay) in relays.iter().enumerate() {
        if relays[..i].contains(relay) {
            return Err(AppError::ConfigError(format!(
                "Relay '{relay}' appears more than once in the chain"
            )));
        }
    }
    Ok(())
}
