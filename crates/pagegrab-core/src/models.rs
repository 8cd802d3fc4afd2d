use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// A service that fetches a URL on our behalf and hands back its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relay {
    /// allorigins.win: wraps the page in a `{"contents": "..."}` JSON envelope.
    AllOrigins,
    /// corsproxy.io: returns the page body as-is.
    CorsProxy,
    /// No relay, the target is requested directly.
    Direct,
}

impl Relay {
    /// Default priority order: primary first, then fallback.
    pub const DEFAULT_CHAIN: [Relay; 2] = [Relay::AllOrigins, Relay::CorsProxy];

    /// Short identifier used in configuration and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Relay::AllOrigins => "allorigins",
            Relay::CorsProxy => "corsproxy",
            Relay::Direct => "direct",
        }
    }

    /// Human-facing label used in progress and error messages.
    pub fn host_label(self) -> &'static str {
        match self {
            Relay::AllOrigins => "allorigins.win",
            Relay::CorsProxy => "corsproxy.io",
            Relay::Direct => "direct",
        }
    }

    /// Public endpoint base for this relay. `Direct` has none.
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Relay::AllOrigins => Some("https://api.allorigins.win"),
            Relay::CorsProxy => Some("https://corsproxy.io"),
            Relay::Direct => None,
        }
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Relay {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allorigins" | "allorigins.win" => Ok(Relay::AllOrigins),
            "corsproxy" | "corsproxy.io" => Ok(Relay::CorsProxy),
            "direct" => Ok(Relay::Direct),
            other => Err(AppError::ConfigError(format!(
                "Unknown relay '{other}' (expected allorigins, corsproxy or direct)"
            ))),
        }
    }
}

/// Successful outcome of one relay-chain fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub html: String,
    pub used_relay: Relay,
}

/// Where in the document a candidate URL was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// An `<img>` source or lazy-load attribute.
    Attribute,
    /// An entry of a `<source>` responsive-image list.
    Srcset,
    /// A quoted absolute URL inside script or JSON text.
    EmbeddedJson,
    /// A raw `<img src=...>` match on unparsed text.
    RawTag,
}

/// A scored candidate that survived rejection.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ImageCandidate {
    pub url: String,
    pub provenance: Provenance,
    pub score: u32,
}

/// Input to the persistence collaborator: an ordered, curated page list
/// plus the chapter metadata.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NewChapter {
    pub comic_id: u64,
    pub number: u64,
    pub title: String,
    pub pages: Vec<String>,
}

/// A stored chapter record.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub comic_id: u64,
    pub number: u64,
    pub title: String,
    pub pages: Vec<String>,
    pub created_at: DateTime<Utc>,
}
