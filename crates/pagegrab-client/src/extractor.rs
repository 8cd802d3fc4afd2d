//! Comic page image extraction from static HTML.
//!
//! Candidates are collected by a chain of strategies, each scored as it is
//! found. First-seen order is kept throughout; scores only decide which tier
//! is emitted.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use pagegrab_core::models::{ImageCandidate, Provenance};
use pagegrab_core::traits::Extractor;
use regex::Regex;
use scraper::{Html, Selector};

use crate::score::{MIN_HIGH_CONFIDENCE, is_high_confidence, score_image_url};

/// `<img>` attributes that may carry the page URL, in lookup order.
/// Lazy-loading plugins park the real URL in one of the `data-*` variants.
const IMG_SOURCE_ATTRS: &[&str] = &[
    "src",
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-url",
    "data-image",
    "data-full",
    "data-hi-res-src",
];

static IMG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("static selector is valid"));

static SOURCE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("source").expect("static selector is valid"));

static EMBEDDED_JSON_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(https?://[^"]+\.(?:jpg|jpeg|png|webp|gif|avif)[^"]*)""#)
        .expect("hardcoded regex pattern is valid")
});

static RAW_IMG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+(?:src|data-src)=["']([^"']+)["'][^>]*>"#)
        .expect("hardcoded regex pattern is valid")
});

// ---------------------------------------------------------------------------
// CandidateSet
// ---------------------------------------------------------------------------

/// Accepted candidates in first-seen order, deduplicated by exact URL.
#[derive(Debug, Default)]
pub struct CandidateSet {
    seen: HashSet<String>,
    accepted: Vec<ImageCandidate>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score `url` and keep it if it is new and not rejected.
    ///
    /// A URL that was already accepted keeps its first score and position.
    pub fn offer(&mut self, url: &str, provenance: Provenance) -> bool {
        if url.is_empty() || self.seen.contains(url) {
            return false;
        }
        match score_image_url(url) {
            Some(score) => {
                tracing::trace!(%url, score, ?provenance, "Candidate accepted");
                self.seen.insert(url.to_string());
                self.accepted.push(ImageCandidate {
                    url: url.to_string(),
                    provenance,
                    score,
                });
                true
            }
            None => {
                tracing::trace!(%url, ?provenance, "Candidate rejected");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn candidates(&self) -> &[ImageCandidate] {
        &self.accepted
    }

    pub fn into_candidates(self) -> Vec<ImageCandidate> {
        self.accepted
    }

    /// Emit the high-confidence tier when it is large enough, otherwise
    /// everything accepted. Order is first-seen either way.
    pub fn select(&self) -> Vec<String> {
        let high: Vec<&ImageCandidate> = self
            .accepted
            .iter()
            .filter(|c| is_high_confidence(c.score))
            .collect();

        if high.len() >= MIN_HIGH_CONFIDENCE {
            high.into_iter().map(|c| c.url.clone()).collect()
        } else {
            self.accepted.iter().map(|c| c.url.clone()).collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One way of finding candidate URLs in a document.
pub trait CandidateStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn collect(&self, html: &str, candidates: &mut CandidateSet);
}

/// Walks the parsed document: `<img>` source attributes, then `<source>` srcsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomStrategy;

impl CandidateStrategy for DomStrategy {
    fn name(&self) -> &'static str {
        "dom"
    }

    fn collect(&self, html: &str, candidates: &mut CandidateSet) {
        let document = Html::parse_document(html);

        for img in document.select(&IMG) {
            let element = img.value();
            for attr in IMG_SOURCE_ATTRS {
                if let Some(value) = element.attr(attr) {
                    candidates.offer(value.trim(), Provenance::Attribute);
                }
            }
        }

        for source in document.select(&SOURCE) {
            let element = source.value();
            let srcset = element
                .attr("srcset")
                .filter(|s| !s.is_empty())
                .or_else(|| element.attr("data-srcset"));
            if let Some(srcset) = srcset {
                for url in srcset_urls(srcset) {
                    candidates.offer(url, Provenance::Srcset);
                }
            }
        }
    }
}

/// Quoted absolute image URLs in inline scripts and JSON blobs, which the
/// document tree only sees as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedJsonStrategy;

impl CandidateStrategy for EmbeddedJsonStrategy {
    fn name(&self) -> &'static str {
        "embedded-json"
    }

    fn collect(&self, html: &str, candidates: &mut CandidateSet) {
        for caps in EMBEDDED_JSON_URL.captures_iter(html) {
            candidates.offer(&caps[1], Provenance::EmbeddedJson);
        }
    }
}

/// Text-level `<img src=...>` matching for markup the tree path got nothing from.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTagStrategy;

impl CandidateStrategy for RawTagStrategy {
    fn name(&self) -> &'static str {
        "raw-tag"
    }

    fn collect(&self, html: &str, candidates: &mut CandidateSet) {
        for caps in RAW_IMG_TAG.captures_iter(html) {
            candidates.offer(&caps[1], Provenance::RawTag);
        }
    }
}

/// URL parts of a `srcset` value such as `"a.jpg 1x, b.jpg 2x"`.
fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
}

// ---------------------------------------------------------------------------
// PageExtractor
// ---------------------------------------------------------------------------

type StrategyList = Arc<[Box<dyn CandidateStrategy>]>;

/// Manga/comic page extractor.
///
/// Runs the primary strategies in order, then the fallback strategies only if
/// nothing has been accepted yet.
#[derive(Clone)]
pub struct PageExtractor {
    primary: StrategyList,
    fallback: StrategyList,
}

impl PageExtractor {
    /// Tree parsing plus embedded-JSON scan, raw-tag regex as fallback.
    pub fn new() -> Self {
        Self::with_strategies(
            vec![
                Box::new(DomStrategy) as Box<dyn CandidateStrategy>,
                Box::new(EmbeddedJsonStrategy),
            ],
            vec![Box::new(RawTagStrategy) as Box<dyn CandidateStrategy>],
        )
    }

    /// Text-only extraction, for when building a document tree is not wanted.
    pub fn text_only() -> Self {
        Self::with_strategies(
            vec![Box::new(EmbeddedJsonStrategy) as Box<dyn CandidateStrategy>],
            vec![Box::new(RawTagStrategy) as Box<dyn CandidateStrategy>],
        )
    }

    pub fn with_strategies(
        primary: Vec<Box<dyn CandidateStrategy>>,
        fallback: Vec<Box<dyn CandidateStrategy>>,
    ) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    /// All accepted candidates with provenance and score, before tier selection.
    pub fn candidates(&self, html: &str) -> CandidateSet {
        let mut candidates = CandidateSet::new();

        for strategy in self.primary.iter() {
            let before = candidates.len();
            strategy.collect(html, &mut candidates);
            tracing::debug!(
                strategy = strategy.name(),
                accepted = candidates.len() - before,
                "Strategy finished"
            );
        }

        if candidates.is_empty() {
            for strategy in self.fallback.iter() {
                strategy.collect(html, &mut candidates);
                tracing::debug!(
                    strategy = strategy.name(),
                    accepted = candidates.len(),
                    "Fallback strategy finished"
                );
            }
        }

        candidates
    }
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for PageExtractor {
    fn extract(&self, html: &str) -> Vec<String> {
        self.candidates(html).select()
    }
}
