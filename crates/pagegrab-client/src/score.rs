//! Heuristic scoring of candidate page image URLs.
//!
//! The weights and thresholds below were tuned by hand against real
//! manga-reader sites. Changing any of them changes which images get
//! picked, so they are kept as-is.

use std::sync::LazyLock;

use regex::Regex;

/// Bonus for filenames that look like `001.jpg`, `page_12.png`, `-7.webp`.
pub const NUMBERED_PAGE_BOOST: u32 = 3;
/// Bonus for URLs pointing at typical comic/image hosting.
pub const HOST_HINT_BOOST: u32 = 1;
/// Bonus for absolute `http(s)` URLs.
pub const ABSOLUTE_URL_BOOST: u32 = 1;
/// Minimum score of a high-confidence candidate.
pub const HIGH_CONFIDENCE_SCORE: u32 = 2;
/// Number of high-confidence candidates needed to drop the rest.
pub const MIN_HIGH_CONFIDENCE: usize = 3;

/// Substrings (matched case-insensitively) of comic-hosting infrastructure.
const HOST_HINTS: &[&str] = &[
    "cdn.", "img.", "image.", "static.", "media.", "storage.", "upload", "chapter", "manga",
    "comic", "webtoon", "manhwa", "manhua",
];

static IMAGE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:jpg|jpeg|png|webp|gif|avif)(?:\?.*)?$")
        .expect("hardcoded regex pattern is valid")
});

// 1-4 digits not preceded by another digit, right before the extension.
static NUMBERED_PAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9])[0-9]{1,4}\.(?:jpg|jpeg|png|webp|gif|avif)")
        .expect("hardcoded regex pattern is valid")
});

/// Score a candidate URL. `None` means rejected: it never appears in output.
pub fn score_image_url(url: &str) -> Option<u32> {
    if !IMAGE_EXTENSION.is_match(url) {
        return None;
    }
    if url.starts_with("data:") || url.contains("favicon") || url.contains("avatar") {
        return None;
    }
    if url.contains("logo") && !url.contains("chapter") && !url.contains("manga") {
        return None;
    }
    if url.contains("thumbnail") && !url.contains("chapter") {
        return Some(0);
    }

    let mut score = 0;
    if NUMBERED_PAGE.is_match(url) {
        score += NUMBERED_PAGE_BOOST;
    }
    let lowered = url.to_ascii_lowercase();
    if HOST_HINTS.iter().any(|hint| lowered.contains(hint)) {
        score += HOST_HINT_BOOST;
    }
    if url.starts_with("http") {
        score += ABSOLUTE_URL_BOOST;
    }
    Some(score)
}

/// True if a score puts a candidate in the high-confidence tier.
pub fn is_high_confidence(score: u32) -> bool {
    score >= HIGH_CONFIDENCE_SCORE
}
