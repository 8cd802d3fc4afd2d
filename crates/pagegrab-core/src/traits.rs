use std::future::Future;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Chapter, FetchedPage, NewChapter, Relay};

/// Progress hook invoked synchronously right before each relay attempt.
pub type AttemptObserver = dyn Fn(Relay) + Send + Sync;

/// Fetches the raw HTML of a third-party page.
///
/// All-or-nothing: either one attempt succeeds and its body is returned, or
/// the call fails as a whole.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        on_attempt: Option<&AttemptObserver>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<FetchedPage, AppError>> + Send;
}

/// Turns HTML text into an ordered list of likely page image URLs.
///
/// Total: malformed markup degrades to fewer results, never to an error.
pub trait Extractor: Send + Sync + Clone {
    fn extract(&self, html: &str) -> Vec<String>;
}

/// Persists curated chapters.
pub trait ChapterStore: Send + Sync + Clone {
    /// Save a new chapter. Stored records are never modified afterwards.
    fn save(&self, chapter: &NewChapter) -> impl Future<Output = Result<Chapter, AppError>> + Send;

    /// All chapters of a comic, ordered by chapter number then creation time.
    fn list_by_comic(
        &self,
        comic_id: u64,
    ) -> impl Future<Output = Result<Vec<Chapter>, AppError>> + Send;
}

/// A no-op ChapterStore for use when persistence is not needed.
#[derive(Debug, Clone)]
pub struct NullStore;

impl ChapterStore for NullStore {
    async fn save(&self, chapter: &NewChapter) -> Result<Chapter, AppError> {
        Ok(Chapter {
            id: Uuid::nil(),
            comic_id: chapter.comic_id,
            number: chapter.number,
            title: chapter.title.clone(),
            pages: chapter.pages.clone(),
            created_at: Utc::now(),
        })
    }

    async fn list_by_comic(&self, _comic_id: u64) -> Result<Vec<Chapter>, AppError> {
        Ok(vec![])
    }
}
