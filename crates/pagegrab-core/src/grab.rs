use tokio_util::sync::CancellationToken;

use crate::curation::PageList;
use crate::error::AppError;
use crate::models::{Chapter, NewChapter, Relay};
use crate::traits::{AttemptObserver, ChapterStore, Extractor, Fetcher};

/// Result of grabbing one source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrabOutcome {
    pub used_relay: Relay,
    pub html_bytes: usize,
    pub pages: PageList,
}

impl GrabOutcome {
    /// No images were found. Not an error: the page may only render its
    /// images after running scripts, which static HTML cannot show.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Outcome of committing a curated page list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Committed {
    Saved(Chapter),
    /// No store configured; the validated chapter is handed back as-is.
    Unsaved(NewChapter),
}

/// Orchestrates the grab pipeline: fetch → extract → curate → persist.
///
/// Generic over all external dependencies via traits, so it can be tested
/// without real relays or storage.
pub struct GrabService<F, E, S>
where
    F: Fetcher,
    E: Extractor,
    S: ChapterStore,
{
    fetcher: F,
    extractor: E,
    store: Option<S>,
}

impl<F, E, S> GrabService<F, E, S>
where
    F: Fetcher,
    E: Extractor,
    S: ChapterStore,
{
    /// Create a new GrabService without persistence.
    pub fn new(fetcher: F, extractor: E) -> Self {
        Self {
            fetcher,
            extractor,
            store: None,
        }
    }

    /// Create a new GrabService that saves committed chapters.
    pub fn with_store(fetcher: F, extractor: E, store: S) -> Self {
        Self {
            fetcher,
            extractor,
            store: Some(store),
        }
    }

    /// Fetch `url` through the relay chain and extract its page images.
    pub async fn grab(
        &self,
        url: &str,
        on_attempt: Option<&AttemptObserver>,
        cancel: &CancellationToken,
    ) -> Result<GrabOutcome, AppError> {
        tracing::info!("Grabbing {}", url);
        let fetched = self.fetcher.fetch(url, on_attempt, cancel).await?;
        tracing::info!(
            relay = %fetched.used_relay,
            "Fetched {} bytes of HTML",
            fetched.html.len()
        );

        let pages = self.extractor.extract(&fetched.html);
        if pages.is_empty() {
            tracing::warn!(%url, "No page images found");
        } else {
            tracing::info!("Extracted {} page images", pages.len());
        }

        Ok(GrabOutcome {
            used_relay: fetched.used_relay,
            html_bytes: fetched.html.len(),
            pages: PageList::new(pages),
        })
    }

    /// Extract page images from HTML the caller already has.
    pub fn extract_local(&self, html: &str) -> PageList {
        PageList::new(self.extractor.extract(html))
    }

    /// Validate a curated page list and persist it as a chapter.
    pub async fn commit(
        &self,
        pages: PageList,
        comic_id: u64,
        number: u64,
        title: &str,
    ) -> Result<Committed, AppError> {
        let chapter = pages.into_chapter(comic_id, number, title)?;
        match &self.store {
            Some(store) => Ok(Committed::Saved(store.save(&chapter).await?)),
            None => Ok(Committed::Unsaved(chapter)),
        }
    }

    /// Chapters already stored for a comic. Empty when no store is configured.
    pub async fn chapters(&self, comic_id: u64) -> Result<Vec<Chapter>, AppError> {
        match &self.store {
            Some(store) => store.list_by_comic(comic_id).await,
            None => Ok(vec![]),
        }
    }
}
