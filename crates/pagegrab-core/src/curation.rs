//! Curator-side editing of an extracted page list.
//!
//! Extraction order is only a suggestion: before a chapter is committed the
//! curator may reorder or drop pages, or type the list by hand when grabbing
//! failed. Nothing here reorders on its own.

use crate::error::AppError;
use crate::models::NewChapter;

/// Ordered page image URLs awaiting commit as a chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PageList {
    pages: Vec<String>,
}

impl PageList {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }

    /// Parse a hand-entered list: one URL per line, blank lines ignored.
    pub fn from_manual_text(text: &str) -> Self {
        let pages = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { pages }
    }

    /// Render as one URL per line, the format [`from_manual_text`](Self::from_manual_text) reads.
    pub fn to_manual_text(&self) -> String {
        self.pages.join("\n")
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<String> {
        self.pages
    }

    /// Move the page at `from` so it ends up at index `to`, shifting the pages in between.
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), AppError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let page = self.pages.remove(from);
            self.pages.insert(to, page);
        }
        Ok(())
    }

    /// Remove and return the page at `index`.
    pub fn remove(&mut self, index: usize) -> Result<String, AppError> {
        self.check_index(index)?;
        Ok(self.pages.remove(index))
    }

    /// Validate the list together with chapter metadata and hand it over for persistence.
    pub fn into_chapter(
        self,
        comic_id: u64,
        number: u64,
        title: impl Into<String>,
    ) -> Result<NewChapter, AppError> {
        if number < 1 {
            return Err(AppError::ValidationError(format!(
                "Invalid chapter number {number}: must be at least 1"
            )));
        }
        if self.pages.is_empty() {
            return Err(AppError::ValidationError(
                "No pages to save: the page list is empty".into(),
            ));
        }
        Ok(NewChapter {
            comic_id,
            number,
            title: title.into(),
            pages: self.pages,
        })
    }

    fn check_index(&self, index: usize) -> Result<(), AppError> {
        if index >= self.pages.len() {
            return Err(AppError::ValidationError(format!(
                "Page index {index} is out of range (list has {} pages)",
                self.pages.len()
            )));
        }
        Ok(())
    }
}

impl From<Vec<String>> for PageList {
    fn from(pages: Vec<String>) -> Self {
        Self::new(pages)
    }
}
