use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Chapter, NewChapter};
use crate::traits::ChapterStore;

/// Append-only chapter store backed by a JSON-lines file.
///
/// Each saved chapter is written as one line and never rewritten. A missing
/// file reads as an empty store.
#[derive(Clone)]
pub struct JsonlChapterStore {
    path: PathBuf,
    /// Serialises appends from clones sharing the same file.
    write_lock: Arc<Mutex<()>>,
}

impl JsonlChapterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Chapter>, AppError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(AppError::StoreError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<Chapter>(line).map_err(|e| {
                    AppError::StoreError(format!(
                        "Corrupt record on line {} of {}: {e}",
                        i + 1,
                        self.path.display()
                    ))
                })
            })
            .collect()
    }
}

impl ChapterStore for JsonlChapterStore {
    async fn save(&self, chapter: &NewChapter) -> Result<Chapter, AppError> {
        let record = Chapter {
            id: Uuid::new_v4(),
            comic_id: chapter.comic_id,
            number: chapter.number,
            title: chapter.title.clone(),
            pages: chapter.pages.clone(),
            created_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                AppError::StoreError(format!("Failed to open {}: {e}", self.path.display()))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to write chapter: {e}")))?;
        file.flush()
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to flush chapter: {e}")))?;

        tracing::info!(
            id = %record.id,
            comic_id = record.comic_id,
            number = record.number,
            pages = record.pages.len(),
            "Chapter saved"
        );
        Ok(record)
    }

    async fn list_by_comic(&self, comic_id: u64) -> Result<Vec<Chapter>, AppError> {
        let mut chapters: Vec<Chapter> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|c| c.comic_id == comic_id)
            .collect();
        chapters.sort_by(|a, b| {
            a.number
                .cmp(&b.number)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(chapters)
    }
}
