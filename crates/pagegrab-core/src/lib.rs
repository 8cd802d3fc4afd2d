pub mod config;
pub mod curation;
pub mod error;
pub mod grab;
pub mod models;
pub mod store;
pub mod traits;


pub use config::GrabConfig;
pub use curation::PageList;
pub use error::{AppError, RelayFailure};
pub use grab::{Committed, GrabOutcome, GrabService};
pub use models::{Chapter, FetchedPage, ImageCandidate, NewChapter, Provenance, Relay};
pub use store::JsonlChapterStore;
pub use traits::{AttemptObserver, ChapterStore, Extractor, Fetcher, NullStore};
