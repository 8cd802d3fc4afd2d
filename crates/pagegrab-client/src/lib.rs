pub mod extractor;
pub mod relay;
pub mod score;

pub use extractor::{CandidateSet, CandidateStrategy, PageExtractor};
pub use relay::{RelayEndpoint, RelayFetcher};
pub use score::score_image_url;
