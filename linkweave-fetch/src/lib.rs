pub mod error;
pub mod fetcher;
pub mod page;
pub mod wikipedia;

pub use error::{FetchError, FetchErrorKind};
pub use fetcher::{MemoryFetcher, PageFetcher, PoliteFetcher};
pub use page::PageMetadata;
pub use wikipedia::WikipediaFetcher;
