use crate::error::{FetchError, FetchErrorKind, Result};
use crate::page::PageMetadata;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Retrieves metadata and outbound references for one topic.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, title: &str) -> Result<PageMetadata>;
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Arc<F> {
    async fn fetch(&self, title: &str) -> Result<PageMetadata> {
        (**self).fetch(title).await
    }
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Box<F> {
    async fn fetch(&self, title: &str) -> Result<PageMetadata> {
        (**self).fetch(title).await
    }
}

/// Wraps a fetcher and sleeps for a fixed delay after every call, whether the
/// call succeeded or not.
pub struct PoliteFetcher<F> {
    inner: F,
    delay: Duration,
}

impl<F> PoliteFetcher<F> {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

    pub fn new(inner: F) -> Self {
        Self {
            inner,
            delay: Self::DEFAULT_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for PoliteFetcher<F> {
    async fn fetch(&self, title: &str) -> Result<PageMetadata> {
        let result = self.inner.fetch(title).await;
        tokio::time::sleep(self.delay).await;
        result
    }
}

#[derive(Debug, Clone)]
enum Canned {
    Page(PageMetadata),
    Fail(FetchErrorKind),
}

/// Deterministic in-memory fetcher. Unknown titles are `NotFound`; every
/// call is recorded so tests can check how often a title was requested.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pages: HashMap<String, Canned>,
    calls: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, title: &str, page: PageMetadata) -> Self {
        self.pages.insert(title.to_string(), Canned::Page(page));
        self
    }

    /// Shorthand for a page that only carries outbound links.
    pub fn with_links(self, title: &str, links: &[&str]) -> Self {
        let mut page = PageMetadata::with_body(
            format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
            format!("{} summary", title),
            &format!("{} body text", title),
        );
        page.links = links.iter().map(|l| l.to_string()).collect();
        self.with_page(title, page)
    }

    pub fn with_error(mut self, title: &str, kind: FetchErrorKind) -> Self {
        self.pages.insert(title.to_string(), Canned::Fail(kind));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, title: &str) -> usize {
        self.calls().iter().filter(|t| t.as_str() == title).count()
    }
}

#[async_trait]
impl PageFetcher for MemoryFetcher {
    async fn fetch(&self, title: &str) -> Result<PageMetadata> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(title.to_string());
        }
        debug!("Memory fetch {}", title);

        match self.pages.get(title) {
            Some(Canned::Page(page)) => Ok(page.clone().bounded()),
            Some(Canned::Fail(FetchErrorKind::NotFound)) | None => {
                Err(FetchError::NotFound(title.to_string()))
            }
            Some(Canned::Fail(FetchErrorKind::Ambiguous)) => Err(FetchError::Ambiguous {
                title: title.to_string(),
                options: Vec::new(),
            }),
            Some(Canned::Fail(FetchErrorKind::Other)) => {
                Err(FetchError::Other(format!("simulated failure for {}", title)))
            }
        }
    }
}
