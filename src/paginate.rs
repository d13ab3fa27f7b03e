//! Sequential page-by-page traversal of a listing.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::listing::{ListingPage, ListingSource};

/// Consumer of fetched pages, called in page order.
#[async_trait]
pub trait PageSink: Send {
    /// Handles page `index`. An error stops pagination.
    async fn accept(&mut self, index: u32, page: ListingPage, token: &CancellationToken) -> Result<()>;
}

/// Requests pages until one comes back short.
///
/// A page with fewer items than `page_size` (including an empty page) marks
/// the end of the listing. Page `n + 1` is only requested after page `n` has
/// been handed to the sink.
#[derive(Debug, Clone)]
pub struct Paginator<L> {
    source: L,
    page_size: u32,
    first_page: u32,
}

impl<L: ListingSource> Paginator<L> {
    /// Creates a paginator starting at page `first_page`.
    #[must_use]
    pub const fn new(source: L, page_size: u32, first_page: u32) -> Self {
        Self {
            source,
            page_size,
            first_page,
        }
    }

    /// Returns the underlying listing source.
    #[must_use]
    pub const fn source(&self) -> &L {
        &self.source
    }

    /// Walks the listing for `tags`, feeding every page to `sink`.
    ///
    /// Returns the number of pages fetched.
    ///
    /// # Errors
    ///
    /// Returns the first page fetch or sink error, or [`Error::Cancelled`]
    /// if `token` fires between pages.
    pub async fn run<S: PageSink + ?Sized>(
        &self,
        tags: &str,
        sink: &mut S,
        token: &CancellationToken,
    ) -> Result<u32> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".into()));
        }

        let mut index = self.first_page;
        let mut fetched = 0;
        loop {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let page = self
                .source
                .fetch_page(tags, self.page_size, index, token)
                .await?;
            fetched += 1;

            let listed = page.len();
            sink.accept(index, page, token).await?;

            if listed < self.page_size as usize {
                log::debug!("Page {index} had {listed} item(s), end of listing");
                return Ok(fetched);
            }
            index += 1;
        }
    }
}
