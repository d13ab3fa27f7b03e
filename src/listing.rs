//! Paginated favorites listing: query building and page decoding.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::fetcher::HttpFetcher;

/// One media entry from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable identifier, also used as the local file stem.
    pub id: u64,
    /// Where the file can be downloaded from; empty when the API withholds it.
    pub source_url: String,
    /// File extension without the leading dot.
    pub extension: String,
}

impl Item {
    /// Local file name, `<id>.<ext>`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.extension)
    }

    /// Returns true if the extension is plain ASCII alphanumerics, so the
    /// file name stays a single component inside the storage directory.
    #[must_use]
    pub fn has_safe_extension(&self) -> bool {
        !self.extension.is_empty() && self.extension.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// Returns true if the item can be downloaded.
    #[must_use]
    pub fn has_source(&self) -> bool {
        !self.source_url.is_empty()
    }
}

/// Items returned by one listing request, in API order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Items on this page.
    pub items: Vec<Item>,
}

impl ListingPage {
    /// Number of items on the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the page has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the page's items.
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }
}

impl IntoIterator for ListingPage {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<Item> for ListingPage {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[derive(Deserialize)]
struct RawPostList {
    #[serde(default)]
    posts: Vec<RawPost>,
}

#[derive(Deserialize)]
struct RawPost {
    id: u64,
    #[serde(default)]
    file: RawFile,
}

#[derive(Deserialize, Default)]
struct RawFile {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ext: String,
}

impl From<RawPost> for Item {
    fn from(post: RawPost) -> Self {
        Self {
            id: post.id,
            source_url: post.file.url.unwrap_or_default(),
            extension: post.file.ext,
        }
    }
}

/// Decodes a listing body. Unknown fields are ignored.
///
/// # Errors
///
/// Returns [`Error::Decode`] if `body` is not a JSON object of the expected shape.
pub fn decode_page(page: u32, body: &[u8]) -> Result<ListingPage> {
    let list: RawPostList =
        serde_json::from_slice(body).map_err(|source| Error::Decode { page, source })?;
    Ok(list.posts.into_iter().map(Item::from).collect())
}

/// Source of listing pages.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetches page `page` of items matching `tags`, at most `limit` per page.
    async fn fetch_page(
        &self,
        tags: &str,
        limit: u32,
        page: u32,
        token: &CancellationToken,
    ) -> Result<ListingPage>;
}

/// Listing client for the remote JSON API.
#[derive(Debug, Clone)]
pub struct ListingClient {
    fetcher: HttpFetcher,
    base_url: reqwest::Url,
}

impl ListingClient {
    /// Creates a client querying `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` does not parse.
    pub fn new(fetcher: HttpFetcher, base_url: &str) -> Result<Self> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid listing URL {base_url}: {e}")))?;
        Ok(Self { fetcher, base_url })
    }

    /// Builds the request URL for one page.
    #[must_use]
    pub fn page_url(&self, tags: &str, limit: u32, page: u32) -> reqwest::Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("tags", tags)
            .append_pair("limit", &limit.to_string())
            .append_pair("page", &page.to_string());
        url
    }
}

#[async_trait]
impl ListingSource for ListingClient {
    async fn fetch_page(
        &self,
        tags: &str,
        limit: u32,
        page: u32,
        token: &CancellationToken,
    ) -> Result<ListingPage> {
        let url = self.page_url(tags, limit, page);
        log::info!("{url}");

        let response = self.fetcher.fetch(url.as_str(), token).await?;
        let body = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::Cancelled),
            body = response.bytes() => body?,
        };
        decode_page(page, &body)
    }
}
