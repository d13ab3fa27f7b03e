//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::config::RetryPolicy;
use crate::fetcher::HttpFetcher;
use crate::listing::{Item, ListingPage};
use crate::rate_limit::RateLimiter;

/// Retry policy with millisecond cooldowns.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay_ms: 5,
        max_delay_ms: 20,
    }
}

/// Fetcher with a near-zero rate interval.
pub fn test_fetcher(retry: RetryPolicy) -> HttpFetcher {
    HttpFetcher::new(
        reqwest::Client::new(),
        Arc::new(RateLimiter::new(Duration::from_millis(1))),
        retry,
    )
}

pub fn item(id: u64, url: &str, ext: &str) -> Item {
    Item {
        id,
        source_url: url.to_string(),
        extension: ext.to_string(),
    }
}

pub fn page(items: Vec<Item>) -> ListingPage {
    ListingPage { items }
}

/// Listing body in the remote API's shape.
pub fn posts_json(posts: &[(u64, Option<&str>, &str)]) -> Value {
    let posts: Vec<Value> = posts
        .iter()
        .map(|(id, url, ext)| json!({ "id": id, "file": { "url": url, "ext": ext } }))
        .collect();
    json!({ "posts": posts })
}
