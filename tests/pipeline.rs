use std::path::Path;
use std::time::Duration;

use fav_dl::{AppConfig, DownloadConfig, Error, Pipeline, Profile, RetryPolicy};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer, storage: &Path, page_size: u32) -> AppConfig {
    AppConfig {
        profile: Profile::new("wolf", storage),
        download: DownloadConfig::new()
            .with_listing_url(format!("{}/posts.json", server.uri()))
            .with_page_size(page_size)
            .with_rate_interval(Duration::from_millis(1))
            .with_retry(RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 5,
                max_delay_ms: 10,
            }),
    }
}

fn posts(server: &MockServer, entries: &[(u64, bool, &str)]) -> Value {
    let posts: Vec<Value> = entries
        .iter()
        .map(|&(id, has_url, ext)| {
            let url = has_url.then(|| format!("{}/files/{id}.{ext}", server.uri()));
            json!({ "id": id, "file": { "url": url, "ext": ext } })
        })
        .collect();
    json!({ "posts": posts })
}

async fn mount_page(server: &MockServer, page: u32, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .and(query_param("tags", "fav:wolf"))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, name: &str, body: &[u8], times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn short_page_ends_listing_and_missing_url_is_recorded() {
    let server = MockServer::start().await;
    mount_page(&server, 0, posts(&server, &[(1, true, "png"), (2, false, "png")]), 1).await;
    mount_page(&server, 1, posts(&server, &[(3, true, "png")]), 1).await;
    mount_page(&server, 2, posts(&server, &[]), 0).await;
    mount_file(&server, "1.png", b"one", 1).await;
    mount_file(&server, "3.png", b"three", 1).await;

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(&server, dir.path(), 2)).unwrap();
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.stats.pages_fetched, 2);
    assert_eq!(report.stats.files_downloaded, 2);
    assert_eq!(report.stats.missing_urls, vec![2]);
    assert_eq!(std::fs::read(dir.path().join("1.png")).unwrap(), b"one");
    assert_eq!(std::fs::read(dir.path().join("3.png")).unwrap(), b"three");
    assert!(!dir.path().join("2.png").exists());
}

#[tokio::test]
async fn existing_file_is_not_fetched_again() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        0,
        posts(&server, &[(4, true, "png"), (5, true, "png"), (6, true, "png")]),
        1,
    )
    .await;
    mount_file(&server, "4.png", b"four", 1).await;
    mount_file(&server, "5.png", b"replacement", 0).await;
    mount_file(&server, "6.png", b"six", 1).await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("5.png"), b"original").unwrap();

    let pipeline = Pipeline::new(test_config(&server, dir.path(), 10)).unwrap();
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.stats.files_skipped, 1);
    assert_eq!(report.stats.files_downloaded, 2);
    assert_eq!(std::fs::read(dir.path().join("5.png")).unwrap(), b"original");
}

#[tokio::test]
async fn second_run_downloads_nothing() {
    let server = MockServer::start().await;
    mount_page(&server, 0, posts(&server, &[(1, true, "png"), (2, true, "gif")]), 2).await;
    mount_page(&server, 1, posts(&server, &[(3, true, "webm")]), 2).await;
    mount_file(&server, "1.png", b"a", 1).await;
    mount_file(&server, "2.gif", b"b", 1).await;
    mount_file(&server, "3.webm", b"c", 1).await;

    let dir = TempDir::new().unwrap();
    let storage = dir.path().join("favs");
    let pipeline = Pipeline::new(test_config(&server, &storage, 2)).unwrap();

    let first = pipeline.run(&CancellationToken::new()).await;
    assert_eq!(first.stats.files_downloaded, 3);

    let second = pipeline.run(&CancellationToken::new()).await;
    assert!(second.is_success(), "{second:?}");
    assert_eq!(second.stats.files_downloaded, 0);
    assert_eq!(second.stats.files_skipped, 3);
}

#[tokio::test]
async fn listing_failure_still_waits_for_dispatched_downloads() {
    let server = MockServer::start().await;
    mount_page(&server, 0, posts(&server, &[(1, true, "png"), (2, true, "png")]), 1).await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;
    for name in ["1.png", "2.png"] {
        Mock::given(method("GET"))
            .and(path(format!("/files/{name}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"slow".to_vec())
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(&server, dir.path(), 2)).unwrap();
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(matches!(report.error, Some(Error::Status { .. })));
    assert!(!report.is_success());
    assert_eq!(report.stats.files_downloaded, 2);
    assert!(dir.path().join("1.png").exists());
    assert!(dir.path().join("2.png").exists());
}

#[tokio::test]
async fn failed_download_does_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        0,
        posts(&server, &[(1, true, "png"), (2, true, "png"), (3, true, "png")]),
        1,
    )
    .await;
    mount_file(&server, "1.png", b"a", 1).await;
    Mock::given(method("GET"))
        .and(path("/files/2.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_file(&server, "3.png", b"c", 1).await;

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(&server, dir.path(), 10)).unwrap();
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(report.error.is_none());
    assert!(!report.is_success());
    assert_eq!(report.stats.files_downloaded, 2);
    assert_eq!(report.stats.files_failed, 1);
    assert_eq!(report.failures[0].id, Some(2));
    assert!(!dir.path().join("2.png").exists());
    assert!(!dir.path().join("2.png.part").exists());
}

#[tokio::test]
async fn server_errors_on_listing_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 0, posts(&server, &[(9, true, "jpg")]), 1).await;
    mount_file(&server, "9.jpg", b"nine", 1).await;

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(&server, dir.path(), 5)).unwrap();
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.stats.files_downloaded, 1);
}

#[tokio::test]
async fn cancelled_run_issues_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(&server, dir.path(), 2)).unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let report = pipeline.run(&token).await;

    assert!(report.was_cancelled());
    assert_eq!(report.stats.pages_fetched, 0);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = AppConfig {
        profile: Profile::new("", "."),
        ..AppConfig::default()
    };
    assert!(matches!(Pipeline::new(config), Err(Error::Config(_))));
}
