use std::time::Duration;

use pagegrab_client::PageExtractor;
use pagegrab_core::grab::{Committed, GrabService};
use pagegrab_core::models::Relay;
use pagegrab_core::store::JsonlChapterStore;
use pagegrab_core::traits::{AttemptObserver, NullStore};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::integration::common::{
    AttemptLog, CHAPTER_HTML, TARGET_URL, TestRelays, expected_pages,
};

#[tokio::test]
async fn grab_curate_and_commit_chapter() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_HTML))
        .mount(&relays.fallback)
        .await;

    let dir = tempfile::tempdir()?;
    let store = JsonlChapterStore::new(dir.path().join("chapters.jsonl"));
    let svc = GrabService::with_store(
        relays.fetcher(Duration::from_secs(5)),
        PageExtractor::new(),
        store,
    );

    let log = AttemptLog::default();
    let observer = log.observer();
    let outcome = svc
        .grab(
            TARGET_URL,
            Some(&observer as &AttemptObserver),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(outcome.used_relay, Relay::CorsProxy);
    assert_eq!(outcome.pages.as_slice(), expected_pages().as_slice());
    assert_eq!(log.attempts(), vec![Relay::AllOrigins, Relay::CorsProxy]);

    // Curator drops the last page and moves the second to the front.
    let mut pages = outcome.pages;
    pages.remove(2)?;
    pages.move_page(1, 0)?;

    let committed = svc.commit(pages, 42, 12, "The Blue Moon").await?;
    let Committed::Saved(chapter) = committed else {
        panic!("expected the chapter to be stored");
    };
    assert_eq!(
        chapter.pages,
        vec![expected_pages()[1].clone(), expected_pages()[0].clone()]
    );

    let stored = svc.chapters(42).await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, chapter.id);
    assert_eq!(stored[0].pages, chapter.pages);
    Ok(())
}

#[tokio::test]
async fn page_without_images_is_an_empty_outcome() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contents": "<html><body><div id=\"app\"></div><script src=\"/bundle.js\"></script></body></html>"
        })))
        .mount(&relays.primary)
        .await;

    let svc = GrabService::<_, _, NullStore>::new(
        relays.fetcher(Duration::from_secs(5)),
        PageExtractor::new(),
    );

    let outcome = svc
        .grab(TARGET_URL, None, &CancellationToken::new())
        .await?;

    assert_eq!(outcome.used_relay, Relay::AllOrigins);
    assert!(outcome.is_empty());
    Ok(())
}

#[tokio::test]
async fn same_html_extracts_identically_through_either_relay() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "contents": CHAPTER_HTML })))
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_HTML))
        .mount(&relays.fallback)
        .await;

    let svc = GrabService::<_, _, NullStore>::new(
        relays.fetcher(Duration::from_secs(5)),
        PageExtractor::new(),
    );
    let first = svc
        .grab(TARGET_URL, None, &CancellationToken::new())
        .await?;
    let local = svc.extract_local(CHAPTER_HTML);

    assert_eq!(first.pages, local);
    Ok(())
}
