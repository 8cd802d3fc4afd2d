use std::time::Duration;

use pagegrab_client::{RelayEndpoint, RelayFetcher};
use pagegrab_core::error::AppError;
use pagegrab_core::models::Relay;
use pagegrab_core::traits::{AttemptObserver, Fetcher};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::integration::common::{AttemptLog, CHAPTER_HTML, TARGET_URL, TestRelays};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn primary_success_short_circuits() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("url", TARGET_URL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contents": CHAPTER_HTML,
            "status": {"http_code": 200}
        })))
        .expect(1)
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("unused"))
        .expect(0)
        .mount(&relays.fallback)
        .await;

    let log = AttemptLog::default();
    let observer = log.observer();
    let page = relays
        .fetcher(TIMEOUT)
        .fetch(
            TARGET_URL,
            Some(&observer as &AttemptObserver),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(page.used_relay, Relay::AllOrigins);
    assert_eq!(page.html, CHAPTER_HTML);
    assert_eq!(log.attempts(), vec![Relay::AllOrigins]);
    Ok(())
}

#[tokio::test]
async fn primary_500_falls_back_to_raw_body_relay() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_HTML))
        .expect(1)
        .mount(&relays.fallback)
        .await;

    let log = AttemptLog::default();
    let observer = log.observer();
    let page = relays
        .fetcher(TIMEOUT)
        .fetch(
            TARGET_URL,
            Some(&observer as &AttemptObserver),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(page.used_relay, Relay::CorsProxy);
    assert_eq!(page.html, CHAPTER_HTML);
    assert_eq!(log.attempts(), vec![Relay::AllOrigins, Relay::CorsProxy]);
    Ok(())
}

#[tokio::test]
async fn empty_envelope_contents_is_a_relay_failure() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"contents": ""})))
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_HTML))
        .expect(1)
        .mount(&relays.fallback)
        .await;

    let page = relays
        .fetcher(TIMEOUT)
        .fetch(TARGET_URL, None, &CancellationToken::new())
        .await?;

    assert_eq!(page.used_relay, Relay::CorsProxy);
    Ok(())
}

#[tokio::test]
async fn non_json_envelope_is_a_relay_failure() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_HTML))
        .mount(&relays.fallback)
        .await;

    let page = relays
        .fetcher(TIMEOUT)
        .fetch(TARGET_URL, None, &CancellationToken::new())
        .await?;

    assert_eq!(page.used_relay, Relay::CorsProxy);
    Ok(())
}

#[tokio::test]
async fn slow_primary_times_out_and_fallback_is_tried() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"contents": "<html>too late</html>"}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_HTML))
        .expect(1)
        .mount(&relays.fallback)
        .await;

    let started = std::time::Instant::now();
    let page = relays
        .fetcher(Duration::from_millis(300))
        .fetch(TARGET_URL, None, &CancellationToken::new())
        .await?;

    assert_eq!(page.used_relay, Relay::CorsProxy);
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn all_relays_failing_yields_one_aggregate_error() {
    let relays = TestRelays::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&relays.fallback)
        .await;

    let err = relays
        .fetcher(TIMEOUT)
        .fetch(TARGET_URL, None, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        AppError::AllRelaysFailed { failures } => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].relay, Relay::AllOrigins);
            assert!(failures[0].cause.contains("500"));
            assert_eq!(failures[1].relay, Relay::CorsProxy);
            assert!(failures[1].cause.contains("403"));
        }
        other => panic!("expected aggregate error, got {other:?}"),
    }
    assert!(err.to_string().contains("allorigins.win, corsproxy.io"));
}

#[tokio::test]
async fn cancellation_aborts_without_trying_fallback() {
    let relays = TestRelays::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"contents": "<html></html>"}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&relays.primary)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_HTML))
        .expect(0)
        .mount(&relays.fallback)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = relays
        .fetcher(TIMEOUT)
        .fetch(TARGET_URL, None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Cancelled));
}

#[tokio::test]
async fn unreachable_relay_counts_as_failure() -> anyhow::Result<()> {
    let relays = TestRelays::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHAPTER_HTML))
        .mount(&relays.fallback)
        .await;

    // Port 9 (discard) on localhost is expected to refuse connections.
    let fetcher = RelayFetcher::with_endpoints(
        vec![
            RelayEndpoint::with_base_url(Relay::AllOrigins, "http://127.0.0.1:9"),
            RelayEndpoint::with_base_url(Relay::CorsProxy, relays.fallback.uri()),
        ],
        TIMEOUT,
        "pagegrab-tests",
    )?;

    let page = fetcher
        .fetch(TARGET_URL, None, &CancellationToken::new())
        .await?;
    assert_eq!(page.used_relay, Relay::CorsProxy);
    Ok(())
}
