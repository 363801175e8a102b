mod common;

use std::time::{Duration, Instant};

use httpmock::Method::GET;
use morningstar_rs::core::client::{Backoff, RetryConfig};
use morningstar_rs::{FailureKind, MsError, RequestBatch, RequestDescriptor};
use reqwest::header::HeaderMap;
use url::Url;

fn descriptor(server: &httpmock::MockServer, path: &str) -> RequestDescriptor {
    RequestDescriptor::new(Url::parse(&format!("{}{}", server.base_url(), path)).unwrap())
}

#[test]
fn set_param_replaces_every_entry_for_the_key() {
    let d = RequestDescriptor::new(Url::parse("https://api.example.com/v1/screener").unwrap())
        .param("page", "1")
        .param("page", "1")
        .set_param("page", "7");
    assert_eq!(d.params.iter().filter(|(k, _)| k == "page").count(), 1);
    assert_eq!(d.get_param("page"), Some("7"));
}

#[test]
fn full_url_appends_pairs_in_order() {
    let d = RequestDescriptor::new(Url::parse("https://api.example.com/v1/screener").unwrap())
        .param("q", "a b")
        .param("page", "2");
    assert_eq!(
        d.full_url().as_str(),
        "https://api.example.com/v1/screener?q=a+b&page=2"
    );
}

#[test]
fn batch_normalization_shapes() {
    let url = Url::parse("https://api.example.com/v1/screener").unwrap();

    // One URL, many param sets.
    let by_params = RequestBatch::fan_out_params(
        &url,
        vec![
            vec![("page".into(), "1".into())],
            vec![("page".into(), "2".into())],
        ],
    );
    let pages: Vec<_> = by_params
        .iter()
        .map(|d| d.get_param("page").unwrap())
        .collect();
    assert_eq!(pages, vec!["1", "2"]);

    // Many URLs, one shared param set.
    let by_urls = RequestBatch::fan_out_urls(
        vec![
            Url::parse("https://api.example.com/sec/0P0001").unwrap(),
            Url::parse("https://api.example.com/sec/0P0002").unwrap(),
        ],
        vec![("currency".into(), "EUR".into())],
    );
    assert_eq!(by_urls.len(), 2);
    assert!(by_urls.iter().all(|d| d.get_param("currency") == Some("EUR")));

    // The 1:1 case.
    assert_eq!(RequestBatch::single(RequestDescriptor::new(url)).len(), 1);
}

#[tokio::test]
async fn batch_preserves_submission_order_despite_completion_order() {
    let server = common::setup_server();
    // The first request is the slowest; a completion-ordered collect would
    // return it last.
    server.mock(|when, then| {
        when.method(GET).path("/a");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id": "a"}"#)
            .delay(Duration::from_millis(120));
    });
    server.mock(|when, then| {
        when.method(GET).path("/b");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id": "b"}"#)
            .delay(Duration::from_millis(40));
    });
    server.mock(|when, then| {
        when.method(GET).path("/c");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id": "c"}"#);
    });

    let client = common::builder_for(&server).max_in_flight(3).build().unwrap();
    let batch: RequestBatch = vec![
        descriptor(&server, "/a"),
        descriptor(&server, "/b"),
        descriptor(&server, "/c"),
    ]
    .into();

    let outcomes = client.fetch_batch(&batch, &HeaderMap::new()).await;

    assert_eq!(outcomes.len(), batch.len());
    let ids: Vec<_> = outcomes
        .iter()
        .map(|o| o.as_ref().unwrap()["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn one_failed_request_does_not_sink_the_batch() {
    let server = common::setup_server();
    server.mock(|when, then| {
        when.method(GET).path("/ok");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"rows": 3}"#);
    });
    server.mock(|when, then| {
        when.method(GET).path("/gone");
        then.status(404).body("not found");
    });

    let client = common::client_for(&server);
    let batch: RequestBatch = vec![
        descriptor(&server, "/ok"),
        descriptor(&server, "/gone"),
        descriptor(&server, "/ok"),
    ]
    .into();

    let outcomes = client.fetch_batch(&batch, &HeaderMap::new()).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_ok());
    assert!(outcomes[2].is_ok());
    let failure = outcomes[1].as_ref().unwrap_err();
    assert_eq!(failure.kind, FailureKind::Status(404));
}

#[tokio::test]
async fn retries_are_exhausted_then_the_status_error_surfaces() {
    let server = common::setup_server();
    let flaky = server.mock(|when, then| {
        when.method(GET).path("/flaky");
        then.status(503).body("unavailable");
    });

    let max_retries = 3;
    let client = common::builder_for(&server)
        .retry_config(common::fast_retry(max_retries))
        .build()
        .unwrap();

    let err = client
        .fetch_one(&descriptor(&server, "/flaky"), &HeaderMap::new())
        .await
        .unwrap_err();

    flaky.assert_hits((1 + max_retries) as usize);
    match err {
        MsError::Status { status, .. } => assert_eq!(status, 503),
        other => panic!("expected a Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn a_request_that_recovers_mid_retry_returns_the_success_body() {
    // httpmock cannot vary a response across hits, so run a one-shot server
    // by hand: first connection gets a 503, the second gets the JSON.
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let responses = [
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 16\r\nconnection: close\r\n\r\n{\"recovered\": 1}",
        ];
        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    });

    let backoff = Duration::from_millis(50);
    let client = morningstar_rs::MsClient::builder()
        .retry_config(RetryConfig {
            max_retries: 1,
            backoff: Backoff::Fixed(backoff),
            ..RetryConfig::default()
        })
        .build()
        .unwrap();

    let desc = RequestDescriptor::new(Url::parse(&format!("http://{addr}/series")).unwrap());
    let started = Instant::now();
    let value = client.fetch_one(&desc, &HeaderMap::new()).await.unwrap();

    assert_eq!(value["recovered"], 1);
    // One backoff wait must have elapsed between the two attempts.
    assert!(started.elapsed() >= backoff);
}

#[tokio::test]
async fn batch_output_always_matches_input_length() {
    let server = common::setup_server();
    server.mock(|when, then| {
        when.method(GET).path("/boom");
        then.status(500);
    });

    let client = common::client_for(&server);
    let batch: RequestBatch = (0..5)
        .map(|i| descriptor(&server, "/boom").param("i", i.to_string()))
        .collect::<Vec<_>>()
        .into();

    let outcomes = client.fetch_batch(&batch, &HeaderMap::new()).await;
    assert_eq!(outcomes.len(), 5);
    assert!(outcomes.iter().all(Result::is_err));
}
