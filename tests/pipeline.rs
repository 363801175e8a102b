mod common;

use httpmock::Method::GET;
use morningstar_rs::partition::{self, PartitionConfig, PartitionPlan, Probe};
use morningstar_rs::{
    CredentialKind, Endpoint, MsError, RequestBatch, RequestDescriptor, run_endpoint,
};
use serde_json::{Value, json};
use url::Url;

fn screener_page(server: &httpmock::MockServer, page: &str, body: Value) {
    server.mock(|when, then| {
        when.method(GET)
            .path("/v1/screener")
            .query_param("page", page)
            .header("apikey", common::API_KEY);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(body);
    });
}

/// The full probe-plan-fan-out-merge cycle against a three-page screen.
#[tokio::test]
async fn paginated_screen_merges_all_pages_in_order() {
    let server = common::setup_server();
    common::mock_bundle(&server);

    screener_page(
        &server,
        "1",
        json!({"total": 1200, "pages": 3, "results": [{"name": "r1"}, {"name": "r2"}]}),
    );
    screener_page(&server, "2", json!({"results": [{"name": "r3"}, {"name": "r4"}]}));
    screener_page(&server, "3", json!({"results": [{"name": "r5"}]}));

    let client = common::client_for(&server);
    let headers = client
        .headers_for(CredentialKind::ApiKey, None)
        .await
        .unwrap();

    let base = RequestDescriptor::new(
        Url::parse(&format!("{}/v1/screener", server.base_url())).unwrap(),
    )
    .param("page", "1");

    // Probe first, then plan the rest.
    let cfg = PartitionConfig::default();
    let first_page = client.fetch_one(&base, &headers).await.unwrap();
    let probe = Probe::from_response(&first_page, &cfg);
    assert_eq!(probe.total_pages, 3);

    let plan = partition::page_plan(&probe, &base, &cfg);
    let PartitionPlan::Pages { requests, truncated } = plan else {
        panic!("expected a Pages plan");
    };
    assert!(!truncated);

    let batch: RequestBatch = requests.into();
    let outcomes = client.fetch_batch(&batch, &headers).await;

    let mut pages = vec![first_page];
    pages.extend(outcomes.into_iter().map(Result::unwrap));

    let rows = partition::merge_pages(&pages);
    let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["r1", "r2", "r3", "r4", "r5"]);
}

fn shape_results(value: &Value) -> Vec<String> {
    value
        .get("results")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|r| r.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

struct PageRange {
    base: Url,
    pages: u32,
}

fn validate_pages(p: &PageRange) -> Result<(), MsError> {
    if p.pages == 0 {
        return Err(MsError::Data("at least one page required".into()));
    }
    Ok(())
}

fn build_pages(p: &PageRange) -> Result<RequestBatch, MsError> {
    Ok(RequestBatch::fan_out_params(
        &p.base,
        (1..=p.pages)
            .map(|page| vec![("page".to_string(), page.to_string())])
            .collect(),
    ))
}

/// Endpoint-as-a-record: validate, build, shape, with partial failure
/// tolerated per request.
#[tokio::test]
async fn run_endpoint_returns_partial_rows_when_one_page_fails() {
    let server = common::setup_server();
    common::mock_bundle(&server);

    screener_page(&server, "1", json!({"results": [{"name": "r1"}]}));
    // page 2 has no mock: the server answers 404 and the pipeline drops it.
    screener_page(&server, "3", json!({"results": [{"name": "r3"}]}));

    let endpoint = Endpoint::<PageRange, String> {
        auth: CredentialKind::ApiKey,
        validate: validate_pages,
        build: build_pages,
        shape: shape_results,
    };

    let client = common::client_for(&server);
    let params = PageRange {
        base: Url::parse(&format!("{}/v1/screener", server.base_url())).unwrap(),
        pages: 3,
    };

    let rows = run_endpoint(&client, &endpoint, &params).await.unwrap();
    assert_eq!(rows, vec!["r1", "r3"]);
}

#[tokio::test]
async fn run_endpoint_rejects_bad_params_before_fetching() {
    let server = common::setup_server();
    let bundle = common::mock_bundle(&server);

    let endpoint = Endpoint::<PageRange, String> {
        auth: CredentialKind::ApiKey,
        validate: validate_pages,
        build: build_pages,
        shape: shape_results,
    };

    let client = common::client_for(&server);
    let params = PageRange {
        base: Url::parse(&format!("{}/v1/screener", server.base_url())).unwrap(),
        pages: 0,
    };

    let err = run_endpoint(&client, &endpoint, &params).await.unwrap_err();
    assert!(matches!(err, MsError::Data(_)));
    // Validation failed, so neither auth nor data requests went out.
    bundle.assert_hits(0);
}

#[tokio::test]
async fn run_endpoint_aborts_when_credentials_are_unavailable() {
    let server = common::setup_server();
    server.mock(|when, then| {
        when.method(GET).path(common::BUNDLE_PATH);
        then.status(500);
    });

    let endpoint = Endpoint::<PageRange, String> {
        auth: CredentialKind::ApiKey,
        validate: validate_pages,
        build: build_pages,
        shape: shape_results,
    };

    let client = common::client_for(&server);
    let params = PageRange {
        base: Url::parse(&format!("{}/v1/screener", server.base_url())).unwrap(),
        pages: 1,
    };

    let err = run_endpoint(&client, &endpoint, &params).await.unwrap_err();
    assert!(matches!(
        err,
        MsError::CredentialNotFound(CredentialKind::ApiKey)
    ));
}
