#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use httpmock::{Method::GET, Mock, MockServer};
use morningstar_rs::core::client::{Backoff, RetryConfig};
use morningstar_rs::{MsClient, MsClientBuilder, MsError, TokenHarvester};
use url::Url;

pub const BUNDLE_PATH: &str = "/assets/quotes/sal-components.umd.min.js";
pub const MAAS_PATH: &str = "/api/v2/stores/maas/token";

pub const API_KEY: &str = "test-apigee-key";
pub const RT_TOKEN: &str = "test-realtime-token";
pub const MAAS_TOKEN: &str = "test-maas-token";

pub fn setup_server() -> MockServer {
    MockServer::start()
}

/// Millisecond-scale fixed backoff so retry tests stay fast.
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        backoff: Backoff::Fixed(Duration::from_millis(1)),
        ..RetryConfig::default()
    }
}

pub fn builder_for(server: &MockServer) -> MsClientBuilder {
    MsClient::builder()
        .bundle_url(Url::parse(&format!("{}{}", server.base_url(), BUNDLE_PATH)).unwrap())
        .maas_token_url(Url::parse(&format!("{}{}", server.base_url(), MAAS_PATH)).unwrap())
        .retry_config(fast_retry(0))
}

pub fn client_for(server: &MockServer) -> MsClient {
    builder_for(server).build().unwrap()
}

/// Serves a bundle body carrying both scrapeable tokens.
pub fn mock_bundle(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path(BUNDLE_PATH);
        then.status(200).body(format!(
            r#"!function(){{var e={{keyApigee:"{API_KEY}",tokenRealtime:"{RT_TOKEN}"}};}}();"#
        ));
    })
}

pub fn mock_maas(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path(MAAS_PATH);
        then.status(200).body(format!("{MAAS_TOKEN}\n"));
    })
}

/// In-memory stand-in for the browser cookie harvest.
pub struct FakeHarvester {
    pub cookies: HashMap<String, String>,
}

impl FakeHarvester {
    pub fn with_waf_token(token: &str) -> Self {
        let mut cookies = HashMap::new();
        cookies.insert("session_id".to_string(), "irrelevant".to_string());
        cookies.insert("aws-waf-token".to_string(), token.to_string());
        Self { cookies }
    }
}

#[async_trait::async_trait]
impl TokenHarvester for FakeHarvester {
    async fn harvest(&self, _url: &str) -> Result<HashMap<String, String>, MsError> {
        Ok(self.cookies.clone())
    }
}

/// Like [`FakeHarvester`], but also records every URL it was told to visit.
pub struct RecordingHarvester {
    pub cookies: HashMap<String, String>,
    pub visited: std::sync::Mutex<Vec<String>>,
}

impl RecordingHarvester {
    pub fn with_waf_token(token: &str) -> Self {
        Self {
            cookies: FakeHarvester::with_waf_token(token).cookies,
            visited: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl TokenHarvester for RecordingHarvester {
    async fn harvest(&self, url: &str) -> Result<HashMap<String, String>, MsError> {
        self.visited.lock().unwrap().push(url.to_string());
        Ok(self.cookies.clone())
    }
}

/// A harvester whose browser session always dies.
pub struct BrokenHarvester;

#[async_trait::async_trait]
impl TokenHarvester for BrokenHarvester {
    async fn harvest(&self, _url: &str) -> Result<HashMap<String, String>, MsError> {
        Err(MsError::Harvest("browser session crashed".into()))
    }
}
