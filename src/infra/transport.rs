//! HTTP transport seam.
//!
//! The orchestrator only needs `send(request) -> response`; the default
//! implementation is backed by `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Method};
use url::Url;

use super::error::InfraError;

/// An outgoing API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Full URL including the query string, as it goes over the wire.
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            url.set_query(None);
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

/// A response of any status; non-2xx statuses are not transport errors.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, InfraError> {
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn user_agent() -> &'static str {
        concat!("contentlink/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, InfraError> {
        let url = request.full_url();
        let mut builder = self.client.request(request.method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    #[test]
    fn full_url_appends_query_pairs() {
        let url = Url::parse("https://cdn.example.com/spaces/abc/entries").expect("url");
        let request = ApiRequest::get(url)
            .query_pair("content_type", "cat")
            .query_pair("fields.name[in]", "a,b");
        assert_eq!(
            request.full_url().as_str(),
            "https://cdn.example.com/spaces/abc/entries?content_type=cat&fields.name%5Bin%5D=a%2Cb"
        );
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut response = ApiResponse::new(429, "");
        response
            .headers
            .push(("X-RateLimit-Reset".to_string(), "1".to_string()));
        assert_eq!(response.header("x-ratelimit-reset"), Some("1"));
        assert!(response.is_rate_limited());
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn reqwest_transport_sends_headers_and_query() -> Result<(), InfraError> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/spaces/abc/entries")
                .query_param("limit", "5")
                .header("authorization", "Bearer token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"sys":{"type":"Array"},"items":[]}"#);
        });

        let transport = ReqwestTransport::new()?;
        let url = Url::parse(&server.url("/spaces/abc/entries")).expect("mock url");
        let request = ApiRequest::get(url)
            .header("Authorization", "Bearer token")
            .query_pair("limit", "5");
        let response = transport.send(request).await?;

        mock.assert();
        assert!(response.is_success());
        assert!(response.body.contains("Array"));
        Ok(())
    }
}
