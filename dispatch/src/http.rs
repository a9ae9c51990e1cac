//! HTTP exchange seam.
//!
//! Transports describe the request they want as a [`WireRequest`] and hand
//! it to an [`HttpClient`]. The production client is backed by `reqwest`.

use crate::errors::{PushError, Result};
use crate::request::BasicAuth;
use async_trait::async_trait;
use http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue, PRAGMA};
use http::{Method, StatusCode};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Timeout applied to each exchange unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body as the transports build it.
#[derive(Clone, Debug, PartialEq)]
pub enum WireBody {
    Empty,
    Form(Vec<(String, String)>),
    Json(String),
}

/// A fully built outbound request.
#[derive(Clone, Debug)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: WireBody,
}

impl WireRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: WireBody::Empty,
        }
    }

    pub fn post_form(url: Url, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: WireBody::Form(fields),
        }
    }

    pub fn post_json(url: Url, json: String) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: WireBody::Json(json),
        }
    }

    /// Attach basic authorization, if any.
    pub fn with_authorization(mut self, auth: Option<&BasicAuth>) -> Self {
        if let Some(auth) = auth {
            // Header values that are not visible ASCII are dropped
            if let Ok(value) = HeaderValue::from_str(&auth.header_value()) {
                self.headers.insert(AUTHORIZATION, value);
            } else {
                tracing::warn!(url = %self.url, "Ignoring malformed authorization header");
            }
        }
        self
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self.body {
            WireBody::Empty => None,
            WireBody::Form(_) => Some(FORM_CONTENT_TYPE),
            WireBody::Json(_) => Some(JSON_CONTENT_TYPE),
        }
    }

    /// Encoded body bytes.
    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            WireBody::Empty => Vec::new(),
            WireBody::Form(fields) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish()
                .into_bytes(),
            WireBody::Json(json) => json.clone().into_bytes(),
        }
    }

    /// Host used to identify the upstream in errors and logs.
    pub fn host(&self) -> String {
        self.url
            .host_str()
            .map(String::from)
            .unwrap_or_else(|| self.url.to_string())
    }
}

/// Raw upstream response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Executes wire requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: WireRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed client with a per-exchange timeout and caching disabled.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    /// The timeout covers connecting, sending and reading the whole body.
    async fn execute(&self, request: WireRequest) -> Result<HttpResponse> {
        let host = request.host();

        let mut headers = request.headers.clone();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        if let Some(content_type) = request.content_type() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if request.body != WireBody::Empty {
            builder = builder.body(request.body_bytes());
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(HttpResponse {
                status,
                body: body.to_vec(),
            })
        };

        timeout(self.timeout, exchange)
            .await
            // Elapsed deadline
            .map_err(|_| PushError::Timeout(host.clone()))?
            // Connection failures, DNS errors, broken bodies
            .map_err(|e| PushError::RequestFailed(host, e.to_string()))
    }
}
