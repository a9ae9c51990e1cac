use crate::errors::{PushError, Result};
use crate::http::{HttpClient, HttpResponse, WireRequest};
use async_trait::async_trait;
use http::StatusCode;
use std::sync::Mutex;

pub const OK_BODY: &str = r#"{"code":200,"message":"success","timestamp":1}"#;

enum Reply {
    Status(StatusCode, String),
    Fail,
}

/// Records every request and answers from canned replies matched by URL prefix.
///
/// Requests with no matching rule get a 200 `OK_BODY` reply.
pub struct MockClient {
    rules: Vec<(String, Reply)>,
    requests: Mutex<Vec<WireRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, url_prefix: &str, status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.rules
            .push((url_prefix.to_string(), Reply::Status(status, body.to_string())));
        self
    }

    pub fn fail(mut self, url_prefix: &str) -> Self {
        self.rules.push((url_prefix.to_string(), Reply::Fail));
        self
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn execute(&self, request: WireRequest) -> Result<HttpResponse> {
        let url = request.url.to_string();
        let host = request.host();
        self.requests.lock().unwrap().push(request);

        match self.rules.iter().find(|(prefix, _)| url.starts_with(prefix)) {
            Some((_, Reply::Status(status, body))) => Ok(HttpResponse {
                status: *status,
                body: body.clone().into_bytes(),
            }),
            Some((_, Reply::Fail)) => Err(PushError::RequestFailed(
                host,
                "connection refused".to_string(),
            )),
            None => Ok(HttpResponse {
                status: StatusCode::OK,
                body: OK_BODY.as_bytes().to_vec(),
            }),
        }
    }
}
