use super::exchange;
use crate::errors::Result;
use crate::http::{HttpClient, WireRequest};
use crate::payload::to_wire_payload;
use crate::request::PushRequest;
use crate::response::PushResponse;
use url::Url;

/// Percent-encode a path segment the way `encodeURIComponent` does.
///
/// Bark servers accept either form, but `!'()*` are left readable to keep
/// URLs identical to other Bark clients.
fn encode_component(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

/// Build the path-and-query GET for an unencrypted v1 push.
///
/// Title and body become path segments; every other wire field goes into
/// the query string.
pub fn build_plain_request(request: &PushRequest) -> Result<WireRequest> {
    let payload = to_wire_payload(request);

    let body = encode_component(&request.message);
    let path = match request.title.as_deref().filter(|t| !t.is_empty()) {
        Some(title) => format!("{}/{}", encode_component(title), body),
        None => body,
    };
    let mut url = Url::parse(&format!("{}{}", request.api_url, path))?;

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(payload.query_pairs(&["title", "body"]))
        .finish();
    if !query.is_empty() {
        url.set_query(Some(&query));
    }

    Ok(WireRequest::get(url).with_authorization(request.authorization.as_ref()))
}

pub async fn send_plain_push(
    client: &dyn HttpClient,
    request: &PushRequest,
) -> Result<PushResponse> {
    let wire = build_plain_request(request)?;
    tracing::debug!(id = %request.id, host = %wire.host(), "Sending plain v1 push");
    exchange(client, wire).await
}
