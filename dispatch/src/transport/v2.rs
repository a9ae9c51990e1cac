use super::exchange;
use crate::crypto::{EncryptionConfig, encrypt, generate_iv};
use crate::errors::{PushError, Result};
use crate::grouping::group_by_server;
use crate::http::{HttpClient, WireRequest};
use crate::metrics_defs::V2_GROUP_REQUESTS;
use crate::payload::{MessagePayload, to_wire_payload};
use crate::request::{BasicAuth, PushRequest};
use crate::response::{GroupOutcome, PushResponse, aggregate_group_responses};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

/// Fields moved into the ciphertext when a v2 payload is encrypted.
const ENCRYPTED_FIELDS: [&str; 3] = ["body", "title", "subtitle"];

/// Encrypt the message fields of `payload` under a fresh IV.
///
/// The plaintext is the full payload; the transmitted payload keeps every
/// field except body/title/subtitle and gains `ciphertext` and `iv`.
fn encrypt_payload(mut payload: MessagePayload, key: &str) -> Result<MessagePayload> {
    let iv = generate_iv();
    let ciphertext = encrypt(&payload.to_json()?, key, &iv)?;

    for field in ENCRYPTED_FIELDS {
        payload.remove(field);
    }
    payload.insert("ciphertext", ciphertext);
    payload.insert("iv", iv);
    Ok(payload)
}

/// `{base}/push`, tolerating a trailing slash on `base`.
fn push_endpoint(base: &str) -> Result<Url> {
    Ok(Url::parse(&format!("{}/push", base.trim_end_matches('/')))?)
}

/// Who a v2 request is addressed to.
#[derive(Clone, Copy, Debug)]
pub enum Recipients<'a> {
    /// Default endpoint push carrying a singular `device_key`, omitted when unknown.
    Single(Option<&'a str>),
    /// A server group. Always sent as a `device_keys` array, even of one.
    Group(&'a [String]),
}

/// Build one v2 JSON request for `recipients`.
pub fn build_v2_request(
    payload: &MessagePayload,
    endpoint: Url,
    recipients: Recipients<'_>,
    encryption_key: Option<&str>,
    authorization: Option<&BasicAuth>,
) -> Result<WireRequest> {
    let mut payload = match encryption_key {
        Some(key) => encrypt_payload(payload.clone(), key)?,
        None => payload.clone(),
    };

    match recipients {
        Recipients::Single(Some(key)) => payload.insert("device_key", key),
        Recipients::Single(None) => {}
        Recipients::Group(keys) => payload.insert("device_keys", keys.to_vec()),
    }

    Ok(WireRequest::post_json(endpoint, payload.to_json()?).with_authorization(authorization))
}

/// Send a v2 push.
///
/// Without a device list a single request goes to `{origin(api_url)}/push`.
/// With one, devices are grouped by server and every group is sent
/// concurrently; the call returns once all groups have settled.
pub async fn send_api_v2_push(
    client: Arc<dyn HttpClient>,
    request: &PushRequest,
    encryption: Option<&EncryptionConfig>,
) -> Result<PushResponse> {
    let key = encryption.and_then(EncryptionConfig::key);
    let payload = to_wire_payload(request);

    if request.devices.is_empty() {
        let endpoint = push_endpoint(&request.api_url.origin().ascii_serialization())?;
        let device_key = request.device_key();
        let wire = build_v2_request(
            &payload,
            endpoint,
            Recipients::Single(device_key.as_deref()),
            key,
            request.authorization.as_ref(),
        )?;

        tracing::debug!(id = %request.id, host = %wire.host(), "Sending v2 push");
        return exchange(client.as_ref(), wire).await;
    }

    let groups = group_by_server(&request.devices);
    if groups.is_empty() {
        return Err(PushError::NoDeliverableDevices);
    }

    // Encode every group up front so configuration errors surface before any I/O
    let mut wires = Vec::with_capacity(groups.len());
    for (server, devices) in &groups {
        let device_keys: Vec<String> = devices.iter().map(|d| d.device_key.clone()).collect();
        let authorization = devices[0]
            .authorization
            .as_ref()
            .or(request.authorization.as_ref());
        let wire = build_v2_request(
            &payload,
            push_endpoint(server)?,
            Recipients::Group(&device_keys),
            key,
            authorization,
        )?;
        wires.push((server.clone(), wire));
    }

    if wires.len() == 1 {
        let (server, wire) = wires.remove(0);
        tracing::debug!(id = %request.id, server = %server, "Sending v2 push");
        crate::counter!(V2_GROUP_REQUESTS).increment(1);
        return exchange(client.as_ref(), wire).await;
    }

    let outcomes = send_groups(client, wires).await;
    let response = aggregate_group_responses(&outcomes);
    if !response.is_success() {
        tracing::warn!(
            id = %request.id,
            message = %response.message,
            "Multi-server v2 push partially failed"
        );
    }
    Ok(response)
}

/// Fan out one request per server group and wait for all of them.
///
/// Outcomes are returned in group order regardless of completion order.
async fn send_groups(
    client: Arc<dyn HttpClient>,
    wires: Vec<(String, WireRequest)>,
) -> Vec<GroupOutcome> {
    let mut join_set = JoinSet::new();
    let mut task_groups: HashMap<tokio::task::Id, (usize, String)> = HashMap::new();

    for (index, (server, wire)) in wires.into_iter().enumerate() {
        let client = client.clone();
        tracing::debug!(server = %server, "Sending v2 push group");
        crate::counter!(V2_GROUP_REQUESTS).increment(1);

        let handle = join_set.spawn(async move { exchange(client.as_ref(), wire).await });
        task_groups.insert(handle.id(), (index, server));
    }

    let mut slots: Vec<Option<GroupOutcome>> = (0..task_groups.len()).map(|_| None).collect();

    while let Some(joined) = join_set.join_next_with_id().await {
        let (task_id, result) = match joined {
            Ok((task_id, result)) => (task_id, result),
            Err(e) => {
                tracing::error!("Task panicked: {}", e);
                let task_id = e.id();
                let server = task_groups
                    .get(&task_id)
                    .map(|(_, s)| s.clone())
                    .unwrap_or_default();
                (task_id, Err(PushError::RequestFailed(server, e.to_string())))
            }
        };

        let Some((index, server)) = task_groups.get(&task_id).cloned() else {
            continue;
        };
        if let Err(e) = &result {
            tracing::warn!(server = %server, error = %e, "v2 push group failed");
        }
        slots[index] = Some(GroupOutcome { server, result });
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Algorithm, decrypt};
    use crate::http::{JSON_CONTENT_TYPE, WireBody};
    use crate::request::Device;
    use crate::http::HttpResponse;
    use crate::testutils::MockClient;
    use async_trait::async_trait;
    use http::header::AUTHORIZATION;
    use serde_json::Value as JsonValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    const KEY: &str = "0123456789abcdef";

    fn device(server: &str, key: &str, auth: Option<BasicAuth>) -> Device {
        Device {
            api_url: Url::parse(&format!("{server}/{key}/")).unwrap(),
            server: Some(server.to_string()),
            device_key: key.to_string(),
            authorization: auth,
        }
    }

    fn request() -> PushRequest {
        PushRequest::new("hello", Url::parse("https://x.test/KEY123/").unwrap())
            .with_id("ID1")
            .with_title("T")
    }

    fn json(wire: &WireRequest) -> JsonValue {
        match &wire.body {
            WireBody::Json(body) => serde_json::from_str(body).unwrap(),
            other => panic!("expected json body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_request_without_devices() {
        let mock = Arc::new(MockClient::new());
        let response = send_api_v2_push(mock.clone(), &request(), None)
            .await
            .unwrap();
        assert!(response.is_success());

        let sent = mock.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url.as_str(), "https://x.test/push");
        assert_eq!(sent[0].content_type(), Some(JSON_CONTENT_TYPE));

        let body = json(&sent[0]);
        assert_eq!(body["device_key"], "KEY123");
        assert_eq!(body["body"], "hello");
        assert_eq!(body["title"], "T");
        assert_eq!(body["id"], "ID1");
        assert!(body.get("device_keys").is_none());
    }

    #[tokio::test]
    async fn test_groups_by_server() {
        let mock = Arc::new(MockClient::new());
        let request = request().with_devices(vec![
            device("https://a.test", "a1", Some(BasicAuth::new("a", "a"))),
            device("https://b.test", "b1", None),
            device("https://a.test", "a2", None),
        ]);

        let response = send_api_v2_push(mock.clone(), &request, None)
            .await
            .unwrap();
        assert_eq!(response.code, 200);
        assert_eq!(response.message, "success; success");

        let mut sent = mock.requests();
        sent.sort_by_key(|w| w.url.to_string());
        assert_eq!(sent.len(), 2);

        assert_eq!(sent[0].url.as_str(), "https://a.test/push");
        assert_eq!(
            json(&sent[0])["device_keys"],
            serde_json::json!(["a1", "a2"])
        );
        assert_eq!(sent[0].headers[AUTHORIZATION], "Basic YTph");

        assert_eq!(sent[1].url.as_str(), "https://b.test/push");
        assert_eq!(json(&sent[1])["device_keys"], serde_json::json!(["b1"]));
        assert!(json(&sent[1]).get("device_key").is_none());
        assert!(sent[1].headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_single_device_group_sends_key_list() {
        let mock = Arc::new(MockClient::new());
        let request = request().with_devices(vec![device("https://a.test", "a1", None)]);

        send_api_v2_push(mock.clone(), &request, None)
            .await
            .unwrap();

        let sent = mock.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url.as_str(), "https://a.test/push");
        let body = json(&sent[0]);
        assert_eq!(body["device_keys"], serde_json::json!(["a1"]));
        assert!(body.get("device_key").is_none());
    }

    /// Holds every reply until all expected requests are in flight together.
    struct GatedClient {
        gate: Barrier,
        inner: MockClient,
        completed: AtomicUsize,
    }

    #[async_trait]
    impl HttpClient for GatedClient {
        async fn execute(&self, request: WireRequest) -> Result<HttpResponse> {
            self.gate.wait().await;
            if request.url.host_str() == Some("c.test") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let response = self.inner.execute(request).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            response
        }
    }

    #[tokio::test]
    async fn test_groups_sent_concurrently() {
        let client = Arc::new(GatedClient {
            gate: Barrier::new(3),
            inner: MockClient::new().respond(
                "https://c.test/",
                200,
                r#"{"code":200,"message":"slow ok","timestamp":7}"#,
            ),
            completed: AtomicUsize::new(0),
        });
        let request = request().with_devices(vec![
            device("https://a.test", "a1", None),
            device("https://b.test", "b1", None),
            device("https://c.test", "c1", None),
        ]);

        // Every group waits on the barrier, so a sequential send never completes
        let response = tokio::time::timeout(
            Duration::from_secs(5),
            send_api_v2_push(client.clone(), &request, None),
        )
        .await
        .expect("groups were not in flight together")
        .unwrap();

        assert_eq!(client.completed.load(Ordering::SeqCst), 3);
        assert_eq!(response.code, 200);
        assert_eq!(response.message, "success; success; slow ok");
        assert_eq!(response.timestamp, 7);
    }

    #[tokio::test]
    async fn test_group_falls_back_to_ambient_authorization() {
        let mock = Arc::new(MockClient::new());
        let mut request = request().with_devices(vec![device("https://a.test", "a1", None)]);
        request.authorization = Some(BasicAuth::new("u", "p"));

        send_api_v2_push(mock.clone(), &request, None)
            .await
            .unwrap();
        assert_eq!(mock.requests()[0].headers[AUTHORIZATION], "Basic dTpw");
    }

    #[tokio::test]
    async fn test_partial_failure_aggregation() {
        let mock = Arc::new(
            MockClient::new()
                .respond(
                    "https://a.test/",
                    200,
                    r#"{"code":200,"message":"group one ok","timestamp":5}"#,
                )
                .respond(
                    "https://b.test/",
                    200,
                    r#"{"code":500,"message":"group two broke","timestamp":6}"#,
                ),
        );
        let request = request().with_devices(vec![
            device("https://a.test", "a1", None),
            device("https://b.test", "b1", None),
        ]);

        let response = send_api_v2_push(mock, &request, None).await.unwrap();
        assert_ne!(response.code, 200);
        assert_eq!(response.message, "group one ok; group two broke");
    }

    #[tokio::test]
    async fn test_failed_group_does_not_cancel_others() {
        let mock = Arc::new(MockClient::new().fail("https://b.test/"));
        let request = request().with_devices(vec![
            device("https://a.test", "a1", None),
            device("https://b.test", "b1", None),
            device("https://c.test", "c1", None),
        ]);

        let response = send_api_v2_push(mock.clone(), &request, None)
            .await
            .unwrap();
        assert_eq!(response.code, PushResponse::BATCH_FAILURE);
        assert_eq!(
            response.message,
            "success; Request to b.test failed: connection refused; success"
        );
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_all_devices_serverless() {
        let mock = Arc::new(MockClient::new());
        let mut lost = device("https://a.test", "a1", None);
        lost.server = None;
        let request = request().with_devices(vec![lost]);

        let err = send_api_v2_push(mock.clone(), &request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::NoDeliverableDevices));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_encrypted_group_payload() {
        let mock = Arc::new(MockClient::new());
        let mut request = request().with_devices(vec![
            device("https://a.test", "a1", None),
            device("https://b.test", "b1", None),
        ]);
        request.subtitle = Some("S".into());
        request.sound = Some("bell".into());
        let config = EncryptionConfig::new(Algorithm::Aes128, KEY);

        send_api_v2_push(mock.clone(), &request, Some(&config))
            .await
            .unwrap();

        let sent = mock.requests();
        let mut ivs = Vec::new();
        for wire in &sent {
            let body = json(wire);
            for stripped in ["body", "title", "subtitle"] {
                assert!(body.get(stripped).is_none(), "{stripped} sent in clear");
            }
            assert_eq!(body["sound"], "bell");
            assert_eq!(body["id"], "ID1");

            let iv = body["iv"].as_str().unwrap();
            let plaintext = decrypt(body["ciphertext"].as_str().unwrap(), KEY, iv);
            let inner: JsonValue = serde_json::from_str(&plaintext).unwrap();
            assert_eq!(inner["body"], "hello");
            assert_eq!(inner["title"], "T");
            assert_eq!(inner["subtitle"], "S");
            assert!(inner.get("device_key").is_none());
            ivs.push(iv.to_string());
        }
        assert_ne!(ivs[0], ivs[1]);
    }

    #[tokio::test]
    async fn test_single_group_passes_response_through() {
        let mock = Arc::new(MockClient::new().respond(
            "https://a.test/",
            200,
            r#"{"code":400,"message":"failed to get device token","timestamp":9}"#,
        ));
        let request = request().with_devices(vec![device("https://a.test", "a1", None)]);

        let response = send_api_v2_push(mock, &request, None).await.unwrap();
        assert_eq!(response.code, 400);
        assert_eq!(response.message, "failed to get device token");
    }

    #[test]
    fn test_push_endpoint() {
        assert_eq!(
            push_endpoint("https://a.test/").unwrap().as_str(),
            "https://a.test/push"
        );
        assert_eq!(
            push_endpoint("https://a.test:8080").unwrap().as_str(),
            "https://a.test:8080/push"
        );
    }
}
