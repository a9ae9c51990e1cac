use super::exchange;
use crate::crypto::{EncryptionConfig, encrypt, generate_iv};
use crate::errors::{PushError, Result};
use crate::http::{HttpClient, WireRequest};
use crate::payload::to_wire_payload;
use crate::request::PushRequest;
use crate::response::PushResponse;

/// Build the form POST for an encrypted v1 push.
///
/// The whole wire payload is encrypted; only `iv`, `ciphertext` and the
/// plaintext `id` (for server-side recall) are sent.
pub fn build_encrypted_request(request: &PushRequest, key: &str, iv: &str) -> Result<WireRequest> {
    let plaintext = to_wire_payload(request).to_json()?;
    let ciphertext = encrypt(&plaintext, key, iv)?;

    let fields = vec![
        ("iv".to_string(), iv.to_string()),
        ("ciphertext".to_string(), ciphertext),
        ("id".to_string(), request.id.clone()),
    ];

    Ok(WireRequest::post_form(request.api_url.clone(), fields)
        .with_authorization(request.authorization.as_ref()))
}

/// Encrypt and send a v1 push under a fresh IV.
///
/// Fails before any I/O when `encryption` has no key.
pub async fn send_encrypted_push(
    client: &dyn HttpClient,
    request: &PushRequest,
    encryption: &EncryptionConfig,
) -> Result<PushResponse> {
    let key = encryption.key().ok_or(PushError::MissingEncryptionKey)?;
    let iv = generate_iv();

    let wire = build_encrypted_request(request, key, &iv)?;
    tracing::debug!(id = %request.id, host = %wire.host(), "Sending encrypted v1 push");
    exchange(client, wire).await
}
