//! Wire strategies.
//!
//! Each strategy is a one-shot `encode → send → parse` exchange with no
//! retained state and no internal retries.
//!
//! | Strategy      | Request                                                   |
//! |---------------|-----------------------------------------------------------|
//! | Plain v1      | `GET {api_url}[{title}/]{body}?{remaining fields}`        |
//! | Encrypted v1  | `POST {api_url}` form with exactly `iv`, `ciphertext`, `id` |
//! | v2            | `POST {origin}/push` JSON, one request per device server  |

mod encrypted;
mod plain;
mod v2;

pub use encrypted::{build_encrypted_request, send_encrypted_push};
pub use plain::{build_plain_request, send_plain_push};
pub use v2::{Recipients, build_v2_request, send_api_v2_push};

use crate::errors::{PushError, Result};
use crate::http::{HttpClient, WireRequest};
use crate::response::PushResponse;

/// Which wire strategy carries a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    PlainV1,
    EncryptedV1,
    V2,
}

impl Strategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Strategy::PlainV1 => "plain_v1",
            Strategy::EncryptedV1 => "encrypted_v1",
            Strategy::V2 => "v2",
        }
    }
}

/// Send `request` and parse the JSON reply. Non-2xx statuses are errors.
pub(crate) async fn exchange(
    client: &dyn HttpClient,
    request: WireRequest,
) -> Result<PushResponse> {
    let response = client.execute(request).await?;

    if !response.status.is_success() {
        return Err(PushError::HttpStatus(response.status.as_u16()));
    }

    PushResponse::from_body(&response.body)
}
