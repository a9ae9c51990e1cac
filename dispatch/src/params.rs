//! Human-readable parameter lists for push history.
//!
//! The list is rebuilt from the logical request rather than the bytes that
//! were sent, so an encrypted push still shows its message fields. Those
//! entries are preceded by redacted `iv` and `ciphertext` markers.

use crate::payload::{DisplayDefault, FIELDS, stringify};
use crate::request::PushRequest;
use serde::{Deserialize, Serialize};

/// Placeholder shown for values that only existed in encrypted form.
pub const REDACTED: &str = "***";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParameter {
    pub key: String,
    pub value: String,
}

impl RequestParameter {
    fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Rebuild the parameter list for `request` in field table order.
///
/// Display defaults apply here even where the wire payload omitted a field:
/// `autoCopy` shows `1` and `copy` shows the message body when unset.
pub fn get_request_parameters(request: &PushRequest, is_encrypted: bool) -> Vec<RequestParameter> {
    let mut params = Vec::with_capacity(FIELDS.len() + 2);

    if is_encrypted {
        params.push(RequestParameter::new("iv", REDACTED));
        params.push(RequestParameter::new("ciphertext", REDACTED));
    }

    for spec in FIELDS {
        let value = spec
            .field
            .value(request)
            .and_then(|v| stringify(&v))
            .or_else(|| match spec.display_default {
                DisplayDefault::None => None,
                DisplayDefault::Literal(value) => Some(value.to_string()),
                DisplayDefault::Body => Some(request.message.clone()),
            });

        if let Some(value) = value {
            params.push(RequestParameter::new(spec.wire_name, value));
        }
    }

    params
}
