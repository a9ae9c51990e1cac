//! Normalized push responses and multi-server aggregation.

use crate::errors::{PushError, Result};
use crate::id::now_millis;
use serde::{Deserialize, Serialize};

/// Response shape shared by every Bark-compatible server.
///
/// # Example
/// ```json
/// {"code": 200, "message": "success", "timestamp": 1700000000}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl PushResponse {
    /// The only code callers treat as success.
    pub const SUCCESS: i64 = 200;

    /// Synthetic code recorded when the request never produced a response.
    pub const TRANSPORT_FAILURE: i64 = -1;

    /// Code reported when at least one server group failed.
    pub const BATCH_FAILURE: i64 = 400;

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }

    /// Stand-in response for a dispatch that failed with `error`.
    pub fn from_error(error: &PushError) -> Self {
        Self {
            code: Self::TRANSPORT_FAILURE,
            message: error.to_string(),
            timestamp: now_secs(),
        }
    }

    pub(crate) fn from_body(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| PushError::InvalidResponse(e.to_string()))
    }
}

pub(crate) fn now_secs() -> i64 {
    (now_millis() / 1000) as i64
}

/// Result of one per-server request in a v2 batch.
#[derive(Debug)]
pub struct GroupOutcome {
    pub server: String,
    pub result: Result<PushResponse>,
}

/// Join the outcomes of every server group into one response.
///
/// The code is 200 only if every group answered 200; otherwise it is
/// [`PushResponse::BATCH_FAILURE`]. Group messages (or error texts for
/// groups whose request failed) are joined with `"; "` in group order.
pub fn aggregate_group_responses(outcomes: &[GroupOutcome]) -> PushResponse {
    let all_succeeded = !outcomes.is_empty()
        && outcomes
            .iter()
            .all(|o| matches!(&o.result, Ok(r) if r.is_success()));

    let message = outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(response) => response.message.clone(),
            Err(e) => e.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ");

    let timestamp = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().map(|r| r.timestamp))
        .max()
        .unwrap_or_else(now_secs);

    PushResponse {
        code: if all_succeeded {
            PushResponse::SUCCESS
        } else {
            PushResponse::BATCH_FAILURE
        },
        message,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(server: &str, code: i64, message: &str, timestamp: i64) -> GroupOutcome {
        GroupOutcome {
            server: server.to_string(),
            result: Ok(PushResponse {
                code,
                message: message.to_string(),
                timestamp,
            }),
        }
    }

    #[test]
    fn test_parse_response() {
        let response =
            PushResponse::from_body(br#"{"code":200,"message":"success","timestamp":17}"#)
                .unwrap();
        assert!(response.is_success());
        assert_eq!(response.timestamp, 17);

        let sparse = PushResponse::from_body(br#"{"code":400}"#).unwrap();
        assert_eq!(sparse.message, "");
        assert!(!sparse.is_success());

        assert!(matches!(
            PushResponse::from_body(b"<html>").unwrap_err(),
            PushError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_all_groups_succeed() {
        let outcomes = vec![ok("a", 200, "success", 10), ok("b", 200, "success", 12)];
        let merged = aggregate_group_responses(&outcomes);
        assert_eq!(merged.code, 200);
        assert_eq!(merged.message, "success; success");
        assert_eq!(merged.timestamp, 12);
    }

    #[test]
    fn test_partial_failure() {
        let outcomes = vec![
            ok("a", 200, "success", 10),
            ok("b", 500, "device token invalid", 11),
        ];
        let merged = aggregate_group_responses(&outcomes);
        assert_ne!(merged.code, 200);
        assert!(merged.message.contains("success"));
        assert!(merged.message.contains("device token invalid"));
    }

    #[test]
    fn test_failed_request_counts_as_failed_group() {
        let outcomes = vec![
            ok("a", 200, "success", 10),
            GroupOutcome {
                server: "b".to_string(),
                result: Err(PushError::HttpStatus(502)),
            },
        ];
        let merged = aggregate_group_responses(&outcomes);
        assert_eq!(merged.code, PushResponse::BATCH_FAILURE);
        assert_eq!(merged.message, "success; HTTP error! status: 502");
    }

    #[test]
    fn test_no_groups_is_failure() {
        assert_eq!(aggregate_group_responses(&[]).code, PushResponse::BATCH_FAILURE);
    }

    #[test]
    fn test_from_error() {
        let response = PushResponse::from_error(&PushError::Timeout("x.test".into()));
        assert_eq!(response.code, -1);
        assert_eq!(response.message, "Request to x.test timed out");
    }
}
