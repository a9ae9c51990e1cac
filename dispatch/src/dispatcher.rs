//! Push dispatcher: the single place a transport strategy is chosen.

use crate::config::Settings;
use crate::crypto::{EncryptionConfig, Mode};
use crate::errors::Result;
use crate::http::{HttpClient, ReqwestClient};
use crate::metrics_defs::{PUSH_DISPATCHED, PUSH_DURATION, PUSH_FAILED};
use crate::params::{RequestParameter, get_request_parameters};
use crate::request::{ApiVersion, PushRequest};
use crate::response::PushResponse;
use crate::transport::{Strategy, send_api_v2_push, send_encrypted_push, send_plain_push};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// A dispatch ready for the history store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PushRecord {
    pub id: String,
    pub response: PushResponse,
    pub parameters: Vec<RequestParameter>,
    pub encrypted: bool,
}

/// Choose the wire strategy for a dispatch.
///
/// v2 handles its own encryption; otherwise a configured key selects
/// encrypted v1 and everything else goes out as plain v1.
pub fn select_strategy(
    api_version: ApiVersion,
    encryption: Option<&EncryptionConfig>,
) -> Strategy {
    if api_version == ApiVersion::V2 {
        Strategy::V2
    } else if encryption.and_then(EncryptionConfig::key).is_some() {
        Strategy::EncryptedV1
    } else {
        Strategy::PlainV1
    }
}

fn is_encrypted(strategy: Strategy, encryption: Option<&EncryptionConfig>) -> bool {
    match strategy {
        Strategy::PlainV1 => false,
        Strategy::EncryptedV1 => true,
        Strategy::V2 => encryption.and_then(EncryptionConfig::key).is_some(),
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn HttpClient>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Dispatcher over a `reqwest` client using the settings' timeout.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Arc::new(ReqwestClient::new(settings.timeout())))
    }

    /// Send `request` with the strategy chosen by [`select_strategy`].
    ///
    /// Errors are returned unmodified and never retried.
    pub async fn send_push(
        &self,
        request: &PushRequest,
        encryption: Option<&EncryptionConfig>,
        api_version: ApiVersion,
    ) -> Result<PushResponse> {
        let strategy = select_strategy(api_version, encryption);
        if is_encrypted(strategy, encryption) && encryption.is_some_and(|e| e.mode == Mode::Gcm) {
            tracing::warn!(id = %request.id, "GCM mode requested, encrypting with CBC");
        }

        tracing::debug!(
            id = %request.id,
            strategy = strategy.as_str(),
            devices = request.devices.len(),
            "Dispatching push"
        );
        crate::counter!(PUSH_DISPATCHED, "strategy" => strategy.as_str()).increment(1);
        let start = Instant::now();

        let result = match strategy {
            Strategy::V2 => send_api_v2_push(self.client.clone(), request, encryption).await,
            Strategy::EncryptedV1 => {
                let keyless = EncryptionConfig::default();
                let encryption = encryption.unwrap_or(&keyless);
                send_encrypted_push(self.client.as_ref(), request, encryption).await
            }
            Strategy::PlainV1 => send_plain_push(self.client.as_ref(), request).await,
        };

        crate::histogram!(PUSH_DURATION, "strategy" => strategy.as_str())
            .record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            tracing::info!(
                id = %request.id,
                strategy = strategy.as_str(),
                error = %e,
                "Push dispatch failed"
            );
            crate::counter!(
                PUSH_FAILED,
                "strategy" => strategy.as_str(),
                "kind" => e.kind().as_str()
            )
            .increment(1);
        }

        result
    }

    /// Send and package the outcome for the history store.
    ///
    /// A failed dispatch is recorded as a response with code `-1` carrying
    /// the error text.
    pub async fn send_and_record(
        &self,
        request: &PushRequest,
        encryption: Option<&EncryptionConfig>,
        api_version: ApiVersion,
    ) -> PushRecord {
        let strategy = select_strategy(api_version, encryption);
        let encrypted = is_encrypted(strategy, encryption);

        let response = match self.send_push(request, encryption, api_version).await {
            Ok(response) => response,
            Err(e) => PushResponse::from_error(&e),
        };

        PushRecord {
            id: request.id.clone(),
            response,
            parameters: get_request_parameters(request, encrypted),
            encrypted,
        }
    }
}
