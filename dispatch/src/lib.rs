//! Bark push dispatch.
//!
//! Turns a [`PushRequest`] into exactly one of three wire strategies and
//! normalizes the outcome into a [`PushResponse`]:
//!
//! - plain v1: query-string `GET` against the device URL
//! - encrypted v1: AES-CBC ciphertext posted as a form
//! - v2: JSON `POST {origin}/push`, batched per device server
//!
//! Transports build [`WireRequest`](crate::http::WireRequest)s and hand them to an
//! [`HttpClient`], so the network seam can be swapped in tests.

pub mod config;
pub mod crypto;
pub mod dispatcher;
pub mod errors;
pub mod grouping;
pub mod http;
pub mod id;
pub mod metrics_defs;
pub mod params;
pub mod payload;
pub mod request;
pub mod response;
pub mod transport;

#[cfg(test)]
mod testutils;

pub use config::{Settings, ValidationError};
pub use crypto::{Algorithm, EncryptionConfig, Mode};
pub use dispatcher::{Dispatcher, PushRecord, select_strategy};
pub use errors::{ErrorKind, PushError, Result};
pub use self::http::{HttpClient, ReqwestClient};
pub use params::{RequestParameter, get_request_parameters};
pub use request::{ApiVersion, BasicAuth, Device, Level, PushRequest, Volume};
pub use response::{PushResponse, aggregate_group_responses};
