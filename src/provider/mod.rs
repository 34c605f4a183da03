//! Push delivery provider abstraction.
//!
//! A provider accepts a list of (token, payload) messages per call and
//! returns one success/failure outcome per message, order-aligned with
//! the input. Failure outcomes carry a machine-readable reason code.

mod factory;
mod noop;

pub use factory::create_push_provider;
pub use noop::NoopPushProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when a bulk-send call itself fails, as opposed
/// to the provider returning per-message failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the whole batch
    #[error("Push provider rejected batch: {0}")]
    Rejected(String),

    /// The provider is unreachable
    #[error("Push provider unavailable: {0}")]
    Unavailable(String),
}

/// One message addressed to one registration token. A campaign
/// replicates the same notification payload across every token.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub click_action: String,
}

/// Per-message result of a bulk send, order-aligned with the input
/// message list. `error_code` is present iff the send failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_code: None,
        }
    }

    pub fn failed(code: impl Into<String>) -> Self {
        Self {
            success: false,
            error_code: Some(code.into()),
        }
    }
}

/// Provider failure codes that mean a registration token is permanently
/// dead. Membership in this set is the sole criterion for deleting the
/// registration record.
pub const BAD_TOKEN_REASONS: [&str; 2] = [
    "messaging/invalid-registration-token",
    "messaging/registration-token-not-registered",
];

/// Whether a failure code marks the token as permanently invalid.
pub fn is_bad_token_reason(code: &str) -> bool {
    BAD_TOKEN_REASONS.contains(&code)
}

/// Backend trait for bulk push delivery.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`) as they will be
/// shared across multiple async tasks.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Submit one bulk-send call.
    ///
    /// On success the returned vector has exactly one outcome per input
    /// message, in input order. An `Err` means the call itself failed
    /// and nothing in the batch was dispatched.
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<SendOutcome>, ProviderError>;
}
