//! Payment gateway contract. The checkout engine only sees this trait; the
//! concrete PayPal client lives in [`paypal`] and tests substitute their own
//! implementation.

use async_trait::async_trait;
use thiserror::Error;

pub mod paypal;

pub use paypal::PaypalGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request did not complete in time. The outcome is UNKNOWN: the
    /// gateway may or may not have processed it. Callers must re-check the
    /// authoritative order status before treating this as a failure.
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(reqwest::Error),

    #[error("gateway rejected request: {0}")]
    Rejected(String),

    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Whether the outcome of the call is unknown rather than a definite
    /// failure.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Captured,
    /// The gateway order was captured by an earlier call; funds moved exactly
    /// once. Callers treat this the same as `Captured`.
    AlreadyCaptured,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub status: CaptureStatus,
    /// Captured amount in cents, when the gateway reports one.
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOrderStatus {
    Captured,
    NotCaptured,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Phase one: authorize an order for `total` cents. Money does not move.
    async fn create_order(&self, total: i64, currency: &str) -> Result<String, GatewayError>;

    /// Phase two: capture a previously created order. Idempotent at the
    /// gateway: a repeat capture reports `AlreadyCaptured`.
    async fn capture_order(&self, gateway_order_id: &str) -> Result<CaptureResult, GatewayError>;

    /// Authoritative status lookup, used to resolve ambiguous capture
    /// outcomes before surfacing an error to the customer.
    async fn order_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError>;
}
