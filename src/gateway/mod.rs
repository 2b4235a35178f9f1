//! Payment gateway integration.
//!
//! Services talk to the gateway through the [`PaymentGateway`] trait so the
//! HTTP client can be swapped (or pointed at a mock server) without touching
//! business logic. Signature primitives live in [`signature`].

use async_trait::async_trait;
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub mod razorpay;
pub mod signature;

pub use razorpay::RazorpayClient;
pub use signature::{GatewaySecrets, SignatureMismatch};

/// Largest drift, in minor units, tolerated between a gateway amount and a
/// local order total. Used by verification and reconciliation alike.
pub const AMOUNT_TOLERANCE_MINOR: i64 = 1;

/// Gateway ids (`pay_…`, `order_…`) are ASCII alphanumerics and
/// underscores. Anything else must not be spliced into a request path.
pub fn is_valid_gateway_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Configuration(String),

    #[error("payment {0} not found")]
    PaymentNotFound(String),

    #[error("invalid gateway id: {0:?}")]
    InvalidId(String),

    #[error("gateway returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

/// Parameters for minting a gateway-side order
#[derive(Debug, Clone, Serialize)]
pub struct CreateGatewayOrder {
    /// Amount in minor units (paise for INR)
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, String>,
}

/// Gateway-side order as returned on creation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// The gateway's authoritative record of a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GatewayPayment {
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    /// e.g. `created`, `authorized`, `captured`, `failed`, `refunded`
    pub status: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl GatewayPayment {
    /// Amount converted back to base currency units
    pub fn amount_major(&self) -> Decimal {
        from_minor_units(self.amount)
    }

    /// Whether the gateway considers the money secured
    pub fn is_settled(&self) -> bool {
        matches!(self.status.as_str(), "captured" | "authorized")
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Mint a gateway order the checkout widget can pay against
    async fn create_order(&self, request: CreateGatewayOrder)
        -> Result<GatewayOrder, GatewayError>;

    /// Fetch a payment by its gateway id
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
}


/// Converts a base-unit amount to minor units, rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// True when `gateway_minor` agrees with `order_total` within
/// [`AMOUNT_TOLERANCE_MINOR`].
pub fn amounts_match(order_total: Decimal, gateway_minor: i64) -> bool {
    match to_minor_units(order_total) {
        Some(expected) => (expected - gateway_minor).abs() <= AMOUNT_TOLERANCE_MINOR,
        None => false,
    }
}
