use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::RazorpayConfig;

type HmacSha256 = Hmac<Sha256>;

/// A signature that did not match. Carries the expected value so callers
/// can log it next to what they received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("signature mismatch")]
pub struct SignatureMismatch {
    pub expected: String,
}

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `signature` (hex) against `payload` in constant time.
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> Result<(), SignatureMismatch> {
    let mismatch = || SignatureMismatch {
        expected: sign(secret, payload),
    };

    let provided = hex::decode(signature.trim()).map_err(|_| mismatch())?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| mismatch())?;
    mac.update(payload);
    mac.verify_slice(&provided).map_err(|_| mismatch())
}

/// Secrets used to authenticate checkout callbacks and webhook deliveries
#[derive(Clone)]
pub struct GatewaySecrets {
    key_secret: String,
    webhook_secret: String,
}

impl std::fmt::Debug for GatewaySecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySecrets").finish_non_exhaustive()
    }
}

impl GatewaySecrets {
    pub fn new(key_secret: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn from_config(config: &RazorpayConfig) -> Self {
        Self::new(config.key_secret.clone(), config.webhook_secret())
    }

    /// Verifies the checkout signature over `"{order_id}|{payment_id}"`.
    pub fn verify_payment(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureMismatch> {
        let payload = format!("{gateway_order_id}|{payment_id}");
        verify(&self.key_secret, payload.as_bytes(), signature)
    }

    /// Verifies a webhook signature over the raw request body.
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> Result<(), SignatureMismatch> {
        verify(&self.webhook_secret, body, signature)
    }

    pub fn sign_payment(&self, gateway_order_id: &str, payment_id: &str) -> String {
        sign(
            &self.key_secret,
            format!("{gateway_order_id}|{payment_id}").as_bytes(),
        )
    }

    pub fn sign_webhook(&self, body: &[u8]) -> String {
        sign(&self.webhook_secret, body)
    }
}
