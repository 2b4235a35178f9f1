use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{
    is_valid_gateway_id, CreateGatewayOrder, GatewayError, GatewayOrder, GatewayPayment,
    PaymentGateway,
};
use crate::config::RazorpayConfig;

/// Razorpay REST client authenticated with HTTP basic auth
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayClient {
    /// Builds a client from configuration. Missing credentials are reported
    /// as a configuration error so startup can fail before serving traffic.
    pub fn new(config: &RazorpayConfig) -> Result<Self, GatewayError> {
        if config.key_id.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "Razorpay key id is not configured".to_string(),
            ));
        }
        if config.key_secret.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "Razorpay key secret is not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatewayError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Maps a non-success response to a [`GatewayError`]
    async fn error_from(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorEnvelope>(&body).ok();
        let message = parsed
            .as_ref()
            .and_then(|e| e.error.description.clone())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });

        if status == StatusCode::UNAUTHORIZED {
            return GatewayError::Configuration(format!(
                "gateway rejected credentials: {message}"
            ));
        }

        if let Some(code) = parsed.and_then(|e| e.error.code) {
            debug!(status = %status, code = %code, "Gateway error response");
        }

        GatewayError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self, request), fields(receipt = %request.receipt, amount = request.amount))]
    async fn create_order(
        &self,
        request: CreateGatewayOrder,
    ) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .post(self.url("orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::error_from(response).await;
            warn!(error = %err, "Gateway order creation failed");
            return Err(err);
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        if !is_valid_gateway_id(payment_id) {
            return Err(GatewayError::InvalidId(payment_id.to_string()));
        }

        let response = self
            .client
            .get(self.url(&format!("payments/{payment_id}")))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(match Self::error_from(response).await {
                GatewayError::Upstream { status, message }
                    if status == StatusCode::NOT_FOUND.as_u16()
                        || message.to_ascii_lowercase().contains("does not exist") =>
                {
                    GatewayError::PaymentNotFound(payment_id.to_string())
                }
                other => other,
            });
        }

        response
            .json::<GatewayPayment>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}
