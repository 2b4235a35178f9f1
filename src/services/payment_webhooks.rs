use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::{OrderStatus, PaymentStatus};
use crate::errors::ServiceError;
use crate::gateway::{amounts_match, GatewaySecrets};
use crate::repositories::{OrderRepository, Repository};

/// Gateway event envelope. Only the payment entity is read.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<PaymentWrapper>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Local payment status implied by a gateway event
pub fn normalize_status(event: &str, gateway_status: &str) -> PaymentStatus {
    if gateway_status == "captured" || event == "payment.authorized" {
        PaymentStatus::Paid
    } else if gateway_status == "failed" || event == "payment.failed" {
        PaymentStatus::Failed
    } else {
        PaymentStatus::Pending
    }
}

/// What a delivery did. Every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    #[serde(rename_all = "camelCase")]
    Applied {
        order_id: Uuid,
        payment_status: PaymentStatus,
    },
    #[serde(rename_all = "camelCase")]
    Duplicate {
        order_id: Uuid,
    },
    /// The order is settled the other way; left untouched
    #[serde(rename_all = "camelCase")]
    Stale {
        order_id: Uuid,
        current: PaymentStatus,
        incoming: PaymentStatus,
    },
    #[serde(rename_all = "camelCase")]
    AmountMismatch {
        order_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    OrderNotFound {
        gateway_order_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Ignored {
        reason: String,
    },
}

/// Applies gateway-driven payment notifications
#[derive(Clone)]
pub struct PaymentWebhookService {
    orders: OrderRepository,
    secrets: GatewaySecrets,
}

impl PaymentWebhookService {
    pub fn new(orders: OrderRepository, secrets: GatewaySecrets) -> Self {
        Self { orders, secrets }
    }

    /// Handles one delivery. `body` must be the raw request bytes.
    #[instrument(skip(self, body, signature), fields(body_len = body.len()))]
    pub async fn handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, ServiceError> {
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("missing signature".to_string()))?;

        if let Err(mismatch) = self.secrets.verify_webhook(body, signature) {
            warn!(
                expected = %mismatch.expected,
                received = %signature,
                "Webhook signature mismatch"
            );
            return Err(ServiceError::Unauthorized("invalid signature".to_string()));
        }

        let event: WebhookEvent = serde_json::from_slice(body).map_err(|e| {
            ServiceError::ValidationError(format!("Malformed webhook payload: {}", e))
        })?;

        let Some(PaymentWrapper { entity }) = event.payload.payment else {
            info!(event = %event.event, "Webhook without payment entity ignored");
            return Ok(WebhookOutcome::Ignored {
                reason: format!("event {} carries no payment", event.event),
            });
        };

        let incoming = normalize_status(&event.event, &entity.status);
        if incoming == PaymentStatus::Pending {
            info!(event = %event.event, status = %entity.status, "No state change for event");
            return Ok(WebhookOutcome::Ignored {
                reason: format!("status {} requires no action", entity.status),
            });
        }

        let Some(gateway_order_id) = entity.order_id.clone() else {
            return Ok(WebhookOutcome::Ignored {
                reason: "payment has no order id".to_string(),
            });
        };

        let Some(order) = self.orders.find_by_gateway_order_id(&gateway_order_id).await? else {
            info!(
                gateway_order_id = %gateway_order_id,
                "No local order for gateway order; acknowledging"
            );
            return Ok(WebhookOutcome::OrderNotFound { gateway_order_id });
        };

        if order.payment_status == incoming {
            info!(order_id = %order.id, "Duplicate webhook, order already {}", incoming);
            return Ok(WebhookOutcome::Duplicate { order_id: order.id });
        }

        if order.payment_status != PaymentStatus::Pending {
            warn!(
                order_id = %order.id,
                current = %order.payment_status,
                incoming = %incoming,
                payment_id = %entity.id,
                "Webhook conflicts with settled order; needs manual review"
            );
            return Ok(WebhookOutcome::Stale {
                order_id: order.id,
                current: order.payment_status,
                incoming,
            });
        }

        let applied = match incoming {
            PaymentStatus::Paid => {
                if let Some(amount) = entity.amount {
                    if !amounts_match(order.total, amount) {
                        warn!(
                            order_id = %order.id,
                            order_total = %order.total,
                            gateway_amount = amount,
                            "Webhook amount does not match order total"
                        );
                        return Ok(WebhookOutcome::AmountMismatch { order_id: order.id });
                    }
                }
                self.orders.settle_paid(order.id, &entity.id).await?
            }
            _ => {
                self.orders
                    .mark_failed(
                        self.orders.get_db(),
                        order.id,
                        Some(&entity.id),
                        entity.error_description.as_deref(),
                        OrderStatus::Pending,
                    )
                    .await?
            }
        };

        if applied {
            info!(order_id = %order.id, payment_status = %incoming, "Webhook applied");
            return Ok(WebhookOutcome::Applied {
                order_id: order.id,
                payment_status: incoming,
            });
        }

        // Another path settled the order between the read and the update
        let current = self.orders.get(order.id).await?.payment_status;
        if current == incoming {
            Ok(WebhookOutcome::Duplicate { order_id: order.id })
        } else {
            Ok(WebhookOutcome::Stale {
                order_id: order.id,
                current,
                incoming,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("payment.captured", "captured", PaymentStatus::Paid)]
    #[case("payment.authorized", "authorized", PaymentStatus::Paid)]
    #[case("payment.failed", "failed", PaymentStatus::Failed)]
    #[case("payment.failed", "created", PaymentStatus::Failed)]
    #[case("order.paid", "captured", PaymentStatus::Paid)]
    #[case("payment.created", "created", PaymentStatus::Pending)]
    #[case("refund.processed", "refunded", PaymentStatus::Pending)]
    fn normalizes_gateway_events(
        #[case] event: &str,
        #[case] status: &str,
        #[case] expected: PaymentStatus,
    ) {
        assert_eq!(normalize_status(event, status), expected);
    }

    #[test]
    fn parses_gateway_envelope() {
        let body = r#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_1",
                        "order_id": "order_1",
                        "status": "captured",
                        "amount": 49900,
                        "currency": "INR"
                    }
                }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        let entity = event.payload.payment.unwrap().entity;
        assert_eq!(entity.id, "pay_1");
        assert_eq!(entity.order_id.as_deref(), Some("order_1"));
        assert_eq!(entity.amount, Some(49900));
    }

    #[test]
    fn outcome_serializes_with_result_tag() {
        let outcome = WebhookOutcome::OrderNotFound {
            gateway_order_id: "order_x".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "order_not_found");
        assert_eq!(json["gatewayOrderId"], "order_x");

        let applied = serde_json::to_value(WebhookOutcome::Applied {
            order_id: Uuid::nil(),
            payment_status: PaymentStatus::Paid,
        })
        .unwrap();
        assert_eq!(applied["result"], "applied");
        assert_eq!(applied["orderId"], Uuid::nil().to_string());
        assert_eq!(applied["paymentStatus"], "paid");
    }
}
