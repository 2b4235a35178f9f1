use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::{Model as OrderModel, PaymentStatus};
use crate::errors::ServiceError;
use crate::gateway::{amounts_match, GatewaySecrets, PaymentGateway};
use crate::repositories::OrderRepository;

/// Confirmation posted by the client once the checkout widget completes
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPayment {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "razorpayPaymentId is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "razorpayOrderId is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "razorpaySignature is required"))]
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// This call moved the order to paid
    Settled(OrderModel),
    /// The order was already paid; nothing changed
    AlreadyPaid(OrderModel),
}

impl VerificationOutcome {
    pub fn order(&self) -> &OrderModel {
        match self {
            Self::Settled(order) | Self::AlreadyPaid(order) => order,
        }
    }

    pub fn into_order(self) -> OrderModel {
        match self {
            Self::Settled(order) | Self::AlreadyPaid(order) => order,
        }
    }
}

/// Settles orders from client-submitted payment confirmations
#[derive(Clone)]
pub struct PaymentVerificationService {
    orders: OrderRepository,
    gateway: Arc<dyn PaymentGateway>,
    secrets: GatewaySecrets,
}

impl PaymentVerificationService {
    pub fn new(
        orders: OrderRepository,
        gateway: Arc<dyn PaymentGateway>,
        secrets: GatewaySecrets,
    ) -> Self {
        Self {
            orders,
            gateway,
            secrets,
        }
    }

    #[instrument(
        skip(self, request),
        fields(
            order_id = %request.order_id,
            payment_id = %request.razorpay_payment_id,
            gateway_order_id = %request.razorpay_order_id
        )
    )]
    pub async fn verify(&self, request: VerifyPayment) -> Result<VerificationOutcome, ServiceError> {
        request.validate()?;

        let order = self.orders.get(request.order_id).await?;

        if order.payment_status == PaymentStatus::Paid {
            info!("Order already paid, skipping verification");
            return Ok(VerificationOutcome::AlreadyPaid(order));
        }

        if let Err(mismatch) = self.secrets.verify_payment(
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
        ) {
            warn!(
                expected = %mismatch.expected,
                received = %request.razorpay_signature,
                "Payment signature mismatch"
            );
            return Err(ServiceError::Unauthorized("invalid signature".to_string()));
        }

        if let Some(assigned) = order.razorpay_order_id.as_deref() {
            if assigned != request.razorpay_order_id {
                warn!(assigned, "Gateway order id does not belong to this order");
                return Err(ServiceError::ValidationError(
                    "razorpayOrderId does not match the order".to_string(),
                ));
            }
        }

        let payment = self
            .gateway
            .fetch_payment(&request.razorpay_payment_id)
            .await?;

        if !amounts_match(order.total, payment.amount) {
            warn!(
                order_total = %order.total,
                gateway_amount = payment.amount,
                "Gateway amount does not match order total"
            );
            return Err(ServiceError::AmountMismatch {
                expected: order.total,
                received: payment.amount_major(),
            });
        }

        let settled = self
            .orders
            .settle_paid(order.id, &request.razorpay_payment_id)
            .await?;
        let order = self.orders.get(order.id).await?;

        if settled {
            info!(method = ?payment.method, "Payment verified, order marked paid");
            return Ok(VerificationOutcome::Settled(order));
        }

        // Lost the race to another path
        match order.payment_status {
            PaymentStatus::Paid => Ok(VerificationOutcome::AlreadyPaid(order)),
            other => Err(ServiceError::Conflict(format!(
                "Order {} is {} and cannot be marked paid",
                order.order_number, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{mock::MockGateway, GatewayPayment};
    use crate::services::test_support::{
        memory_db, pending_order, Interleave, InterleavingGateway,
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn secrets() -> GatewaySecrets {
        GatewaySecrets::new("key_secret", "hook_secret")
    }

    fn captured(amount: i64) -> GatewayPayment {
        GatewayPayment {
            id: "pay_1".into(),
            amount,
            currency: "INR".into(),
            status: "captured".into(),
            method: Some("card".into()),
            order_id: Some("order_gw".into()),
            email: None,
            contact: None,
            error_description: None,
            created_at: None,
        }
    }

    fn request(order_id: Uuid, signature: String) -> VerifyPayment {
        VerifyPayment {
            order_id,
            razorpay_payment_id: "pay_1".into(),
            razorpay_order_id: "order_gw".into(),
            razorpay_signature: signature,
        }
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_before_gateway_lookup() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(250)).await;

        let mut gateway = MockGateway::new();
        gateway.expect_fetch_payment().never();

        let svc = PaymentVerificationService::new(
            OrderRepository::new(db.clone()),
            Arc::new(gateway),
            secrets(),
        );
        let forged = GatewaySecrets::new("wrong", "wrong").sign_payment("order_gw", "pay_1");
        let err = svc.verify(request(order.id, forged)).await.unwrap_err();

        assert_matches!(err, ServiceError::Unauthorized(_));
        let stored = OrderRepository::new(db).get(order.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn one_paisa_drift_is_tolerated() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(250)).await;

        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_payment()
            .times(1)
            .returning(|_| Ok(captured(25001)));

        let svc = PaymentVerificationService::new(
            OrderRepository::new(db),
            Arc::new(gateway),
            secrets(),
        );
        let signature = secrets().sign_payment("order_gw", "pay_1");
        let outcome = svc.verify(request(order.id, signature)).await.unwrap();

        assert_matches!(outcome, VerificationOutcome::Settled(_));
        assert_eq!(outcome.order().payment_status, PaymentStatus::Paid);
        assert_eq!(outcome.order().payment_id.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn larger_drift_reports_both_amounts() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(250)).await;

        let mut gateway = MockGateway::new();
        gateway
            .expect_fetch_payment()
            .returning(|_| Ok(captured(24900)));

        let svc = PaymentVerificationService::new(
            OrderRepository::new(db),
            Arc::new(gateway),
            secrets(),
        );
        let signature = secrets().sign_payment("order_gw", "pay_1");
        let err = svc.verify(request(order.id, signature)).await.unwrap_err();

        assert_matches!(
            err,
            ServiceError::AmountMismatch { expected, received }
                if expected.round_dp(2) == dec!(250) && received == dec!(249)
        );
    }

    fn interleaving(
        db: &Arc<sea_orm::DatabaseConnection>,
        order_id: Uuid,
        action: Interleave,
    ) -> PaymentVerificationService {
        let gateway = InterleavingGateway {
            orders: OrderRepository::new(db.clone()),
            order_id,
            action,
            amount: 25000,
        };
        PaymentVerificationService::new(
            OrderRepository::new(db.clone()),
            Arc::new(gateway),
            secrets(),
        )
    }

    #[tokio::test]
    async fn settled_during_gateway_lookup_reports_already_paid() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(250)).await;

        let svc = interleaving(&db, order.id, Interleave::Settle);
        let signature = secrets().sign_payment("order_gw", "pay_1");
        let outcome = svc.verify(request(order.id, signature)).await.unwrap();

        assert_matches!(outcome, VerificationOutcome::AlreadyPaid(_));
        // The first settlement wins
        assert_eq!(outcome.order().payment_id.as_deref(), Some("pay_other"));
    }

    #[tokio::test]
    async fn failed_during_gateway_lookup_is_a_conflict() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(250)).await;

        let svc = interleaving(&db, order.id, Interleave::Fail);
        let signature = secrets().sign_payment("order_gw", "pay_1");
        let err = svc.verify(request(order.id, signature)).await.unwrap_err();

        assert_matches!(err, ServiceError::Conflict(_));
        let stored = OrderRepository::new(db).get(order.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }
}
