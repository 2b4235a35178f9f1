use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::PaymentStatus;
use crate::errors::ServiceError;
use crate::gateway::{to_minor_units, CreateGatewayOrder, PaymentGateway};
use crate::repositories::OrderRepository;

/// Request to open a gateway-side order for an existing order
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntent {
    pub order_id: Uuid,
    /// Charge amount in base currency units
    pub amount: Decimal,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: Option<String>,
}

/// What the checkout widget needs to collect the payment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub razorpay_order_id: String,
    /// Amount in minor units, as sent to the gateway
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Mints gateway orders and pins them to local orders
#[derive(Clone)]
pub struct PaymentIntentService {
    orders: OrderRepository,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentIntentService {
    pub fn new(orders: OrderRepository, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { orders, gateway }
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_intent(
        &self,
        request: CreatePaymentIntent,
    ) -> Result<PaymentIntent, ServiceError> {
        request.validate()?;

        let amount = to_minor_units(request.amount)
            .filter(|minor| *minor > 0)
            .ok_or_else(|| {
                ServiceError::ValidationError("Amount must be greater than zero".to_string())
            })?;

        let order = self.orders.get(request.order_id).await?;

        if order.payment_status != PaymentStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already {}",
                order.order_number, order.payment_status
            )));
        }
        if let Some(existing) = &order.razorpay_order_id {
            return Err(ServiceError::Conflict(format!(
                "Order {} already has gateway order {}",
                order.order_number, existing
            )));
        }

        let currency = request
            .currency
            .unwrap_or_else(|| order.currency.clone())
            .to_ascii_uppercase();

        let mut notes = BTreeMap::new();
        notes.insert("order_id".to_string(), order.id.to_string());

        let gateway_order = self
            .gateway
            .create_order(CreateGatewayOrder {
                amount,
                currency: currency.clone(),
                receipt: order.order_number.clone(),
                notes,
            })
            .await?;

        if !self
            .orders
            .assign_gateway_order_id(order.id, &gateway_order.id)
            .await?
        {
            warn!(
                gateway_order_id = %gateway_order.id,
                "Order changed while the gateway order was being created; discarding gateway order"
            );
            return Err(ServiceError::Conflict(format!(
                "Order {} was updated concurrently",
                order.order_number
            )));
        }

        info!(
            gateway_order_id = %gateway_order.id,
            amount,
            currency = %currency,
            "Payment intent created"
        );

        Ok(PaymentIntent {
            razorpay_order_id: gateway_order.id,
            amount,
            currency,
            receipt: order.order_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{mock::MockGateway, GatewayError, GatewayOrder};
    use crate::services::test_support::{
        memory_db, pending_order, Interleave, InterleavingGateway,
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn service(db: Arc<sea_orm::DatabaseConnection>, gateway: MockGateway) -> PaymentIntentService {
        PaymentIntentService::new(OrderRepository::new(db), Arc::new(gateway))
    }

    #[tokio::test]
    async fn sends_minor_units_and_pins_gateway_order() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(499.99)).await;
        let order_id = order.id;

        let mut gateway = MockGateway::new();
        gateway
            .expect_create_order()
            .withf(move |req| {
                req.amount == 49999
                    && req.currency == "INR"
                    && req.notes.get("order_id") == Some(&order_id.to_string())
            })
            .times(1)
            .returning(|req| {
                Ok(GatewayOrder {
                    id: "order_mock_1".into(),
                    amount: req.amount,
                    currency: req.currency,
                    receipt: Some(req.receipt),
                    status: Some("created".into()),
                })
            });

        let svc = service(db.clone(), gateway);
        let intent = svc
            .create_intent(CreatePaymentIntent {
                order_id,
                amount: dec!(499.99),
                currency: Some("inr".into()),
            })
            .await
            .unwrap();

        assert_eq!(intent.razorpay_order_id, "order_mock_1");
        assert_eq!(intent.amount, 49999);
        assert_eq!(intent.currency, "INR");
        assert_eq!(intent.receipt, order.order_number);

        let stored = OrderRepository::new(db).get(order_id).await.unwrap();
        assert_eq!(stored.razorpay_order_id.as_deref(), Some("order_mock_1"));
    }

    #[tokio::test]
    async fn zero_amount_never_reaches_gateway() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(10)).await;

        let mut gateway = MockGateway::new();
        gateway.expect_create_order().never();

        let err = service(db, gateway)
            .create_intent(CreatePaymentIntent {
                order_id: order.id,
                amount: dec!(0.004),
                currency: None,
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn order_with_gateway_order_is_a_conflict() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(10)).await;
        assert!(OrderRepository::new(db.clone())
            .assign_gateway_order_id(order.id, "order_existing")
            .await
            .unwrap());

        let mut gateway = MockGateway::new();
        gateway.expect_create_order().never();

        let err = service(db, gateway)
            .create_intent(CreatePaymentIntent {
                order_id: order.id,
                amount: dec!(10),
                currency: None,
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Conflict(_));
    }

    #[tokio::test]
    async fn misconfigured_gateway_surfaces_as_configuration_error() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(10)).await;

        let mut gateway = MockGateway::new();
        gateway.expect_create_order().returning(|_| {
            Err(GatewayError::Configuration(
                "gateway rejected credentials".into(),
            ))
        });

        let err = service(db.clone(), gateway)
            .create_intent(CreatePaymentIntent {
                order_id: order.id,
                amount: dec!(10),
                currency: None,
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Configuration(_));

        let stored = OrderRepository::new(db).get(order.id).await.unwrap();
        assert_eq!(stored.razorpay_order_id, None);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let db = memory_db().await;
        let mut gateway = MockGateway::new();
        gateway.expect_create_order().never();

        let err = service(db, gateway)
            .create_intent(CreatePaymentIntent {
                order_id: Uuid::new_v4(),
                amount: dec!(10),
                currency: None,
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn concurrent_intent_keeps_the_first_gateway_order() {
        let db = memory_db().await;
        let order = pending_order(&db, dec!(250)).await;

        let gateway = InterleavingGateway {
            orders: OrderRepository::new(db.clone()),
            order_id: order.id,
            action: Interleave::AssignOtherGatewayOrder,
            amount: 25000,
        };
        let svc = PaymentIntentService::new(OrderRepository::new(db.clone()), Arc::new(gateway));
        let err = svc
            .create_intent(CreatePaymentIntent {
                order_id: order.id,
                amount: dec!(250),
                currency: None,
            })
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::Conflict(_));
        let stored = OrderRepository::new(db).get(order.id).await.unwrap();
        assert_eq!(stored.razorpay_order_id.as_deref(), Some("order_other"));
    }
}
