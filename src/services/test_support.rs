use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
use crate::entities::order::{self, OrderStatus, PaymentStatus};
use crate::gateway::{
    CreateGatewayOrder, GatewayError, GatewayOrder, GatewayPayment, PaymentGateway,
};
use crate::repositories::{OrderRepository, Repository};
use crate::services::checkout::generate_order_number;

/// Migrated in-memory SQLite behind a single connection
pub(crate) async fn memory_db() -> Arc<DatabaseConnection> {
    let pool = establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        ..Default::default()
    })
    .await
    .expect("connect");
    run_migrations(&pool).await.expect("migrations");
    Arc::new(pool)
}

pub(crate) async fn pending_order(db: &DatabaseConnection, total: Decimal) -> order::Model {
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(generate_order_number()),
        user_id: Set(None),
        subtotal: Set(total),
        tax: Set(Decimal::ZERO),
        shipping: Set(Decimal::ZERO),
        total: Set(total),
        currency: Set("INR".to_string()),
        payment_status: Set(PaymentStatus::Pending),
        payment_id: Set(None),
        razorpay_order_id: Set(None),
        payment_failure_reason: Set(None),
        status: Set(OrderStatus::Pending),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert order")
}

/// What another request does to the order while a gateway call is in flight
#[derive(Debug, Clone, Copy)]
pub(crate) enum Interleave {
    Settle,
    Fail,
    AssignOtherGatewayOrder,
}

/// Gateway that changes the order behind the caller's back before answering
pub(crate) struct InterleavingGateway {
    pub orders: OrderRepository,
    pub order_id: Uuid,
    pub action: Interleave,
    /// Amount reported by `fetch_payment`, in minor units
    pub amount: i64,
}

impl InterleavingGateway {
    async fn interleave(&self) -> Result<(), GatewayError> {
        let changed = match self.action {
            Interleave::Settle => self.orders.settle_paid(self.order_id, "pay_other").await,
            Interleave::Fail => {
                self.orders
                    .mark_failed(
                        self.orders.get_db(),
                        self.order_id,
                        Some("pay_other"),
                        Some("declined"),
                        OrderStatus::Pending,
                    )
                    .await
            }
            Interleave::AssignOtherGatewayOrder => {
                self.orders
                    .assign_gateway_order_id(self.order_id, "order_other")
                    .await
            }
        }
        .map_err(|e| GatewayError::Configuration(e.to_string()))?;
        assert!(changed, "interleaved write applies");
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for InterleavingGateway {
    async fn create_order(&self, request: CreateGatewayOrder) -> Result<GatewayOrder, GatewayError> {
        self.interleave().await?;
        Ok(GatewayOrder {
            id: "order_mine".into(),
            amount: request.amount,
            currency: request.currency,
            receipt: Some(request.receipt),
            status: Some("created".into()),
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        self.interleave().await?;
        Ok(GatewayPayment {
            id: payment_id.to_string(),
            amount: self.amount,
            currency: "INR".into(),
            status: "captured".into(),
            method: Some("card".into()),
            order_id: Some("order_gw".into()),
            email: None,
            contact: None,
            error_description: None,
            created_at: None,
        })
    }
}
