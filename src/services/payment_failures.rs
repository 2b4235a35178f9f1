use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::{Model as OrderModel, OrderStatus, PaymentStatus};
use crate::errors::ServiceError;
use crate::repositories::{OrderRepository, ProductRepository, Repository};

const DEFAULT_FAILURE_REASON: &str = "Payment failed";

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentFailure {
    pub order_id: Uuid,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A line whose stock could not be restored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRestock {
    pub product_id: Uuid,
    pub size: String,
    pub quantity: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailureReport {
    pub order: OrderModel,
    /// True when the order had already failed and nothing was changed
    pub already_failed: bool,
    pub restocked_lines: usize,
    pub skipped: Vec<SkippedRestock>,
}

impl PaymentFailureReport {
    fn unchanged(order: OrderModel) -> Self {
        Self {
            order,
            already_failed: true,
            restocked_lines: 0,
            skipped: Vec::new(),
        }
    }
}

/// Marks declined or abandoned payments and gives the stock back
#[derive(Clone)]
pub struct PaymentFailureService {
    orders: OrderRepository,
    products: ProductRepository,
}

impl PaymentFailureService {
    pub fn new(orders: OrderRepository, products: ProductRepository) -> Self {
        Self { orders, products }
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn record_failure(
        &self,
        request: RecordPaymentFailure,
    ) -> Result<PaymentFailureReport, ServiceError> {
        let order = self.orders.get(request.order_id).await?;

        match (order.payment_status, order.status) {
            (PaymentStatus::Pending, _) => {}
            // Failed by a webhook: the stock is still out
            (PaymentStatus::Failed, OrderStatus::Pending) => {}
            (PaymentStatus::Failed, _) => {
                info!("Order already failed; stock was restored earlier");
                return Ok(PaymentFailureReport::unchanged(order));
            }
            (PaymentStatus::Paid | PaymentStatus::Refunded, _) => {
                return Err(ServiceError::Conflict(format!(
                    "Order {} is {} and cannot be marked as failed",
                    order.order_number, order.payment_status
                )));
            }
        }

        let explicit_reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        let reason = explicit_reason.unwrap_or(DEFAULT_FAILURE_REASON);

        let txn = self.orders.get_db().begin().await?;

        // pending -> failed, or failed (webhook) -> cancelled; whichever
        // matches the row as it is now
        let transitioned = self
            .orders
            .mark_failed(
                &txn,
                order.id,
                request.razorpay_payment_id.as_deref(),
                Some(reason),
                OrderStatus::Cancelled,
            )
            .await?
            || self
                .orders
                .cancel_failed(&txn, order.id, explicit_reason)
                .await?;

        if !transitioned {
            txn.rollback().await?;
            let current = self.orders.get(order.id).await?;
            return match current.payment_status {
                PaymentStatus::Failed => Ok(PaymentFailureReport::unchanged(current)),
                status => Err(ServiceError::Conflict(format!(
                    "Order {} is {} and cannot be marked as failed",
                    current.order_number, status
                ))),
            };
        }

        let items = self.orders.items_for(&txn, &order).await?;
        let mut restocked_lines = 0;
        let mut skipped = Vec::new();

        for item in items {
            let missing = if self
                .products
                .find_by_id(&txn, item.product_id)
                .await?
                .is_none()
            {
                Some("product not found")
            } else if !self
                .products
                .restock(&txn, item.product_id, &item.size, item.quantity)
                .await?
            {
                Some("size not found")
            } else {
                None
            };

            match missing {
                None => restocked_lines += 1,
                Some(why) => {
                    warn!(
                        product_id = %item.product_id,
                        size = %item.size,
                        quantity = item.quantity,
                        "Skipping restock: {}", why
                    );
                    skipped.push(SkippedRestock {
                        product_id: item.product_id,
                        size: item.size,
                        quantity: item.quantity,
                        reason: why.to_string(),
                    });
                }
            }
        }

        txn.commit().await?;

        info!(
            restocked_lines,
            skipped = skipped.len(),
            reason,
            "Payment failure recorded"
        );

        Ok(PaymentFailureReport {
            order: self.orders.get(order.id).await?,
            already_failed: false,
            restocked_lines,
            skipped,
        })
    }
}
