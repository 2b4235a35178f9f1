use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel, OrderStatus,
    PaymentStatus,
};
use crate::entities::order_item::{
    self, ActiveModel as OrderItemActiveModel, Entity as OrderItem, Model as OrderItemModel,
};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

/// Repository for order operations.
///
/// Payment-status writes are conditional updates: each one names the
/// status it expects to find and reports whether a row actually changed.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find_by_id(id).one(self.base.get_db()).await?)
    }

    /// Find an order by ID or fail with NotFound
    pub async fn get(&self, id: Uuid) -> Result<OrderModel, ServiceError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }

    /// Find the order a gateway order id was assigned to
    pub async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(Column::RazorpayOrderId.eq(gateway_order_id))
            .one(self.base.get_db())
            .await?)
    }

    /// Line items for an order, in checkout order
    pub async fn items_for<C>(
        &self,
        conn: &C,
        order: &OrderModel,
    ) -> Result<Vec<OrderItemModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(order
            .find_related(OrderItem)
            .order_by_asc(order_item::Column::Position)
            .all(conn)
            .await?)
    }

    /// Order together with its line items
    pub async fn find_with_items(
        &self,
        id: Uuid,
    ) -> Result<Option<(OrderModel, Vec<OrderItemModel>)>, ServiceError> {
        let Some(order) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let items = self.items_for(self.base.get_db(), &order).await?;
        Ok(Some((order, items)))
    }

    /// Most recent paid orders, newest first
    pub async fn recent_paid(&self, limit: u64) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(Column::PaymentStatus.eq(PaymentStatus::Paid))
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(self.base.get_db())
            .await?)
    }

    /// Insert an order and its lines
    pub async fn insert_with_items<C>(
        &self,
        conn: &C,
        order: OrderActiveModel,
        items: Vec<OrderItemActiveModel>,
    ) -> Result<OrderModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let order = order.insert(conn).await?;
        if !items.is_empty() {
            OrderItem::insert_many(items).exec(conn).await?;
        }
        Ok(order)
    }

    /// Records the gateway order id. Only succeeds while the order is
    /// pending and has no gateway order id yet.
    pub async fn assign_gateway_order_id(
        &self,
        id: Uuid,
        gateway_order_id: &str,
    ) -> Result<bool, ServiceError> {
        let result = Order::update_many()
            .set(OrderActiveModel {
                razorpay_order_id: Set(Some(gateway_order_id.to_string())),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::RazorpayOrderId.is_null())
            .filter(Column::PaymentStatus.eq(PaymentStatus::Pending))
            .exec(self.base.get_db())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// pending -> paid. Returns false if the order was no longer pending.
    pub async fn settle_paid(&self, id: Uuid, payment_id: &str) -> Result<bool, ServiceError> {
        let result = Order::update_many()
            .set(OrderActiveModel {
                payment_status: Set(PaymentStatus::Paid),
                payment_id: Set(Some(payment_id.to_string())),
                status: Set(OrderStatus::Processing),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::PaymentStatus.eq(PaymentStatus::Pending))
            .exec(self.base.get_db())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// pending -> failed, moving fulfillment to `status`. Returns false if
    /// the order was no longer pending.
    pub async fn mark_failed<C>(
        &self,
        conn: &C,
        id: Uuid,
        payment_id: Option<&str>,
        reason: Option<&str>,
        status: OrderStatus,
    ) -> Result<bool, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut update = OrderActiveModel {
            payment_status: Set(PaymentStatus::Failed),
            status: Set(status),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(payment_id) = payment_id {
            update.payment_id = Set(Some(payment_id.to_string()));
        }
        if let Some(reason) = reason {
            update.payment_failure_reason = Set(Some(reason.to_string()));
        }

        let result = Order::update_many()
            .set(update)
            .filter(Column::Id.eq(id))
            .filter(Column::PaymentStatus.eq(PaymentStatus::Pending))
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Cancels an order whose payment already failed without its stock
    /// coming back (failed by a webhook). Returns false unless the order is
    /// failed and still pending fulfillment.
    pub async fn cancel_failed<C>(
        &self,
        conn: &C,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<bool, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut update = OrderActiveModel {
            status: Set(OrderStatus::Cancelled),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(reason) = reason {
            update.payment_failure_reason = Set(Some(reason.to_string()));
        }

        let result = Order::update_many()
            .set(update)
            .filter(Column::Id.eq(id))
            .filter(Column::PaymentStatus.eq(PaymentStatus::Failed))
            .filter(Column::Status.eq(OrderStatus::Pending))
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

impl Repository for OrderRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{memory_db, pending_order};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn settles_only_once() {
        let db = memory_db().await;
        let repo = OrderRepository::new(db.clone());
        let order = pending_order(&db, dec!(100)).await;

        assert!(repo.settle_paid(order.id, "pay_first").await.unwrap());
        assert!(!repo.settle_paid(order.id, "pay_second").await.unwrap());

        let stored = repo.get(order.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.status, OrderStatus::Processing);
        assert_eq!(stored.payment_id.as_deref(), Some("pay_first"));
    }

    #[tokio::test]
    async fn paid_order_cannot_be_failed() {
        let db = memory_db().await;
        let repo = OrderRepository::new(db.clone());
        let order = pending_order(&db, dec!(100)).await;

        assert!(repo.settle_paid(order.id, "pay_1").await.unwrap());
        let failed = repo
            .mark_failed(
                db.as_ref(),
                order.id,
                Some("pay_2"),
                Some("declined"),
                OrderStatus::Cancelled,
            )
            .await
            .unwrap();
        assert!(!failed);

        let stored = repo.get(order.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.payment_failure_reason, None);
    }

    #[tokio::test]
    async fn gateway_order_id_is_assigned_once() {
        let db = memory_db().await;
        let repo = OrderRepository::new(db.clone());
        let order = pending_order(&db, dec!(100)).await;

        assert!(repo.assign_gateway_order_id(order.id, "order_a").await.unwrap());
        assert!(!repo.assign_gateway_order_id(order.id, "order_b").await.unwrap());

        let stored = repo.get(order.id).await.unwrap();
        assert_eq!(stored.razorpay_order_id.as_deref(), Some("order_a"));
        assert_eq!(
            repo.find_by_gateway_order_id("order_a")
                .await
                .unwrap()
                .map(|o| o.id),
            Some(order.id)
        );
    }

    #[tokio::test]
    async fn cancel_failed_needs_a_failed_order_awaiting_fulfillment() {
        let db = memory_db().await;
        let repo = OrderRepository::new(db.clone());
        let order = pending_order(&db, dec!(100)).await;

        // Still pending payment
        assert!(!repo.cancel_failed(db.as_ref(), order.id, None).await.unwrap());

        assert!(repo
            .mark_failed(db.as_ref(), order.id, Some("pay_1"), None, OrderStatus::Pending)
            .await
            .unwrap());
        assert!(repo
            .cancel_failed(db.as_ref(), order.id, Some("closed checkout"))
            .await
            .unwrap());
        assert!(!repo.cancel_failed(db.as_ref(), order.id, None).await.unwrap());

        let stored = repo.get(order.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stored.payment_failure_reason.as_deref(), Some("closed checkout"));
    }
}
