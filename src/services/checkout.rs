use chrono::Utc;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::order::{self, Model as OrderModel, OrderStatus, PaymentStatus};
use crate::entities::order_item::{self, Model as OrderItemModel};
use crate::errors::ServiceError;
use crate::repositories::{OrderRepository, ProductRepository, Repository};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 16, message = "Size is required"))]
    pub size: String,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CheckoutItem>,
}

/// Order with its lines
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Pricing knobs taken from configuration
#[derive(Debug, Clone)]
pub struct PricingRules {
    pub currency: String,
    pub tax_rate: Decimal,
    pub shipping_fee: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
}

impl From<&AppConfig> for PricingRules {
    fn from(config: &AppConfig) -> Self {
        Self {
            currency: config.default_currency.clone(),
            tax_rate: config.tax_rate,
            shipping_fee: config.shipping_fee,
            free_shipping_threshold: config.free_shipping_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl PricingRules {
    pub fn totals(&self, subtotal: Decimal) -> OrderTotals {
        let subtotal = round_money(subtotal);
        let tax = round_money(subtotal * self.tax_rate);
        let shipping = match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => round_money(self.shipping_fee),
        };
        OrderTotals {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }
}

/// `ORD-{unix millis}-{4 random digits}`
pub fn generate_order_number() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("ORD-{}-{:04}", Utc::now().timestamp_millis(), suffix)
}

/// Prices a cart, reserves stock and records the order
#[derive(Clone)]
pub struct CheckoutService {
    orders: OrderRepository,
    products: ProductRepository,
    pricing: PricingRules,
}

impl CheckoutService {
    pub fn new(
        orders: OrderRepository,
        products: ProductRepository,
        pricing: PricingRules,
    ) -> Self {
        Self {
            orders,
            products,
            pricing,
        }
    }

    /// Creates a pending order. Stock for every line is taken in the same
    /// transaction as the insert, so a shortfall leaves nothing behind.
    #[instrument(
        skip(self, request),
        fields(user_id = ?request.user_id, lines = request.items.len())
    )]
    pub async fn place_order(
        &self,
        request: CheckoutRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
        }

        let order_id = Uuid::new_v4();
        let txn = self.orders.get_db().begin().await?;

        let mut subtotal = Decimal::ZERO;
        let mut lines = Vec::with_capacity(request.items.len());

        for (position, item) in request.items.iter().enumerate() {
            let product = self
                .products
                .find_by_id(&txn, item.product_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            let size = self
                .products
                .find_size(&txn, product.id, &item.size)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Size {} is not offered for {}",
                        item.size, product.name
                    ))
                })?;

            if !self
                .products
                .decrement_stock(&txn, product.id, &item.size, item.quantity)
                .await?
            {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} left of {} in size {}",
                    size.stock, product.name, item.size
                )));
            }

            subtotal += product.price * Decimal::from(item.quantity);
            lines.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                name: Set(product.name),
                unit_price: Set(product.price),
                quantity: Set(item.quantity),
                size: Set(item.size.clone()),
                position: Set(position as i32),
            });
        }

        let totals = self.pricing.totals(subtotal);
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            user_id: Set(request.user_id),
            subtotal: Set(totals.subtotal),
            tax: Set(totals.tax),
            shipping: Set(totals.shipping),
            total: Set(totals.total),
            currency: Set(self.pricing.currency.clone()),
            payment_status: Set(PaymentStatus::Pending),
            payment_id: Set(None),
            razorpay_order_id: Set(None),
            payment_failure_reason: Set(None),
            status: Set(OrderStatus::Pending),
            ..Default::default()
        };

        let order = self.orders.insert_with_items(&txn, order, lines).await?;
        txn.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order placed"
        );

        self.details(order.id).await
    }

    /// Order with its lines, or NotFound
    pub async fn details(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let (order, items) = self
            .orders
            .find_with_items(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        Ok(OrderDetails { order, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rules(threshold: Option<Decimal>) -> PricingRules {
        PricingRules {
            currency: "INR".into(),
            tax_rate: dec!(0.18),
            shipping_fee: dec!(50),
            free_shipping_threshold: threshold,
        }
    }

    #[test]
    fn charges_shipping_below_threshold() {
        let totals = rules(Some(dec!(1000))).totals(dec!(499.99));
        assert_eq!(totals.subtotal, dec!(499.99));
        assert_eq!(totals.tax, dec!(90.00));
        assert_eq!(totals.shipping, dec!(50));
        assert_eq!(totals.total, dec!(639.99));
    }

    #[test]
    fn free_shipping_at_threshold() {
        let totals = rules(Some(dec!(1000))).totals(dec!(1000));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec!(1180.00));
    }

    #[test]
    fn no_threshold_always_charges_shipping() {
        let totals = rules(None).totals(dec!(5000));
        assert_eq!(totals.shipping, dec!(50));
    }

    #[test]
    fn order_number_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }
}
