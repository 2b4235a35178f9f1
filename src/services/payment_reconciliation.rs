use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::ReconciliationConfig;
use crate::entities::order::{Model as OrderModel, PaymentStatus};
use crate::errors::ServiceError;
use crate::gateway::{
    amounts_match, from_minor_units, GatewayError, GatewayPayment, PaymentGateway,
};
use crate::repositories::OrderRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscrepancyKind {
    MissingPaymentId,
    AmountMismatch,
    StatusMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
}

impl DiscrepancyKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::MissingPaymentId | Self::AmountMismatch => Severity::High,
            Self::StatusMismatch => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMatch {
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_id: String,
    pub amount: Decimal,
    pub gateway_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDiscrepancy {
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    pub order_total: Decimal,
    pub gateway_amount: Option<Decimal>,
    /// Gateway amount minus order total
    pub delta: Option<Decimal>,
    pub local_status: PaymentStatus,
    pub gateway_status: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationFailure {
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub total: usize,
    pub matched: usize,
    pub discrepancies: usize,
    pub errors: usize,
    /// Share of examined orders that matched, one decimal place
    pub match_percentage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub summary: ReconciliationSummary,
    pub matches: Vec<PaymentMatch>,
    pub discrepancies: Vec<PaymentDiscrepancy>,
    pub errors: Vec<ReconciliationFailure>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Match,
    Discrepancy,
    Error,
}

/// Result of checking one order against the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderReconciliation {
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_status: PaymentStatus,
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<PaymentMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrepancy: Option<PaymentDiscrepancy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReconciliationFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Match(PaymentMatch),
    Discrepancy(PaymentDiscrepancy),
    Error(ReconciliationFailure),
}

fn discrepancy(
    order: &OrderModel,
    kind: DiscrepancyKind,
    payment: Option<&GatewayPayment>,
    message: String,
) -> Classification {
    let gateway_amount = payment.map(GatewayPayment::amount_major);
    Classification::Discrepancy(PaymentDiscrepancy {
        order_id: order.id,
        order_number: order.order_number.clone(),
        payment_id: order.payment_id.clone(),
        kind,
        severity: kind.severity(),
        order_total: order.total.round_dp(2),
        gateway_amount,
        delta: gateway_amount.map(|amount| amount - order.total.round_dp(2)),
        local_status: order.payment_status,
        gateway_status: payment.map(|p| p.status.clone()),
        message,
    })
}

/// Gateway status a consistent order would show
fn gateway_status_agrees(local: PaymentStatus, payment: &GatewayPayment) -> bool {
    match local {
        PaymentStatus::Paid => payment.is_settled(),
        PaymentStatus::Refunded => payment.status == "refunded",
        PaymentStatus::Pending | PaymentStatus::Failed => !payment.is_settled(),
    }
}

/// Classifies one order against the gateway's answer for its payment.
/// Amount drift outranks status drift.
pub fn classify(
    order: &OrderModel,
    lookup: Result<GatewayPayment, GatewayError>,
) -> Classification {
    let payment = match lookup {
        Ok(payment) => payment,
        Err(err) => {
            return Classification::Error(ReconciliationFailure {
                order_id: order.id,
                order_number: order.order_number.clone(),
                payment_id: order.payment_id.clone(),
                error: err.to_string(),
            })
        }
    };

    if !amounts_match(order.total, payment.amount) {
        return discrepancy(
            order,
            DiscrepancyKind::AmountMismatch,
            Some(&payment),
            format!(
                "Gateway amount {} differs from order total {}",
                from_minor_units(payment.amount),
                order.total.round_dp(2)
            ),
        );
    }

    if !gateway_status_agrees(order.payment_status, &payment) {
        return discrepancy(
            order,
            DiscrepancyKind::StatusMismatch,
            Some(&payment),
            format!(
                "Gateway status {} disagrees with local status {}",
                payment.status, order.payment_status
            ),
        );
    }

    let amount = payment.amount_major();
    Classification::Match(PaymentMatch {
        order_id: order.id,
        order_number: order.order_number.clone(),
        payment_id: payment.id,
        amount,
        gateway_status: payment.status,
    })
}

/// Percentage of `matched` over `total`, one decimal place
pub fn match_percentage(matched: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(matched as u64) * Decimal::ONE_HUNDRED / Decimal::from(total as u64))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Audits local payment state against the gateway
#[derive(Clone)]
pub struct PaymentReconciliationService {
    orders: OrderRepository,
    gateway: Arc<dyn PaymentGateway>,
    config: ReconciliationConfig,
}

impl PaymentReconciliationService {
    pub fn new(
        orders: OrderRepository,
        gateway: Arc<dyn PaymentGateway>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            orders,
            gateway,
            config,
        }
    }

    /// Re-checks the most recent paid orders against the gateway
    #[instrument(skip(self), fields(batch_limit = self.config.batch_limit))]
    pub async fn run(&self) -> Result<ReconciliationReport, ServiceError> {
        let orders = self.orders.recent_paid(self.config.batch_limit).await?;
        info!(order_count = orders.len(), "Starting payment reconciliation");

        let delay = self.config.request_delay();
        let mut matches = Vec::new();
        let mut discrepancies = Vec::new();
        let mut errors = Vec::new();
        let mut gateway_calls = 0usize;

        for order in &orders {
            let classification = match order.payment_id.as_deref() {
                None => discrepancy(
                    order,
                    DiscrepancyKind::MissingPaymentId,
                    None,
                    "Paid order has no payment id".to_string(),
                ),
                Some(payment_id) => {
                    if gateway_calls > 0 && delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    gateway_calls += 1;
                    classify(order, self.gateway.fetch_payment(payment_id).await)
                }
            };

            match classification {
                Classification::Match(m) => matches.push(m),
                Classification::Discrepancy(d) => {
                    warn!(
                        order_id = %d.order_id,
                        kind = %d.kind,
                        severity = %d.severity,
                        "Payment discrepancy"
                    );
                    discrepancies.push(d)
                }
                Classification::Error(e) => {
                    warn!(order_id = %e.order_id, error = %e.error, "Gateway lookup failed");
                    errors.push(e)
                }
            }
        }

        let summary = ReconciliationSummary {
            total: orders.len(),
            matched: matches.len(),
            discrepancies: discrepancies.len(),
            errors: errors.len(),
            match_percentage: match_percentage(matches.len(), orders.len()),
        };

        info!(
            total = summary.total,
            matched = summary.matched,
            discrepancies = summary.discrepancies,
            errors = summary.errors,
            match_percentage = %summary.match_percentage,
            "Payment reconciliation finished"
        );

        Ok(ReconciliationReport {
            summary,
            matches,
            discrepancies,
            errors,
            generated_at: Utc::now(),
        })
    }

    /// Checks a single order regardless of its payment status
    #[instrument(skip(self))]
    pub async fn verify_order(&self, order_id: Uuid) -> Result<OrderReconciliation, ServiceError> {
        let order = self.orders.get(order_id).await?;

        let classification = match order.payment_id.as_deref() {
            None if order.payment_status == PaymentStatus::Paid => discrepancy(
                &order,
                DiscrepancyKind::MissingPaymentId,
                None,
                "Paid order has no payment id".to_string(),
            ),
            None => Classification::Error(ReconciliationFailure {
                order_id: order.id,
                order_number: order.order_number.clone(),
                payment_id: None,
                error: "No gateway payment recorded for this order".to_string(),
            }),
            Some(payment_id) => classify(&order, self.gateway.fetch_payment(payment_id).await),
        };

        let mut result = OrderReconciliation {
            order_id: order.id,
            order_number: order.order_number,
            payment_status: order.payment_status,
            outcome: OutcomeKind::Match,
            matched: None,
            discrepancy: None,
            error: None,
        };
        match classification {
            Classification::Match(m) => result.matched = Some(m),
            Classification::Discrepancy(d) => {
                result.outcome = OutcomeKind::Discrepancy;
                result.discrepancy = Some(d);
            }
            Classification::Error(e) => {
                result.outcome = OutcomeKind::Error;
                result.error = Some(e);
            }
        }
        Ok(result)
    }
}
