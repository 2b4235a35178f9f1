pub mod admin;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod users;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    gateway::{GatewaySecrets, PaymentGateway},
    repositories::{OrderRepository, ProductRepository},
    services::{
        accounts::AccountService,
        checkout::{CheckoutService, PricingRules},
        payment_failures::PaymentFailureService,
        payment_intents::PaymentIntentService,
        payment_reconciliation::PaymentReconciliationService,
        payment_verification::PaymentVerificationService,
        payment_webhooks::PaymentWebhookService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub gateway: Arc<dyn PaymentGateway>,
    pub payment_intents: Arc<PaymentIntentService>,
    pub payment_verification: Arc<PaymentVerificationService>,
    pub payment_webhooks: Arc<PaymentWebhookService>,
    pub payment_failures: Arc<PaymentFailureService>,
    pub reconciliation: Arc<PaymentReconciliationService>,
    pub checkout: Arc<CheckoutService>,
    pub accounts: Arc<AccountService>,
}

impl AppServices {
    /// Builds every service around one shared gateway client
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let orders = OrderRepository::new(db_pool.clone());
        let products = ProductRepository::new(db_pool.clone());
        let secrets = GatewaySecrets::from_config(&config.razorpay);

        Self {
            payment_intents: Arc::new(PaymentIntentService::new(orders.clone(), gateway.clone())),
            payment_verification: Arc::new(PaymentVerificationService::new(
                orders.clone(),
                gateway.clone(),
                secrets.clone(),
            )),
            payment_webhooks: Arc::new(PaymentWebhookService::new(orders.clone(), secrets)),
            payment_failures: Arc::new(PaymentFailureService::new(
                orders.clone(),
                products.clone(),
            )),
            reconciliation: Arc::new(PaymentReconciliationService::new(
                orders.clone(),
                gateway.clone(),
                config.reconciliation.clone(),
            )),
            checkout: Arc::new(CheckoutService::new(
                orders,
                products,
                PricingRules::from(config),
            )),
            accounts: Arc::new(AccountService::new(db_pool)),
            gateway,
        }
    }
}
