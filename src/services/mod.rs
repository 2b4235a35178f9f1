// Payment lifecycle
pub mod payment_failures;
pub mod payment_intents;
pub mod payment_reconciliation;
pub mod payment_verification;
pub mod payment_webhooks;

// Storefront
pub mod accounts;
pub mod checkout;

#[cfg(test)]
pub(crate) mod test_support;
