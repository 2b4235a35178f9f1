use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Checkout, payment capture and payment reconciliation for the storefront.

## Payment flow

1. `POST /orders` prices the cart from the catalog and reserves stock.
2. `POST /payments/create-order` opens a Razorpay order for it.
3. The payment is settled by `POST /payments/verify` (browser) or
   `POST /payments/webhook` (gateway), whichever arrives first.
4. `POST /payments/failure` cancels the order and restores stock.
5. `GET /admin/verify-payments` audits paid orders against the gateway.

## Error Handling

Failures share one envelope:

```json
{
  "success": false,
  "message": "Payment verification failed: invalid signature",
  "error": "Unauthorized",
  "request_id": "7f8e0c7e-1c3a-4b7e-9a55-1d3f5d1a2b3c",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Checkout and order lookup"),
        (name = "Payments", description = "Payment capture endpoints"),
        (name = "Admin", description = "Payment reconciliation"),
        (name = "Users", description = "Account management"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,

        // Payments
        crate::handlers::payments::create_payment_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::payments::record_payment_failure,
        crate::handlers::payments::get_payment_details,
        crate::handlers::payment_webhooks::payment_webhook,

        // Admin
        crate::handlers::admin::verify_payments,
        crate::handlers::admin::verify_order_payment,

        // Users
        crate::handlers::users::delete_user,

        // Health
        crate::handlers::health::health,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::entities::order::Model,
            crate::entities::order::PaymentStatus,
            crate::entities::order::OrderStatus,
            crate::entities::order_item::Model,
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CheckoutItem,
            crate::services::checkout::OrderDetails,
            crate::services::payment_intents::CreatePaymentIntent,
            crate::services::payment_intents::PaymentIntent,
            crate::services::payment_verification::VerifyPayment,
            crate::services::payment_failures::RecordPaymentFailure,
            crate::services::payment_failures::PaymentFailureReport,
            crate::services::payment_webhooks::WebhookOutcome,
            crate::services::payment_reconciliation::ReconciliationReport,
            crate::services::payment_reconciliation::OrderReconciliation,
            crate::services::accounts::AccountDeletion,
            crate::gateway::GatewayPayment,
            crate::handlers::health::HealthResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
