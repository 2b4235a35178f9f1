//! Storefront API library
//!
//! Checkout, payment capture and payment reconciliation for the storefront
//! backend. The binary in `main.rs` wires configuration, the database and
//! the payment gateway into [`build_router`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    middleware,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

/// Success envelope: `{success: true, data?, message?, meta}`
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Success without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes without state or middleware
pub fn api_routes() -> Router<AppState> {
    let payments = Router::new()
        .route(
            "/payments/create-order",
            post(handlers::payments::create_payment_order),
        )
        .route("/payments/verify", post(handlers::payments::verify_payment))
        .route(
            "/payments/failure",
            post(handlers::payments::record_payment_failure),
        )
        .route(
            "/payments/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .route(
            "/payments/details/:payment_id",
            get(handlers::payments::get_payment_details),
        );

    let admin = Router::new()
        .route(
            "/admin/verify-payments",
            get(handlers::admin::verify_payments),
        )
        .route(
            "/admin/verify-payments/:order_id",
            get(handlers::admin::verify_order_payment),
        );

    let storefront = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/:order_id", get(handlers::orders::get_order))
        .route("/users/:user_id", delete(handlers::users::delete_user));

    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(payments)
        .merge(admin)
        .merge(storefront)
}

/// Full application router: routes, API docs, request ids and HTTP tracing
pub fn build_router(state: AppState) -> Router {
    api_routes()
        .with_state(state)
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}
