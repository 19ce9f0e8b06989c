//! HTTP API Layer
//!
//! REST API for the field service billing engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for work orders, invoices and health
//! - **Middleware**: Tracing and audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Domain errors mapped to consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(store, Arc::new(SystemClock), config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use core_kernel::{Clock, HealthCheckable};
use domain_billing::{BillingEngine, BillingStore, InvoiceSequence};
use domain_workorder::{WorkOrderPort, WorkOrderService};

use crate::config::ApiConfig;
use crate::middleware::audit_middleware;
use crate::handlers::{health, invoices, work_orders};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: BillingEngine,
    pub work_orders: WorkOrderService,
    pub health: Arc<dyn HealthCheckable>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// Wires the engine and services over a single store implementing every port
    pub fn new<S>(store: Arc<S>, clock: Arc<dyn Clock>, config: ApiConfig) -> Self
    where
        S: WorkOrderPort + BillingStore + InvoiceSequence + HealthCheckable,
    {
        let engine = BillingEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
            config.billing.clone(),
        );
        let work_orders = WorkOrderService::new(store.clone(), clock);
        Self {
            engine,
            work_orders,
            health: store,
            config: Arc::new(config),
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let work_order_routes = Router::new()
        .route("/", post(work_orders::open_work_order))
        .route("/:id", get(work_orders::get_work_order))
        .route("/:id/schedule", post(work_orders::schedule))
        .route("/:id/start", post(work_orders::start))
        .route("/:id/hold", post(work_orders::hold))
        .route("/:id/complete", post(work_orders::complete))
        .route("/:id/cancel", post(work_orders::cancel))
        .route("/:id/technician", put(work_orders::assign_technician))
        .route("/:id/time-entries", post(work_orders::log_time))
        .route("/:id/materials", post(work_orders::add_material))
        .route(
            "/:id/invoice",
            post(invoices::generate_invoice).get(invoices::get_work_order_invoice),
        );

    let invoice_routes = Router::new()
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/payments", post(invoices::record_payment))
        .route("/:id/send", post(invoices::send_invoice));

    let api_routes = Router::new()
        .nest("/work-orders", work_order_routes)
        .nest("/invoices", invoice_routes)
        .layer(axum_middleware::from_fn(audit_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
