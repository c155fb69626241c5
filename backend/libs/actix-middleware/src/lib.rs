//! # Actix Middleware Library
//!
//! Cross-cutting middleware for Agora actix services
//!
//! ## Modules
//! - `metrics`: Prometheus request metrics and the `/metrics` exposition handler
//! - `correlation_id`: `x-correlation-id` propagation

pub mod correlation_id;
pub mod metrics;

pub use correlation_id::CorrelationIdMiddleware;
pub use metrics::{metrics_handler, MetricsMiddleware};
