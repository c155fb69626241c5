//! Prometheus collectors for community activity.
//!
//! HTTP request metrics and the `/metrics` handler come from `actix-middleware`.

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge};

lazy_static! {
    /// Open chat WebSocket connections.
    pub static ref CHAT_CONNECTIONS: IntGauge = register_int_gauge!(
        "chat_connections_active",
        "Currently open chat WebSocket connections"
    )
    .expect("failed to register chat_connections_active");

    /// Chat frames handled, by outcome (stored, rejected).
    pub static ref CHAT_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "chat_messages_total",
        "Inbound chat frames segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register chat_messages_total");

    /// Posts, comments and listings created, by app and kind.
    pub static ref CONTENT_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "content_created_total",
        "Content created segmented by app and kind",
        &["app", "kind"]
    )
    .expect("failed to register content_created_total");
}

pub fn record_created(app: &str, kind: &str) {
    CONTENT_CREATED_TOTAL.with_label_values(&[app, kind]).inc();
}
