#![deny(unused)]
//! Governance for Photo Advisor.
//!
//! This crate provides:
//! - Best-effort audit notifications (Telegram)
//! - Log and trace subscriber setup
//! - Prometheus metrics

pub mod metrics;
pub mod notifier;
pub mod tracing_layer;

pub use metrics::{setup_metrics_recorder, track_analysis, track_notification, track_request};
pub use notifier::{audit_message, create_notifier, NoopNotifier, TelegramNotifier};
pub use tracing_layer::configure_tracing;
