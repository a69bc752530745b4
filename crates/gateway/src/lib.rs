#![deny(unused)]
//! HTTP gateway for Photo Advisor.
//!
//! This crate provides:
//! - The axum router (`/`, `/health`, `/analyze`, `/metrics`)
//! - Multipart form parsing and validation
//! - The analysis pipeline with scoped upload cleanup

pub mod error;
pub mod form;
pub mod pipeline;
pub mod server;

pub use error::ApiError;
pub use form::{AnalyzeForm, FilePart, Submission};
pub use pipeline::{AnalysisPipeline, PipelineSettings};
pub use server::{AppState, GatewayConfig, GatewayServer};
