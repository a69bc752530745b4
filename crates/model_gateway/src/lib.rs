#![deny(unused)]
//! Vision inference for Photo Advisor.
//!
//! This crate provides:
//! - Prompt composition around the user's question
//! - The Gemini `generateContent` client
//! - A stand-in client for deployments without credentials

pub mod gemini;
pub mod prompt;
pub mod types;

use std::sync::Arc;

pub use gemini::{GeminiClient, UnconfiguredInferenceClient};
pub use prompt::compose_prompt;

use photo_advisor_core::{config::InferenceConfig, traits::InferenceClient};

/// Pick the inference client for this process.
///
/// Without an API key every call fails fast with a configuration failure.
pub fn create_inference_client(config: &InferenceConfig) -> Arc<dyn InferenceClient> {
    match GeminiClient::new(config) {
        Ok(client) => {
            tracing::info!(model = %config.model, "Gemini inference client configured");
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Inference disabled, every analysis will fail");
            Arc::new(UnconfiguredInferenceClient::new(config.model.clone()))
        }
    }
}
