//! Core traits for Photo Advisor.
//!
//! One trait per pipeline collaborator:
//! - `store`: ephemeral image persistence (ImageStore)
//! - `notifier`: best-effort audit channel (Notifier)
//! - `inference`: remote vision model (InferenceClient)

pub mod inference;
pub mod notifier;
pub mod store;

pub use inference::*;
pub use notifier::*;
pub use store::*;
