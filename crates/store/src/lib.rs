#![deny(unused)]
//! Ephemeral image storage for Photo Advisor.
//!
//! Uploads are written to a scratch directory for the duration of one request
//! and removed afterwards. A background sweeper removes anything a crashed
//! request left behind.

pub mod ephemeral;

pub use ephemeral::EphemeralFileStore;
