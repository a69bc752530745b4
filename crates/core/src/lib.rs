#![deny(unused)]
//! Core types, traits, and error definitions for Photo Advisor.
//!
//! This crate provides the building blocks shared by the store, inference,
//! governance and gateway crates.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use traits::*;
pub use types::*;
