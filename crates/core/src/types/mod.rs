//! Core type definitions for Photo Advisor.
//!
//! Everything here lives for at most one request.

pub mod notification;
pub mod request;
pub mod result;
pub mod upload;

pub use notification::*;
pub use request::*;
pub use result::*;
pub use upload::*;
