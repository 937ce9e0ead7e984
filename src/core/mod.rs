//! Core types for featgroup
//!
//! This module holds the error model shared by every other module:
//!
//! - [`FeatureError`] - Enumerated error types covering all failure modes
//! - [`LoadErrors`] - Collected errors from one load attempt
//! - [`ErrorContext`] - User-friendly error wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to user-friendly format
//!
//! Every fallible library operation returns [`Result`]; loading a feature table
//! returns `Result<FeatureTable, LoadErrors>` so several independent problems can
//! be reported from a single attempt.

pub mod error;

pub use error::{ErrorContext, FeatureError, LoadErrors, Result, user_friendly_error};
