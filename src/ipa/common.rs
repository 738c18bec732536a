//! Common utilities module
//!
//! This module contains shared utilities used across the IPA.

pub mod error;

pub use error::{IpaError, Result};
