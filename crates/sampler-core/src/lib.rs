//! # sampler-core
//!
//! Core types and error handling shared by the Sampler crates.

pub mod error;
pub mod location;

pub use error::{Error, HttpError, Result};
pub use location::Location;
