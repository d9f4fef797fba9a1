//! Core domain types and models
//!
//! This module contains the domain types used throughout Meridian:
//! the error taxonomy, transaction bundle entries and the builder-boundary
//! record structs supplied by the source adapter.

pub mod entry;
pub mod errors;
pub mod records;
pub mod result;

// Re-export commonly used types
pub use entry::{ResourceEntry, ResourceType};
pub use errors::MeridianError;
pub use result::Result;
