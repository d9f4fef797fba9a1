//! Result type alias for Meridian operations

use crate::domain::errors::MeridianError;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, MeridianError>;
