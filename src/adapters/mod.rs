//! External integrations
//!
//! - [`source`] - the thin read-only query layer over the clinical store
//! - [`sink`] - destinations finished bundles are delivered to

pub mod sink;
pub mod source;
