//! Core export pipeline: translation, chunking and the producer loop

pub mod assembler;
pub mod pipeline;
pub mod transform;

pub use pipeline::{Pipeline, RunSummary};
