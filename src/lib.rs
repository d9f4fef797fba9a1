//! Meridian - clinical records to FHIR export tool
//!
//! Meridian reads per-admission clinical record graphs from a relational
//! source, renders them into FHIR resources and submits them as atomic
//! transaction bundles, chunked under a configurable size threshold.
//! Bundles flow through a bounded FIFO queue to a set of configurable
//! sinks (console, file, FHIR server).

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod domain;
pub mod logging;
