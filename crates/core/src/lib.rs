//! Core types for the speakdown synthesis pipeline
//!
//! This crate provides the types shared by every stage of the pipeline:
//! - Text fragments and per-fragment synthesis results
//! - Merge reporting
//! - The run-wide error taxonomy

pub mod error;
pub mod fragment;

pub use error::{Error, Result};
pub use fragment::{Fragment, MergeReport, SynthesisResult};
