//! Text preparation for speech synthesis
//!
//! This crate turns arbitrary documents into speakable utterances:
//! - **Normalization**: an ordered pipeline of cleanup passes plus the
//!   validity predicate deciding which lines deserve synthesis
//! - **Markdown extraction**: CommonMark walk emitting prose sentences,
//!   skipping code, headings, tables and images
//! - **Length fitting**: shortening fragments to a backend's text limit

mod markdown;
mod normalizer;
mod patterns;

pub use markdown::MarkdownExtractor;
pub use normalizer::TextNormalizer;
