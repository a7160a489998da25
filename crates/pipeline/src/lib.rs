//! The speakdown synthesis pipeline
//!
//! Fragments flow strictly forward:
//! text layer → dispatcher (worker pool + rate limiter) → backend →
//! validator → merger. The orchestrator owns the wiring and the
//! run-scoped cancellation token.

pub mod backend;
pub mod backends;
pub mod dispatcher;
pub mod merger;
pub mod orchestrator;
pub mod rate_limit;
pub mod validator;

pub use backend::{fragment_filename, SynthesisBackend};
pub use backends::{create_backend, list_voices, BackendChoice, VoiceInfo};
pub use dispatcher::Dispatcher;
pub use merger::{digit_run_key, merge_directory, Merger};
pub use orchestrator::{Orchestrator, RunConfig};
pub use rate_limit::RateLimiter;
pub use validator::{AudioCodec, AudioValidator};
