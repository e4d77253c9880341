//! Structured workout extraction.
//!
//! Given a user utterance and a little recent conversation, asks a
//! [`StructuredBackend`](liftlog_llm::StructuredBackend) for a JSON array of
//! workout records, then cleans, decodes and validates whatever comes back.
//! Every failure mode collapses to "no records"; callers never see an error.

pub mod context;
pub mod extractor;
pub mod parse;
pub mod prompt;
pub mod validate;

pub use context::{DEFAULT_MAX_HISTORY, render_context};
pub use extractor::WorkoutExtractor;
pub use parse::{ExtractionOutcome, clean_response, interpret};
pub use validate::{read_candidate, validate_candidate};
