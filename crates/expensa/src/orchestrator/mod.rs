//! Job submission: validate a batch, store each document, dispatch it.

pub mod submit;
pub mod validation;

pub use submit::{InlineResult, JobOrchestrator, SubmitOutcome};
pub use validation::DocumentValidator;
