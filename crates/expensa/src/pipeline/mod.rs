pub mod completion;
pub mod context;
pub mod error;
pub mod guard;
pub mod results;

pub use completion::{CompletionHandler, CompletionOutcome};
pub use context::{Collaborators, CompletionContext};
pub use error::{PipelineError, PipelineWarning};
pub use guard::NotifyGuard;
pub use results::{process_pages, AnalysisResults};
