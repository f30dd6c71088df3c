pub mod completion;

pub use completion::{CompletionWorker, WorkerSummary};
