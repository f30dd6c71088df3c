pub mod analysis;
pub mod extraction;
pub mod job;
pub mod signal;
pub mod upload;

pub use analysis::{BoundingBox, ExpenseDocument, ExpenseField, RawAnalysisPage};
pub use extraction::{ExtractedPage, Extraction, FieldMap, FieldValue, PageLineItems, PageSummary};
pub use job::{AnalysisJob, BoundingBoxStatus, JobRecord, JobStatus};
pub use signal::{CompletionSignal, SignalStatus};
pub use upload::{DocumentError, DocumentUpload, ErrorCode, UploadBatch, UploadRequest};
