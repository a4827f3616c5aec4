// Pipeline — per-file analysis and the batch loop around it.

pub mod batch;
pub mod run;
pub mod samples;

pub use batch::{discover_files, run_batch, BatchSummary, FileOutcome, FileSummary};
pub use run::{analyze, process_file, Analysis, AnnotatedReview, FileReport};
pub use samples::{review_samples, SampleRow, Side};
