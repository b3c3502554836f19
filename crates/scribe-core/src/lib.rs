pub mod errors;
pub mod job;
pub mod locator;
pub mod plan;
pub mod source;
pub mod transcriber;

pub use errors::{InferenceError, LocatorError, PlanError, RecordError, SourceError};
pub use job::{JobRecord, JobStatus};
pub use locator::Locator;
pub use plan::{ByteRange, ChunkPlan, DEFAULT_CHUNK_SIZE, DEFAULT_PARALLELISM};
pub use source::{AudioSource, SourceMetadata};
pub use transcriber::Transcriber;
