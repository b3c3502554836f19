pub mod error;
pub mod lifecycle;
pub mod mock;
pub mod orchestrator;
pub mod source;
pub mod transcriber;

pub use error::EngineError;
pub use lifecycle::{JobController, JobOutcome, JobPolicy};
pub use orchestrator::BatchOrchestrator;
pub use source::HttpAudioSource;
pub use transcriber::{HttpTranscriber, TranscriberConfig};
