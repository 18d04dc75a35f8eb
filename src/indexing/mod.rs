pub mod cancel;
pub mod conventions;
pub mod extractor;
pub mod framework;
pub mod logger;
pub mod processor;

pub use cancel::CancellationToken;
pub use conventions::{ConventionDetector, PatternConventionDetector};
pub use extractor::extract_package;
pub use logger::{AnalysisLogger, LogFacade, MemoryLogger};
pub use processor::{Analyzer, WorkUnit};
