pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use extract::{resolve_date, Extractor, Rule, AMOUNT_RULES, CALENDAR_FORMATS, DATE_RULES};
pub use pipeline::{spawn_intake_watcher, store_upload, PipelineError, ProcessedSlip, SlipPipeline};
pub use preprocess::{normalize_bytes, NormalizedImage, Normalizer, PreprocessError};
pub use recognizer::{default_backend, MockRecognizer, OcrBackend, OcrError, UnavailableRecognizer};
pub use types::{ExtractedFields, ExtractionResult};
