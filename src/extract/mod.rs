pub mod matcher;
pub mod normalize;
pub mod ocr;
pub mod parser;

pub use matcher::LabelMatcher;
pub use normalize::{normalize, NormalizedCandidate};
pub use ocr::{CommandTranscriber, Transcriber};
pub use parser::extract_candidates;
