pub mod classifier;
pub mod reconcile;

pub use reconcile::{export_for_review, import_reviewed, reprocess_flagged, ReviewWorkspace};
