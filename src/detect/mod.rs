pub mod differ;

pub use differ::{detect_new_records, DetectionSummary};
