pub mod models;

pub use models::processing_log::{ProcessingLog, ProcessingStatus};
