//! Persistence layer: the serial write lane and the JSON document file.

pub mod document;
pub mod write_queue;

pub use document::JsonDocument;
pub use write_queue::WriteQueue;
