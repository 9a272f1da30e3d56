//! Job Tracker: file-backed job store with serialized writes and batch completion.

pub mod config;
pub mod error;
pub mod jobs;
pub mod scheduler;
pub mod store;
