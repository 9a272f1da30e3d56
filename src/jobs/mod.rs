//! Jobs: data model, file-backed store, and HTTP routes.

pub mod model;
pub mod routes;
pub mod store;

pub use model::{Job, JobDocument, JobStatus, NewJob};
pub use routes::job_routes;
pub use store::JobStore;
