//! Job store: the only owner of the job document.
//!
//! Every mutation is a full read-modify-write of the document, run as one
//! task on the [`WriteQueue`]. Reads go straight to the file and are not
//! ordered against each other or against queued writes.

use std::path::PathBuf;

use tracing::{info, warn};
use uuid::Uuid;

use super::model::{Job, JobDocument, JobStatus, NewJob};
use crate::error::{JobError, StorageError};
use crate::store::{JsonDocument, WriteQueue};

/// File-backed job store.
pub struct JobStore {
    document: JsonDocument,
    writes: WriteQueue,
}

impl JobStore {
    /// Open a store over the document at `path`. The file need not exist yet.
    /// Must be called inside a Tokio runtime.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            document: JsonDocument::new(path),
            writes: WriteQueue::new(),
        }
    }

    /// Number of writes queued or running.
    pub fn pending_writes(&self) -> usize {
        self.writes.pending()
    }

    /// Create a pending job. Resolves once the job is on disk.
    pub async fn create(&self, input: NewJob) -> Result<Job, JobError> {
        input.validate()?;

        let job = Job::new(input.title, input.description);
        let document = self.document.clone();
        let record = job.clone();

        self.writes
            .submit(move || async move {
                let mut contents = document.load().await?;
                contents.insert(record)?;
                document.save(&contents).await?;
                Ok::<_, StorageError>(())
            })
            .await?;

        info!(job_id = %job.id, title = %job.title, "Job created");
        Ok(job)
    }

    /// All jobs. An absent or unreadable document reads as empty.
    pub async fn find_all(&self) -> Vec<Job> {
        self.read_lenient().await.into_jobs()
    }

    /// One job by ID.
    pub async fn find_one(&self, id: &str) -> Result<Job, JobError> {
        let not_found = || JobError::NotFound { id: id.to_string() };

        let id = Uuid::parse_str(id).map_err(|_| not_found())?;
        self.read_lenient()
            .await
            .get(id)
            .cloned()
            .ok_or_else(not_found)
    }

    /// Jobs whose title contains `title` and whose status equals `status`.
    pub async fn search(&self, title: Option<&str>, status: Option<JobStatus>) -> Vec<Job> {
        self.find_all()
            .await
            .into_iter()
            .filter(|job| job.matches(title, status))
            .collect()
    }

    /// Move every pending job to completed in one write. Returns the jobs
    /// that changed; nothing is written when none were pending.
    pub async fn complete_pending_jobs(&self) -> Result<Vec<Job>, JobError> {
        let document = self.document.clone();

        let completed = self
            .writes
            .submit(move || async move {
                let mut contents = document.load().await?;
                let completed = contents.complete_pending();
                if !completed.is_empty() {
                    document.save(&contents).await?;
                }
                Ok::<_, StorageError>(completed)
            })
            .await?;

        if !completed.is_empty() {
            info!(count = completed.len(), "Pending jobs completed");
        }
        Ok(completed)
    }

    async fn read_lenient(&self) -> JobDocument {
        match self.document.load().await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "Job document unreadable, treating as empty");
                JobDocument::default()
            }
        }
    }
}
