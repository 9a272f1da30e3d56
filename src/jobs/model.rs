//! Job data model: records, status, and the persisted document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{JobError, StorageError};

/// Lifecycle status. Moves pending → completed only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            other => Err(JobError::InvalidInput {
                field: "status".to_string(),
                reason: format!("unknown status '{other}', expected pending or completed"),
            }),
        }
    }
}

/// A single tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique ID, fixed at creation.
    pub id: Uuid,
    /// Short title, fixed at creation.
    pub title: String,
    /// Free-form description, fixed at creation.
    pub description: String,
    /// Lifecycle status.
    pub status: JobStatus,
}

impl Job {
    /// Create a new pending job with a fresh ID.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            status: JobStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }

    /// Title substring (case-sensitive) AND exact status. `None` matches anything.
    pub fn matches(&self, title: Option<&str>, status: Option<JobStatus>) -> bool {
        let title_ok = title.is_none_or(|t| self.title.contains(t));
        let status_ok = status.is_none_or(|s| self.status == s);
        title_ok && status_ok
    }
}

/// Caller input for creating a job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl NewJob {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Reject input before any write is attempted.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.title.trim().is_empty() {
            return Err(JobError::InvalidInput {
                field: "title".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// The whole persisted state: every job keyed by ID.
///
/// Serialized as `{"jobs": {"<id>": {..}, ..}}`. Records keep the order in
/// which they were inserted, both in memory and on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDocument {
    #[serde(default, with = "ordered_jobs")]
    jobs: Vec<Job>,
}

impl JobDocument {
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn into_jobs(self) -> Vec<Job> {
        self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Append a job. IDs are unique within a document.
    pub fn insert(&mut self, job: Job) -> Result<(), StorageError> {
        if self.get(job.id).is_some() {
            return Err(StorageError::DuplicateId {
                id: job.id.to_string(),
            });
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Mark every pending job completed. Returns the transitioned records.
    pub fn complete_pending(&mut self) -> Vec<Job> {
        let mut completed = Vec::new();
        for job in self.jobs.iter_mut().filter(|j| j.is_pending()) {
            job.status = JobStatus::Completed;
            completed.push(job.clone());
        }
        completed
    }
}

/// Serde adapter: `Vec<Job>` <-> JSON object keyed by job ID, order preserved.
mod ordered_jobs {
    use std::collections::HashSet;
    use std::fmt;

    use serde::de::{Error, MapAccess, Visitor};
    use serde::{Deserializer, Serializer};

    use uuid::Uuid;

    use super::Job;

    pub fn serialize<S: Serializer>(jobs: &[Job], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(jobs.iter().map(|job| (job.id, job)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Job>, D::Error> {
        deserializer.deserialize_map(JobsVisitor)
    }

    struct JobsVisitor;

    impl<'de> Visitor<'de> for JobsVisitor {
        type Value = Vec<Job>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object of jobs keyed by id")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut jobs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            let mut seen = HashSet::with_capacity(jobs.capacity());
            while let Some((key, job)) = map.next_entry::<String, Job>()? {
                if key.parse::<Uuid>().ok() != Some(job.id) {
                    return Err(A::Error::custom(format_args!(
                        "job keyed as {key} has id {}",
                        job.id
                    )));
                }
                if !seen.insert(job.id) {
                    return Err(A::Error::custom(format_args!("duplicate job id {key}")));
                }
                jobs.push(job);
            }
            Ok(jobs)
        }
    }
}
