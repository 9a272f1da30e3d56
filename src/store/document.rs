//! JSON document file: whole-document load and atomic save.
//!
//! Saves write the full document to a sibling temp file, flush it to disk,
//! then rename it over the target. A reader sees either the previous complete
//! document or the new one, never a partial write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StorageError;
use crate::jobs::model::JobDocument;

/// A job document stored as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
}

impl JsonDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read and parse the whole document. A missing or blank file is empty.
    pub async fn load(&self) -> Result<JobDocument, StorageError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(JobDocument::default()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(JobDocument::default());
        }

        serde_json::from_str(&raw).map_err(|source| StorageError::Serialization {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the whole document on disk.
    pub async fn save(&self, document: &JobDocument) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }

        let json = serde_json::to_vec(document).map_err(|source| {
            StorageError::Serialization {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp_path = self.temp_path();
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(io_err(&tmp_path))?;
        file.write_all(&json).await.map_err(io_err(&tmp_path))?;
        file.sync_all().await.map_err(io_err(&tmp_path))?;
        drop(file);

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(io_err(&self.path))?;

        debug!(path = %self.path.display(), jobs = document.len(), "Document saved");
        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::Job;
    use tempfile::TempDir;

    fn test_document() -> (JsonDocument, TempDir) {
        let dir = TempDir::new().unwrap();
        let doc = JsonDocument::new(dir.path().join("db").join("jobs.json"));
        (doc, dir)
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let (doc, _dir) = test_document();
        assert!(doc.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_file_loads_empty() {
        let (doc, _dir) = test_document();
        std::fs::create_dir_all(doc.path().parent().unwrap()).unwrap();
        std::fs::write(doc.path(), "  \n").unwrap();
        assert!(doc.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_creates_parent_dirs_and_roundtrips() {
        let (doc, _dir) = test_document();
        let mut contents = JobDocument::default();
        contents.insert(Job::new("persist me", "please")).unwrap();

        doc.save(&contents).await.unwrap();
        let loaded = doc.load().await.unwrap();
        assert_eq!(loaded, contents);
    }

    #[tokio::test]
    async fn save_writes_compact_json() {
        let (doc, _dir) = test_document();
        let mut contents = JobDocument::default();
        for i in 0..3 {
            contents.insert(Job::new(format!("job {i}"), "")).unwrap();
        }
        doc.save(&contents).await.unwrap();

        let raw = std::fs::read_to_string(doc.path()).unwrap();
        assert!(!raw.contains('\n'));
        assert_eq!(raw, serde_json::to_string(&contents).unwrap());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let (doc, dir) = test_document();
        doc.save(&JobDocument::default()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("db"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["jobs.json".to_string()]);
    }

    #[tokio::test]
    async fn malformed_file_is_a_serialization_error() {
        let (doc, _dir) = test_document();
        std::fs::create_dir_all(doc.path().parent().unwrap()).unwrap();
        std::fs::write(doc.path(), "{not json").unwrap();
        assert!(matches!(
            doc.load().await,
            Err(StorageError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn reads_hand_written_document() {
        let (doc, _dir) = test_document();
        std::fs::create_dir_all(doc.path().parent().unwrap()).unwrap();
        std::fs::write(
            doc.path(),
            r#"{"jobs":{"7d444840-9dc0-11d1-b245-5ffdce74fad2":{
                "id":"7d444840-9dc0-11d1-b245-5ffdce74fad2",
                "title":"Imported","description":"from disk","status":"completed"}}}"#,
        )
        .unwrap();

        let loaded = doc.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.jobs()[0].title, "Imported");
    }
}
