//! Local filesystem storage implementation.
//!
//! Records are appended as JSON lines to `{root}/{source}.jsonl`. The root
//! directory must already exist.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{NormalizedRecord, Source};
use crate::storage::RecordStore;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// File receiving records of one source.
    pub fn path_for(&self, source: Source) -> PathBuf {
        self.root_dir.join(format!("{}.jsonl", source.as_str()))
    }

    /// Append serialized lines to a file, creating the file but never the directory.
    async fn append_lines(&self, path: &Path, lines: &[u8]) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(lines).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for LocalStorage {
    fn destination(&self) -> String {
        self.root_dir.display().to_string()
    }

    async fn verify(&self) -> Result<()> {
        match tokio::fs::metadata(&self.root_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(AppError::store(format!(
                "{} is not a directory",
                self.root_dir.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::store(format!(
                "directory {} does not exist",
                self.root_dir.display()
            ))),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn insert(&self, records: &[NormalizedRecord]) -> Result<usize> {
        let mut written = 0;
        for source in Source::ALL {
            let mut buffer = Vec::new();
            let mut count = 0;
            for record in records.iter().filter(|r| r.source == source) {
                serde_json::to_writer(&mut buffer, record)?;
                buffer.push(b'\n');
                count += 1;
            }
            if count == 0 {
                continue;
            }

            let path = self.path_for(source);
            self.append_lines(&path, &buffer).await?;
            log::debug!("Appended {} records to {}", count, path.display());
            written += count;
        }
        Ok(written)
    }
}
