use super::{DocumentCollection, DocumentFilter};
use crate::error::ArchiveError;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// File-backed collection storing one JSON document per line.
///
/// Used when no document database is configured but a local data
/// directory is.
#[derive(Debug)]
pub struct JsonlCollection {
    name: String,
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlCollection {
    /// Open (or create) `{root}/{name}.jsonl`.
    pub fn open(root: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, ArchiveError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let name = name.into();
        let path = root.join(format!("{name}.jsonl"));
        info!("initialized jsonl collection (path={})", path.display());
        Ok(Self {
            name,
            path,
            lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("jsonl.tmp")
    }

    fn load_documents(&self) -> Result<Vec<Value>, ArchiveError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(&self.path)?;
        let reader = BufReader::new(file);
        let mut documents = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let document: Value = serde_json::from_str(&line).map_err(|err| {
                ArchiveError::Decode(format!("{}:{}: {err}", self.path.display(), index + 1))
            })?;
            documents.push(document);
        }
        Ok(documents)
    }

    fn write_documents(&self, documents: &[Value]) -> Result<(), ArchiveError> {
        let temp_path = self.temp_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            for document in documents {
                writeln!(file, "{}", encode_line(document)?)?;
            }
        }
        std::fs::rename(temp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentCollection for JsonlCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Value) -> Result<(), ArchiveError> {
        let line = encode_line(&document)?;
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    async fn find(&self, filter: &DocumentFilter) -> Result<Vec<Value>, ArchiveError> {
        let documents = {
            let _guard = self.lock.lock();
            self.load_documents()?
        };
        let matched: Vec<Value> = documents
            .into_iter()
            .filter(|document| filter.matches(document))
            .collect();
        debug!(
            "scanned jsonl collection (name={}, matched={})",
            self.name,
            matched.len()
        );
        Ok(matched)
    }

    async fn upsert_one(
        &self,
        filter: &DocumentFilter,
        document: Value,
    ) -> Result<(), ArchiveError> {
        let _guard = self.lock.lock();
        let mut documents = self.load_documents()?;
        match documents.iter_mut().find(|existing| filter.matches(existing)) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        self.write_documents(&documents)
    }
}

fn encode_line(document: &Value) -> Result<String, ArchiveError> {
    serde_json::to_string(document).map_err(|err| ArchiveError::Encode(err.to_string()))
}
