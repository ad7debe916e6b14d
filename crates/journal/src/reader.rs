//! JSONL journal reader - sequential reader for replay

use crate::error::JournalError;
use betledger_ledger::LedgerEntry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Sequential journal reader for startup replay
pub struct JournalReader {
    files: Vec<std::path::PathBuf>,
}

impl JournalReader {
    /// Create a reader over every JSONL file in a journal directory
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref();
        let mut files = Vec::new();

        if path.exists() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let file_path = entry.path();
                if file_path.extension().map_or(false, |ext| ext == "jsonl") {
                    files.push(file_path);
                }
            }
        }

        files.sort();

        Ok(Self { files })
    }

    /// Read all entries from all files in date order
    pub fn read_all(&self) -> Result<Vec<LedgerEntry>, JournalError> {
        let mut entries = Vec::new();

        for file_path in &self.files {
            let file = File::open(file_path)?;
            let reader = BufReader::new(file);

            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: LedgerEntry = serde_json::from_str(&line)?;
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// The last journaled entry, if any
    pub fn last_entry(&self) -> Result<Option<LedgerEntry>, JournalError> {
        Ok(self.read_all()?.into_iter().last())
    }

    /// Count entries across all files
    pub fn count(&self) -> Result<usize, JournalError> {
        Ok(self.read_all()?.len())
    }
}
