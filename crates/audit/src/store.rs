//! JSONL audit store - date-rotated append-only sink

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::sink::AuditSink;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Default)]
struct Inner {
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
}

/// Append-only JSONL audit log, one file per UTC day
pub struct JsonlAuditStore {
    base_path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonlAuditStore {
    /// Create an audit store writing into the given directory
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn rotate_file(&self, inner: &mut Inner, date: &str) -> Result<(), AuditError> {
        if let Some(ref mut writer) = inner.current_file {
            writer.flush()?;
        }

        let file_path = self.base_path.join(format!("{}.jsonl", date));
        let file = OpenOptions::new().create(true).append(true).open(&file_path)?;

        inner.current_file = Some(BufWriter::new(file));
        inner.current_date = Some(date.to_string());
        Ok(())
    }
}

impl AuditSink for JsonlAuditStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let mut inner = self.inner.lock();

        if inner.current_date.as_ref() != Some(&date) {
            self.rotate_file(&mut inner, &date)?;
        }

        if let Some(ref mut writer) = inner.current_file {
            let json = serde_json::to_string(event)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }

        Ok(())
    }
}
