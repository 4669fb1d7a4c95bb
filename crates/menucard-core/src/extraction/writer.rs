//! Atomic text report output.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{MenuError, Result};
use crate::models::menu::ExtractedRecord;

/// Writes records to a temporary file next to the target and renames it
/// into place on [`commit`](Self::commit).
///
/// Dropping an uncommitted writer deletes the temporary file, so a failed
/// run never leaves a partial report behind.
pub struct ReportWriter {
    path: PathBuf,
    file: BufWriter<NamedTempFile>,
    lines: usize,
}

impl ReportWriter {
    /// Open a temporary file in the target's directory.
    pub fn create(path: &Path) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp = NamedTempFile::new_in(dir).map_err(|source| MenuError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Writing report via {}", temp.path().display());

        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(temp),
            lines: 0,
        })
    }

    /// Append one record as a line.
    pub fn append(&mut self, record: &ExtractedRecord) -> Result<()> {
        writeln!(self.file, "{record}").map_err(|source| self.write_error(source))?;
        self.lines += 1;
        Ok(())
    }

    /// Number of lines appended so far.
    pub fn len(&self) -> usize {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Flush and move the report to its final path.
    pub fn commit(self) -> Result<PathBuf> {
        let path = self.path;
        let temp = self.file.into_inner().map_err(|e| MenuError::OutputWrite {
            path: path.clone(),
            source: e.into_error(),
        })?;

        temp.persist(&path).map_err(|e| MenuError::OutputWrite {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(path)
    }

    fn write_error(&self, source: std::io::Error) -> MenuError {
        MenuError::OutputWrite {
            path: self.path.clone(),
            source,
        }
    }
}
