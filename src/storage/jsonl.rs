//! JSONL (JSON Lines) table files.
//!
//! Each line is a valid JSON object representing one row.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{StorageConfig, StorageError};

/// Tables kept on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Tournaments,
    Categories,
    Registrations,
    Users,
    Matches,
    MatchSets,
}

impl Table {
    /// File name under `<data_dir>/tables/`.
    pub fn filename(&self) -> &'static str {
        match self {
            Table::Tournaments => "tournaments.jsonl",
            Table::Categories => "categories.jsonl",
            Table::Registrations => "registrations.jsonl",
            Table::Users => "users.jsonl",
            Table::Matches => "matches.jsonl",
            Table::MatchSets => "match_sets.jsonl",
        }
    }
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a writer for a table.
    pub fn for_table(config: &StorageConfig, table: Table) -> Self {
        Self::new(config.table_path(table))
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Write rows to a sibling temp file. The target is untouched until
    /// the returned [`StagedFile`] is committed.
    pub fn stage(&self, rows: &[T]) -> Result<StagedFile, StorageError> {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for row in rows {
            let json = serde_json::to_string(row)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        Ok(StagedFile {
            tmp,
            target: self.path.clone(),
            rows: count,
        })
    }

    /// Replace the file contents through a staged temp file.
    pub fn write_all(&self, rows: &[T]) -> Result<usize, StorageError> {
        self.stage(rows)?.commit()
    }
}

/// Rows written to a temp file, waiting to be renamed over their table.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    target: PathBuf,
    rows: usize,
}

impl StagedFile {
    /// Rename the temp file over the target.
    pub fn commit(self) -> Result<usize, StorageError> {
        fs::rename(&self.tmp, &self.target)?;
        debug!("Wrote {} rows to {:?}", self.rows, self.target);
        Ok(self.rows)
    }

    /// Drop the temp file and leave the target as it was.
    pub fn discard(self) {
        if let Err(e) = fs::remove_file(&self.tmp) {
            warn!("Failed to remove {:?}: {}", self.tmp, e);
        }
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a reader for a table.
    pub fn for_table(config: &StorageConfig, table: Table) -> Self {
        Self::new(config.table_path(table))
    }

    /// Check if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all rows. A missing file reads as empty; unparseable lines
    /// are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut rows = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", idx + 1, self.path, e);
                }
            }
        }

        debug!("Read {} rows from {:?}", rows.len(), self.path);
        Ok(rows)
    }
}
