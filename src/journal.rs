//! Durable journal of results not yet acknowledged by the coordinator.
//!
//! Results are appended to `pending-results.jsonl` before they are
//! submitted and removed once the coordinator acknowledges them. Entries
//! left behind by a failed submission or a crash are replayed on the next
//! start. A crash before the append still loses the result.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::domain::ResultMetadata;
use crate::error::{AgentError, Result};

/// File name of the journal inside the state directory
pub const JOURNAL_FILE: &str = "pending-results.jsonl";

/// One unacknowledged result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub result: ResultMetadata,
}

/// Append-only JSONL journal with an in-memory copy of pending entries
#[derive(Debug)]
pub struct ResultJournal {
    path: PathBuf,
    entries: Vec<JournalEntry>,
    next_seq: u64,
}

impl ResultJournal {
    /// Open (or create) the journal in `state_dir`
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self> {
        let state_dir = state_dir.as_ref();
        fs::create_dir_all(state_dir)
            .map_err(|e| AgentError::Journal(format!("Failed to create {}: {}", state_dir.display(), e)))?;

        let path = state_dir.join(JOURNAL_FILE);
        let entries = if path.exists() { Self::load(&path)? } else { Vec::new() };

        Ok(Self {
            path,
            next_seq: entries.len() as u64,
            entries,
        })
    }

    fn load(path: &Path) -> Result<Vec<JournalEntry>> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            // A torn final line from a crash mid-append is dropped, not fatal
            match serde_json::from_str::<JournalEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping corrupt journal line {} in {}: {}", index + 1, path.display(), e),
            }
        }

        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pending entries, oldest first
    pub fn pending(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist a result before submission; returns the entry id
    pub fn record(&mut self, result: &ResultMetadata) -> Result<String> {
        let entry = JournalEntry {
            id: format!("{}-{}-{}", Utc::now().timestamp_millis(), self.next_seq, result.job_id),
            recorded_at: Utc::now(),
            result: result.clone(),
        };
        self.next_seq += 1;

        // File first, it is the source of truth
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AgentError::Journal(format!("Failed to open {}: {}", self.path.display(), e)))?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        file.sync_data()?;

        let id = entry.id.clone();
        self.entries.push(entry);
        Ok(id)
    }

    /// Drop an acknowledged entry
    pub fn acknowledge(&mut self, id: &str) -> Result<()> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() == before {
            return Err(AgentError::Journal(format!("No pending entry {}", id)));
        }
        self.rewrite()
    }

    /// Rewrite the file from memory via a temp file and rename
    fn rewrite(&self) -> Result<()> {
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&tmp)?;
            for entry in &self.entries {
                writeln!(file, "{}", serde_json::to_string(entry)?)?;
            }
            file.sync_data()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
