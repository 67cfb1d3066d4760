//! Append-only CSV log of completed runs, one row per result summary.
//! Lives under the platform data dir; the reader side currently feeds the
//! personal-best line on the results screen.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::session::Summary;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub date: String,
    pub book: String,
    pub chars: usize,
    pub elapsed_secs: f64,
    pub mistakes: usize,
    pub wpm: u32,
}

impl RunRecord {
    pub fn from_summary(book: &str, chars: usize, summary: &Summary) -> Self {
        Self {
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            book: book.to_string(),
            chars,
            elapsed_secs: (summary.elapsed_secs * 100.0).round() / 100.0,
            mistakes: summary.mistakes,
            wpm: summary.wpm,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "taipo") {
            pd.data_dir().join("log.csv")
        } else {
            PathBuf::from("taipo_log.csv")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, record: &RunRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Only the first write to a fresh file emits the header row.
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record).map_err(io::Error::other)?;
        writer.flush()
    }

    pub fn records(&self) -> io::Result<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(io::Error::other)?;
        let mut out = Vec::new();
        for row in reader.deserialize() {
            let record: RunRecord = row.map_err(io::Error::other)?;
            out.push(record);
        }
        Ok(out)
    }

    /// Highest WPM across all logged runs.
    pub fn best_wpm(&self) -> Option<u32> {
        self.records()
            .ok()?
            .into_iter()
            .map(|r| r.wpm)
            .max()
    }
}
