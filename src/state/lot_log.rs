use crate::model::{LotRecord, LotSet, LotSource};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Appends one JSON document as a line, creating parent directories
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// One line of `raw/<auction_id>/lots.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotLogEntry {
    pub page: u32,
    pub lot: LotRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<LotSource>,
}

/// Append-only per-auction log of lot observations
#[derive(Debug, Clone)]
pub struct LotLog {
    path: PathBuf,
}

impl LotLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, page: u32, lots: &[LotRecord], source: LotSource) -> Result<()> {
        for lot in lots {
            append_jsonl(
                &self.path,
                &LotLogEntry {
                    page,
                    lot: lot.clone(),
                    source: Some(source),
                },
            )?;
        }
        Ok(())
    }

    /// Replays the log into an id-keyed set, later lines winning
    ///
    /// Unreadable lines are skipped; a missing log is an empty set.
    pub fn load(&self) -> LotSet {
        let mut lots = LotSet::default();
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return lots,
        };

        for (n, line) in BufReader::new(file).lines().enumerate() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LotLogEntry>(line) {
                Ok(entry) => {
                    lots.insert(entry.lot);
                }
                Err(e) => {
                    tracing::debug!("Skipping line {} of {}: {}", n + 1, self.path.display(), e)
                }
            }
        }
        lots
    }
}
