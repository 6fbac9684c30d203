use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// On-disk shape: `{"pages_done": {"<auction_id>": [1, 2, ...]}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub pages_done: BTreeMap<String, BTreeSet<u32>>,
}

/// Durable per-auction record of completed pages
///
/// Pages are only ever added. The orchestrator checks a page before any
/// network work for it and saves right after marking it, so a crash redoes
/// at most the page that was in flight.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: CheckpointState,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: CheckpointState::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    /// Reads the backing file; a missing file leaves the state empty
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.path)?;
        self.state = serde_json::from_str(&content)?;
        tracing::debug!(
            "Checkpoint loaded from {} ({} auctions)",
            self.path.display(),
            self.state.pages_done.len()
        );
        Ok(())
    }

    /// Rewrites the whole state through a temporary file and a rename
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn is_page_done(&self, auction_id: &str, page: u32) -> bool {
        self.state
            .pages_done
            .get(auction_id)
            .is_some_and(|pages| pages.contains(&page))
    }

    /// Marks a page complete; returns false if it was already marked
    pub fn mark_page_done(&mut self, auction_id: &str, page: u32) -> bool {
        self.state
            .pages_done
            .entry(auction_id.to_string())
            .or_default()
            .insert(page)
    }

    /// Marks and immediately persists
    pub fn complete_page(&mut self, auction_id: &str, page: u32) -> Result<()> {
        self.mark_page_done(auction_id, page);
        self.save()
    }
}
