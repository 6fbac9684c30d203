//! JSON array files: `auctions.json`, `lots.json`, `images.json`

use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Writes `rows` as a pretty-printed JSON array, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(rows)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Reads a JSON array written by [`write_json`]
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
