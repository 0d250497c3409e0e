//! Input source
//!
//! Reads the items to sort, one per line.

use std::path::Path;

use tracing::info;

use crate::error::{ClusterError, Result};

/// Split text into items, one per line.
///
/// A trailing `\r` is stripped from each line. A terminating newline does not
/// produce an extra empty item; empty lines elsewhere are kept.
pub fn parse_items(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    body.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Read every item from the file at `path`
pub async fn read_items(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ClusterError::Input {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })?;
    let items = parse_items(&text);
    info!("Read {} items from {}", items.len(), path.display());
    Ok(items)
}
