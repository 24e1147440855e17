//! Shared helper functions for CLI commands.

use anyhow::bail;
use console::style;

use crate::config::Settings;
use crate::models::BatchId;
use crate::repository::{AsyncSqlitePool, CaseStore};

/// Open the case store of an initialized data directory.
pub fn open_store(settings: &Settings) -> anyhow::Result<CaseStore> {
    if !settings.database_exists() {
        bail!(
            "No database at {}. Run 'courtfile init' first.",
            settings.database_path().display()
        );
    }
    let pool = AsyncSqlitePool::from_path(&settings.database_path());
    Ok(CaseStore::new(pool))
}

/// Parse a batch id given on the command line, warning when it does not
/// look like one this tool generates.
pub fn parse_batch_id(raw: &str) -> BatchId {
    let batch_id = BatchId::new(raw.trim());
    if !batch_id.is_well_formed() {
        eprintln!(
            "{} '{}' does not look like a batch id (expected BATCH-<timestamp>-<hex>)",
            style("!").yellow(),
            batch_id
        );
    }
    batch_id
}

/// Truncate a string for single-line display.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Құжаттарды жіберу", 10), "Құжатта...");
    }
}
