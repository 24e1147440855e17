//! Batch identifiers and progress snapshots.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

const BATCH_PREFIX: &str = "BATCH";

fn batch_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^BATCH-\d{14}-[0-9a-f]{6}$").expect("valid batch id regex"))
}

/// Identifier of one import run, `BATCH-<YYYYMMDDHHMMSS>-<6 hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Generate a fresh batch id stamped with the current UTC time.
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generate a batch id for a specific instant.
    pub fn generate_at(at: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}-{}",
            BATCH_PREFIX,
            at.format("%Y%m%d%H%M%S"),
            &suffix[..6]
        ))
    }

    /// Wrap an existing identifier without validating it.
    ///
    /// Batches created by older importers may not follow the current
    /// format; they are still addressable.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id follows the `BATCH-<timestamp>-<hex>` layout.
    pub fn is_well_formed(&self) -> bool {
        batch_id_pattern().is_match(&self.0)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Completion counts for a batch, computed from the case table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Cases that carry a completion token.
    pub processed: u64,
    /// All cases in the batch.
    pub total: u64,
}

impl ProgressSnapshot {
    pub fn new(processed: u64, total: u64) -> Self {
        Self { processed, total }
    }

    /// Floor of `processed / total * 100`; zero for an empty batch.
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        self.processed.saturating_mul(100) / self.total
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.processed)
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.processed >= self.total
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}%)", self.processed, self.total, self.percent())
    }
}
