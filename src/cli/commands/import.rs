//! Case sheet import command.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context};
use console::style;

use crate::config::Settings;
use crate::models::CaseDraft;

use crate::cli::helpers::open_store;

/// Parse an exported sheet. YAML by extension, JSON otherwise.
fn parse_drafts(contents: &str, path: &Path) -> anyhow::Result<Vec<CaseDraft>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("json")
        .to_ascii_lowercase();
    let drafts = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(contents)
            .with_context(|| format!("Failed to parse YAML cases from {}", path.display()))?,
        _ => serde_json::from_str(contents)
            .with_context(|| format!("Failed to parse JSON cases from {}", path.display()))?,
    };
    Ok(drafts)
}

/// Internal ids that appear more than once, in first-seen order.
fn duplicate_ids(drafts: &[CaseDraft]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    drafts
        .iter()
        .map(|d| d.internal_id.as_str())
        .filter(|id| !seen.insert(*id) && reported.insert(*id))
        .collect()
}

/// Import case records as a new batch and print its id.
pub async fn cmd_import(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let drafts = parse_drafts(&contents, file)?;

    if drafts.is_empty() {
        bail!("{} holds no cases", file.display());
    }

    let duplicates = duplicate_ids(&drafts);
    if !duplicates.is_empty() {
        println!(
            "{} Duplicate InternalID values, only the first row of each will be filed: {}",
            style("!").yellow(),
            duplicates.join(", ")
        );
    }

    let store = open_store(settings)?;
    store.ensure_schema().await?;
    let batch_id = store.create_batch(&drafts).await?;

    println!(
        "{} Imported {} cases from {}",
        style("✓").green(),
        drafts.len(),
        file.display()
    );
    println!("{}", batch_id);

    Ok(())
}
