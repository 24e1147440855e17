//! Initialize command.

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::repository::{AsyncSqlitePool, CaseStore};

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let store = CaseStore::new(AsyncSqlitePool::from_path(&settings.database_path()));
    store
        .ensure_schema()
        .await
        .context("Failed to create the case table")?;

    println!(
        "{} Initialized courtfile in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Database: {}", settings.database_path().display());

    Ok(())
}
