//! Case listing command.

use console::style;

use crate::cli::helpers::{open_store, parse_batch_id, truncate};
use crate::config::Settings;
use crate::models::Case;

fn amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// List the cases of a batch with their completion tokens.
pub async fn cmd_cases(
    settings: &Settings,
    batch_id: &str,
    pending_only: bool,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let batch_id = parse_batch_id(batch_id);

    let cases: Vec<Case> = store
        .list_cases(&batch_id)
        .await?
        .into_iter()
        .filter(|c| !pending_only || !c.is_done())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&cases)?);
        return Ok(());
    }

    if cases.is_empty() {
        println!("{} No cases found in batch {}", style("!").yellow(), batch_id);
        return Ok(());
    }

    println!(
        "{:<16} {:<24} {:>14} {:<8} {:<8}",
        style("INTERNAL ID").bold(),
        style("TOKEN").bold(),
        style("AMOUNT").bold(),
        style("REGION").bold(),
        style("COURT").bold()
    );
    for case in &cases {
        let token = match case.completion_token.as_deref() {
            Some(t) if case.is_done() => style(truncate(t, 24)).green(),
            _ => style("pending".to_string()).yellow(),
        };
        println!(
            "{:<16} {:<24} {:>14} {:<8} {:<8}",
            truncate(&case.internal_id, 16),
            token,
            amount(case.claim_amount),
            case.region_id.as_deref().unwrap_or("-"),
            case.court_id.as_deref().unwrap_or("-"),
        );
    }

    let done = cases.iter().filter(|c| c.is_done()).count();
    println!();
    println!("{} of {} filed", done, cases.len());

    Ok(())
}
