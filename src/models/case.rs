//! Case entity: one claim to be filed, as imported and as stored.
//!
//! The raw participant blocks keep the `*`-delimited form of the import
//! sheet; [`crate::filing::assembler`] turns them into participants on
//! every processing attempt.

use serde::{Deserialize, Deserializer, Serialize};

use super::BatchId;

/// Treat missing and whitespace-only values the same way.
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Raw participant columns for one role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyFields {
    pub name: Option<String>,
    pub ids: Option<String>,
    pub sides: Option<String>,
    pub types: Option<String>,
    pub addresses: Option<String>,
    pub phones: Option<String>,
    pub emails: Option<String>,
    pub banks: Option<String>,
}

/// `*`-delimited document path groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPaths {
    pub payment: Option<String>,
    pub main: Option<String>,
    pub other: Option<String>,
}

/// A stored case.
///
/// Only `completion_token` is ever written after import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Auto-incremented row id.
    pub row_id: i32,
    pub batch_id: BatchId,
    /// Identifier from the import sheet, unique within the batch.
    pub internal_id: String,
    /// Confirmation token issued by the portal; `None` while pending.
    pub completion_token: Option<String>,
    pub region_id: Option<String>,
    pub court_id: Option<String>,
    pub claim_amount: Option<f64>,
    pub state_duty: Option<f64>,
    pub claim_summary: Option<String>,
    pub claim_basis: Option<String>,
    pub documents: DocumentPaths,
    pub plaintiff: PartyFields,
    pub defendant: PartyFields,
    pub representative: PartyFields,
}

impl Case {
    /// A case with a completion token is terminal and never refiled.
    pub fn is_done(&self) -> bool {
        self.completion_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}

/// One row of an import sheet, before it belongs to a batch.
///
/// Field names follow the sheet's column headers. Cells may arrive as
/// strings, numbers or booleans; everything except the amounts is kept
/// as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseDraft {
    #[serde(rename = "InternalID", deserialize_with = "de_required_text")]
    pub internal_id: String,

    #[serde(rename = "PlaintiffName", default, deserialize_with = "de_text")]
    pub plaintiff_name: Option<String>,
    #[serde(rename = "PlaintiffID", default, deserialize_with = "de_text")]
    pub plaintiff_id: Option<String>,
    #[serde(rename = "PlaintiffSide", default, deserialize_with = "de_text")]
    pub plaintiff_side: Option<String>,
    #[serde(rename = "PlaintiffType", default, deserialize_with = "de_text")]
    pub plaintiff_type: Option<String>,
    #[serde(rename = "PlaintiffAddress", default, deserialize_with = "de_text")]
    pub plaintiff_address: Option<String>,
    #[serde(rename = "PlaintiffPhone", default, deserialize_with = "de_text")]
    pub plaintiff_phone: Option<String>,
    #[serde(rename = "PlaintiffEmail", default, deserialize_with = "de_text")]
    pub plaintiff_email: Option<String>,
    #[serde(rename = "PlaintiffBank", default, deserialize_with = "de_text")]
    pub plaintiff_bank: Option<String>,

    #[serde(rename = "DefendantName", default, deserialize_with = "de_text")]
    pub defendant_name: Option<String>,
    #[serde(rename = "DefendantID", default, deserialize_with = "de_text")]
    pub defendant_id: Option<String>,
    #[serde(rename = "DefendantSide", default, deserialize_with = "de_text")]
    pub defendant_side: Option<String>,
    #[serde(rename = "DefendantType", default, deserialize_with = "de_text")]
    pub defendant_type: Option<String>,
    #[serde(rename = "DefendantAddress", default, deserialize_with = "de_text")]
    pub defendant_address: Option<String>,
    #[serde(rename = "DefendantPhone", default, deserialize_with = "de_text")]
    pub defendant_phone: Option<String>,
    #[serde(rename = "DefendantEmail", default, deserialize_with = "de_text")]
    pub defendant_email: Option<String>,
    #[serde(rename = "DefendantBank", default, deserialize_with = "de_text")]
    pub defendant_bank: Option<String>,

    #[serde(rename = "RepName", default, deserialize_with = "de_text")]
    pub rep_name: Option<String>,
    #[serde(rename = "RepID", default, deserialize_with = "de_text")]
    pub rep_id: Option<String>,
    #[serde(rename = "RepSide", default, deserialize_with = "de_text")]
    pub rep_side: Option<String>,
    #[serde(rename = "RepType", default, deserialize_with = "de_text")]
    pub rep_type: Option<String>,
    #[serde(rename = "RepAddress", default, deserialize_with = "de_text")]
    pub rep_address: Option<String>,
    #[serde(rename = "RepPhone", default, deserialize_with = "de_text")]
    pub rep_phone: Option<String>,
    #[serde(rename = "RepEmail", default, deserialize_with = "de_text")]
    pub rep_email: Option<String>,
    #[serde(rename = "RepBank", default, deserialize_with = "de_text")]
    pub rep_bank: Option<String>,

    #[serde(rename = "ClaimAmount", default, deserialize_with = "de_amount")]
    pub claim_amount: Option<f64>,
    #[serde(rename = "StateDuty", default, deserialize_with = "de_amount")]
    pub state_duty: Option<f64>,
    #[serde(rename = "ClaimSummary", default, deserialize_with = "de_text")]
    pub claim_summary: Option<String>,
    #[serde(rename = "ClaimBasis", default, deserialize_with = "de_text")]
    pub claim_basis: Option<String>,
    #[serde(rename = "RegionID", default, deserialize_with = "de_text")]
    pub region_id: Option<String>,
    #[serde(rename = "CourtID", default, deserialize_with = "de_text")]
    pub court_id: Option<String>,
    #[serde(rename = "PaymentDocPath", default, deserialize_with = "de_text")]
    pub payment_doc_path: Option<String>,
    #[serde(rename = "MainDocPath", default, deserialize_with = "de_text")]
    pub main_doc_path: Option<String>,
    #[serde(rename = "OtherDocPath", default, deserialize_with = "de_text")]
    pub other_doc_path: Option<String>,
}

impl CaseDraft {
    pub fn new(internal_id: impl Into<String>) -> Self {
        Self {
            internal_id: internal_id.into(),
            ..Default::default()
        }
    }
}

/// A spreadsheet cell as it shows up after conversion to JSON/YAML.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCell {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl RawCell {
    fn into_text(self) -> String {
        match self {
            RawCell::Text(s) => s,
            RawCell::Int(i) => i.to_string(),
            RawCell::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            RawCell::Float(f) => f.to_string(),
            RawCell::Bool(b) => b.to_string(),
        }
    }
}

fn de_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let cell = Option::<RawCell>::deserialize(deserializer)?;
    Ok(blank_to_none(cell.map(RawCell::into_text)))
}

fn de_required_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match de_text(deserializer)? {
        Some(text) => Ok(text.trim().to_string()),
        None => Err(serde::de::Error::custom("InternalID must not be blank")),
    }
}

fn de_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawCell>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawCell::Int(i)) => Ok(Some(i as f64)),
        Some(RawCell::Float(f)) => Ok(Some(f)),
        Some(RawCell::Bool(_)) => Err(serde::de::Error::custom("amount must be numeric")),
        Some(RawCell::Text(s)) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned
                .parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid amount '{}'", s)))
        }
    }
}
