//! Diesel ORM models for the `cases` table.

use diesel::prelude::*;

use crate::schema;

/// Case row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::cases)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CaseRecord {
    pub id: i32,
    pub batch_id: String,
    pub internal_id: String,
    pub talon_id: Option<String>,
    pub plaintiff_name: Option<String>,
    pub plaintiff_id: Option<String>,
    pub plaintiff_side: Option<String>,
    pub plaintiff_type: Option<String>,
    pub plaintiff_address: Option<String>,
    pub plaintiff_phone: Option<String>,
    pub plaintiff_email: Option<String>,
    pub plaintiff_bank: Option<String>,
    pub defendant_name: Option<String>,
    pub defendant_id: Option<String>,
    pub defendant_side: Option<String>,
    pub defendant_type: Option<String>,
    pub defendant_address: Option<String>,
    pub defendant_phone: Option<String>,
    pub defendant_email: Option<String>,
    pub defendant_bank: Option<String>,
    pub rep_name: Option<String>,
    pub rep_id: Option<String>,
    pub rep_side: Option<String>,
    pub rep_type: Option<String>,
    pub rep_address: Option<String>,
    pub rep_phone: Option<String>,
    pub rep_email: Option<String>,
    pub rep_bank: Option<String>,
    pub claim_amount: Option<f64>,
    pub state_duty: Option<f64>,
    pub claim_summary: Option<String>,
    pub claim_basis: Option<String>,
    pub region_id: Option<String>,
    pub court_id: Option<String>,
    pub payment_doc_path: Option<String>,
    pub main_doc_path: Option<String>,
    pub other_doc_path: Option<String>,
}

/// New case for insertion. `None` is written as NULL.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::cases)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewCaseRecord<'a> {
    pub batch_id: &'a str,
    pub internal_id: &'a str,
    pub plaintiff_name: Option<&'a str>,
    pub plaintiff_id: Option<&'a str>,
    pub plaintiff_side: Option<&'a str>,
    pub plaintiff_type: Option<&'a str>,
    pub plaintiff_address: Option<&'a str>,
    pub plaintiff_phone: Option<&'a str>,
    pub plaintiff_email: Option<&'a str>,
    pub plaintiff_bank: Option<&'a str>,
    pub defendant_name: Option<&'a str>,
    pub defendant_id: Option<&'a str>,
    pub defendant_side: Option<&'a str>,
    pub defendant_type: Option<&'a str>,
    pub defendant_address: Option<&'a str>,
    pub defendant_phone: Option<&'a str>,
    pub defendant_email: Option<&'a str>,
    pub defendant_bank: Option<&'a str>,
    pub rep_name: Option<&'a str>,
    pub rep_id: Option<&'a str>,
    pub rep_side: Option<&'a str>,
    pub rep_type: Option<&'a str>,
    pub rep_address: Option<&'a str>,
    pub rep_phone: Option<&'a str>,
    pub rep_email: Option<&'a str>,
    pub rep_bank: Option<&'a str>,
    pub claim_amount: Option<f64>,
    pub state_duty: Option<f64>,
    pub claim_summary: Option<&'a str>,
    pub claim_basis: Option<&'a str>,
    pub region_id: Option<&'a str>,
    pub court_id: Option<&'a str>,
    pub payment_doc_path: Option<&'a str>,
    pub main_doc_path: Option<&'a str>,
    pub other_doc_path: Option<&'a str>,
}
