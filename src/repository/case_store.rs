//! Case queue and progress store.
//!
//! Every read and write is a single auto-committing statement on a fresh
//! connection. Cases are addressed by `(batch_id, internal_id)` since the
//! import sheet only guarantees internal ids to be unique per batch.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};
use thiserror::Error;
use tracing::{debug, info};

use super::diesel_models::{CaseRecord, NewCaseRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::normalize_text;
use crate::models::{BatchId, Case, CaseDraft, DocumentPaths, PartyFields, ProgressSnapshot};
use crate::schema::cases;

const CREATE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS cases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id TEXT NOT NULL,
        internal_id TEXT NOT NULL,
        talon_id TEXT,
        plaintiff_name TEXT,
        plaintiff_id TEXT,
        plaintiff_side TEXT,
        plaintiff_type TEXT,
        plaintiff_address TEXT,
        plaintiff_phone TEXT,
        plaintiff_email TEXT,
        plaintiff_bank TEXT,
        defendant_name TEXT,
        defendant_id TEXT,
        defendant_side TEXT,
        defendant_type TEXT,
        defendant_address TEXT,
        defendant_phone TEXT,
        defendant_email TEXT,
        defendant_bank TEXT,
        rep_name TEXT,
        rep_id TEXT,
        rep_side TEXT,
        rep_type TEXT,
        rep_address TEXT,
        rep_phone TEXT,
        rep_email TEXT,
        rep_bank TEXT,
        claim_amount REAL,
        state_duty REAL,
        claim_summary TEXT,
        claim_basis TEXT,
        region_id TEXT,
        court_id TEXT,
        payment_doc_path TEXT,
        main_doc_path TEXT,
        other_doc_path TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_cases_batch ON cases(batch_id);
    CREATE INDEX IF NOT EXISTS idx_cases_batch_internal ON cases(batch_id, internal_id);
"#;

/// Errors from the case store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DieselError),

    #[error("Case {internal_id} not found in batch {batch_id}")]
    CaseNotFound {
        batch_id: BatchId,
        internal_id: String,
    },

    #[error("Refusing to record a blank completion token")]
    BlankToken,
}

impl From<CaseRecord> for Case {
    fn from(record: CaseRecord) -> Self {
        Case {
            row_id: record.id,
            batch_id: BatchId::new(record.batch_id),
            internal_id: record.internal_id,
            completion_token: record.talon_id.filter(|t| !t.trim().is_empty()),
            region_id: record.region_id,
            court_id: record.court_id,
            claim_amount: record.claim_amount,
            state_duty: record.state_duty,
            claim_summary: record.claim_summary,
            claim_basis: record.claim_basis,
            documents: DocumentPaths {
                payment: record.payment_doc_path,
                main: record.main_doc_path,
                other: record.other_doc_path,
            },
            plaintiff: PartyFields {
                name: record.plaintiff_name,
                ids: record.plaintiff_id,
                sides: record.plaintiff_side,
                types: record.plaintiff_type,
                addresses: record.plaintiff_address,
                phones: record.plaintiff_phone,
                emails: record.plaintiff_email,
                banks: record.plaintiff_bank,
            },
            defendant: PartyFields {
                name: record.defendant_name,
                ids: record.defendant_id,
                sides: record.defendant_side,
                types: record.defendant_type,
                addresses: record.defendant_address,
                phones: record.defendant_phone,
                emails: record.defendant_email,
                banks: record.defendant_bank,
            },
            representative: PartyFields {
                name: record.rep_name,
                ids: record.rep_id,
                sides: record.rep_side,
                types: record.rep_type,
                addresses: record.rep_address,
                phones: record.rep_phone,
                emails: record.rep_email,
                banks: record.rep_bank,
            },
        }
    }
}

fn new_record<'a>(batch_id: &'a str, draft: &'a CaseDraft) -> NewCaseRecord<'a> {
    let text = |v: &'a Option<String>| normalize_text(v.as_deref());
    NewCaseRecord {
        batch_id,
        internal_id: draft.internal_id.trim(),
        plaintiff_name: text(&draft.plaintiff_name),
        plaintiff_id: text(&draft.plaintiff_id),
        plaintiff_side: text(&draft.plaintiff_side),
        plaintiff_type: text(&draft.plaintiff_type),
        plaintiff_address: text(&draft.plaintiff_address),
        plaintiff_phone: text(&draft.plaintiff_phone),
        plaintiff_email: text(&draft.plaintiff_email),
        plaintiff_bank: text(&draft.plaintiff_bank),
        defendant_name: text(&draft.defendant_name),
        defendant_id: text(&draft.defendant_id),
        defendant_side: text(&draft.defendant_side),
        defendant_type: text(&draft.defendant_type),
        defendant_address: text(&draft.defendant_address),
        defendant_phone: text(&draft.defendant_phone),
        defendant_email: text(&draft.defendant_email),
        defendant_bank: text(&draft.defendant_bank),
        rep_name: text(&draft.rep_name),
        rep_id: text(&draft.rep_id),
        rep_side: text(&draft.rep_side),
        rep_type: text(&draft.rep_type),
        rep_address: text(&draft.rep_address),
        rep_phone: text(&draft.rep_phone),
        rep_email: text(&draft.rep_email),
        rep_bank: text(&draft.rep_bank),
        claim_amount: draft.claim_amount,
        state_duty: draft.state_duty,
        claim_summary: text(&draft.claim_summary),
        claim_basis: text(&draft.claim_basis),
        region_id: text(&draft.region_id),
        court_id: text(&draft.court_id),
        payment_doc_path: text(&draft.payment_doc_path),
        main_doc_path: text(&draft.main_doc_path),
        other_doc_path: text(&draft.other_doc_path),
    }
}

/// Persistent queue of cases grouped by batch.
#[derive(Clone)]
pub struct CaseStore {
    pool: AsyncSqlitePool,
}

impl CaseStore {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Create the case table and its indexes if they are missing.
    ///
    /// Never drops or alters existing data. Also switches the database to
    /// WAL so several batch processes can read while one writes.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute("PRAGMA journal_mode = WAL;").await?;
        conn.batch_execute(CREATE_SCHEMA).await?;
        debug!("Case schema ready at {}", self.pool.database_url());
        Ok(())
    }

    /// Insert all drafts under a freshly generated batch id.
    pub async fn create_batch(&self, drafts: &[CaseDraft]) -> Result<BatchId, StoreError> {
        let batch_id = BatchId::generate();
        let mut conn = self.pool.get().await?;

        let batch_str = batch_id.as_str();
        conn.transaction(|conn| {
            Box::pin(async move {
                for draft in drafts {
                    diesel::insert_into(cases::table)
                        .values(new_record(batch_str, draft))
                        .execute(conn)
                        .await?;
                }
                Ok::<_, DieselError>(())
            })
        })
        .await?;

        info!("Created batch {} with {} cases", batch_id, drafts.len());
        Ok(batch_id)
    }

    /// Internal ids of the batch's cases without a completion token, in
    /// import order, each id listed once.
    pub async fn list_pending_internal_ids(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<(String, Option<String>)> = cases::table
            .filter(cases::batch_id.eq(batch_id.as_str()))
            .order(cases::id.asc())
            .select((cases::internal_id, cases::talon_id))
            .load(&mut conn)
            .await?;

        let mut seen = std::collections::HashSet::new();
        Ok(rows
            .into_iter()
            .filter(|(_, token)| normalize_text(token.as_deref()).is_none())
            .map(|(internal_id, _)| internal_id)
            .filter(|internal_id| seen.insert(internal_id.clone()))
            .collect())
    }

    /// Fetch one case. Duplicate internal ids resolve to the first imported row.
    pub async fn get_case(
        &self,
        batch_id: &BatchId,
        internal_id: &str,
    ) -> Result<Option<Case>, StoreError> {
        let mut conn = self.pool.get().await?;

        let record = cases::table
            .filter(cases::batch_id.eq(batch_id.as_str()))
            .filter(cases::internal_id.eq(internal_id))
            .order(cases::id.asc())
            .select(CaseRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(Case::from))
    }

    /// Record the confirmation token for a case, marking it done.
    pub async fn set_completion_token(
        &self,
        batch_id: &BatchId,
        internal_id: &str,
        token: &str,
    ) -> Result<(), StoreError> {
        let token = normalize_text(Some(token)).ok_or(StoreError::BlankToken)?;
        let mut conn = self.pool.get().await?;

        let rows = diesel::update(
            cases::table
                .filter(cases::batch_id.eq(batch_id.as_str()))
                .filter(cases::internal_id.eq(internal_id)),
        )
        .set(cases::talon_id.eq(Some(token)))
        .execute(&mut conn)
        .await?;

        if rows == 0 {
            return Err(StoreError::CaseNotFound {
                batch_id: batch_id.clone(),
                internal_id: internal_id.to_string(),
            });
        }

        debug!(%batch_id, internal_id, token, "Recorded completion token");
        Ok(())
    }

    /// Count processed and total cases of a batch.
    pub async fn progress(&self, batch_id: &BatchId) -> Result<ProgressSnapshot, StoreError> {
        let mut conn = self.pool.get().await?;

        let tokens: Vec<Option<String>> = cases::table
            .filter(cases::batch_id.eq(batch_id.as_str()))
            .select(cases::talon_id)
            .load(&mut conn)
            .await?;

        let processed = tokens
            .iter()
            .filter(|t| normalize_text(t.as_deref()).is_some())
            .count();
        Ok(ProgressSnapshot::new(processed as u64, tokens.len() as u64))
    }

    /// All cases of a batch in import order.
    pub async fn list_cases(&self, batch_id: &BatchId) -> Result<Vec<Case>, StoreError> {
        let mut conn = self.pool.get().await?;

        cases::table
            .filter(cases::batch_id.eq(batch_id.as_str()))
            .order(cases::id.asc())
            .select(CaseRecord::as_select())
            .load(&mut conn)
            .await
            .map(|records| records.into_iter().map(Case::from).collect())
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_store() -> (CaseStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("cases.db"));
        let store = CaseStore::new(pool);
        store.ensure_schema().await.unwrap();
        (store, dir)
    }

    fn draft(internal_id: &str) -> CaseDraft {
        CaseDraft {
            plaintiff_id: Some("123456789012".into()),
            claim_amount: Some(1000.0),
            ..CaseDraft::new(internal_id)
        }
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let (store, _dir) = setup_store().await;
        let batch = store.create_batch(&[draft("1")]).await.unwrap();
        store.ensure_schema().await.unwrap();
        assert_eq!(store.progress(&batch).await.unwrap(), ProgressSnapshot::new(0, 1));
    }

    #[tokio::test]
    async fn test_create_batch_and_read_back() {
        let (store, _dir) = setup_store().await;
        let mut first = draft("A-1");
        first.rep_id = Some("   ".into());
        first.plaintiff_side = Some(" 1 ".into());
        let batch = store.create_batch(&[first, draft("A-2")]).await.unwrap();
        assert!(batch.is_well_formed());

        let case = store.get_case(&batch, "A-1").await.unwrap().unwrap();
        assert_eq!(case.internal_id, "A-1");
        assert_eq!(case.plaintiff.ids.as_deref(), Some("123456789012"));
        assert_eq!(case.plaintiff.sides.as_deref(), Some("1"));
        assert!(case.representative.ids.is_none());
        assert_eq!(case.claim_amount, Some(1000.0));
        assert!(!case.is_done());

        assert!(store.get_case(&batch, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_ids_are_ordered_and_unique() {
        let (store, _dir) = setup_store().await;
        let batch = store
            .create_batch(&[draft("3"), draft("1"), draft("3"), draft("2")])
            .await
            .unwrap();

        let pending = store.list_pending_internal_ids(&batch).await.unwrap();
        assert_eq!(pending, vec!["3", "1", "2"]);
    }

    #[tokio::test]
    async fn test_completion_token_removes_case_from_queue() {
        let (store, _dir) = setup_store().await;
        let batch = store
            .create_batch(&[draft("1"), draft("2"), draft("3")])
            .await
            .unwrap();

        store.set_completion_token(&batch, "2", " T-42 ").await.unwrap();

        let pending = store.list_pending_internal_ids(&batch).await.unwrap();
        assert_eq!(pending, vec!["1", "3"]);

        let case = store.get_case(&batch, "2").await.unwrap().unwrap();
        assert_eq!(case.completion_token.as_deref(), Some("T-42"));
        assert!(case.is_done());

        let progress = store.progress(&batch).await.unwrap();
        assert_eq!(progress, ProgressSnapshot::new(1, 3));
        assert_eq!(progress.percent(), 33);
    }

    #[tokio::test]
    async fn test_batches_are_isolated() {
        let (store, _dir) = setup_store().await;
        let first = store.create_batch(&[draft("1")]).await.unwrap();
        let second = store.create_batch(&[draft("1"), draft("2")]).await.unwrap();

        store.set_completion_token(&first, "1", "T-1").await.unwrap();

        assert!(store.list_pending_internal_ids(&first).await.unwrap().is_empty());
        assert_eq!(
            store.list_pending_internal_ids(&second).await.unwrap(),
            vec!["1", "2"]
        );
        assert_eq!(store.progress(&second).await.unwrap(), ProgressSnapshot::new(0, 2));
    }

    #[tokio::test]
    async fn test_set_token_rejects_unknown_case_and_blank_token() {
        let (store, _dir) = setup_store().await;
        let batch = store.create_batch(&[draft("1")]).await.unwrap();

        let err = store.set_completion_token(&batch, "9", "T").await.unwrap_err();
        assert!(matches!(err, StoreError::CaseNotFound { .. }));

        let err = store.set_completion_token(&batch, "1", "  ").await.unwrap_err();
        assert!(matches!(err, StoreError::BlankToken));
        assert_eq!(store.progress(&batch).await.unwrap().processed, 0);
    }

    #[tokio::test]
    async fn test_blank_stored_token_counts_as_pending() {
        let (store, _dir) = setup_store().await;
        let batch = store.create_batch(&[draft("1"), draft("2")]).await.unwrap();

        let mut conn = store.pool.get().await.unwrap();
        conn.batch_execute(&format!(
            "UPDATE cases SET talon_id = '  ' WHERE batch_id = '{}' AND internal_id = '1'",
            batch
        ))
        .await
        .unwrap();

        assert_eq!(
            store.list_pending_internal_ids(&batch).await.unwrap(),
            vec!["1", "2"]
        );
        assert_eq!(store.progress(&batch).await.unwrap().processed, 0);
        let case = store.get_case(&batch, "1").await.unwrap().unwrap();
        assert!(case.completion_token.is_none());
    }

    #[tokio::test]
    async fn test_progress_of_unknown_batch_is_zero() {
        let (store, _dir) = setup_store().await;
        let progress = store.progress(&BatchId::new("BATCH-none")).await.unwrap();
        assert_eq!(progress, ProgressSnapshot::new(0, 0));
        assert_eq!(progress.percent(), 0);
    }

    #[tokio::test]
    async fn test_list_cases_in_import_order() {
        let (store, _dir) = setup_store().await;
        let batch = store.create_batch(&[draft("b"), draft("a")]).await.unwrap();
        let ids: Vec<String> = store
            .list_cases(&batch)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.internal_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unreachable_database_reports_error() {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("missing/dir/cases.db"));
        let store = CaseStore::new(pool);
        let err = store.progress(&BatchId::new("x")).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
