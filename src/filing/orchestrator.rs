//! Runs a batch's pending cases through the form driver, one at a time.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::models::{BatchId, ProgressSnapshot};
use crate::repository::{CaseStore, StoreError};

use super::assembler::assemble;
use super::driver::FormDriver;
use super::error::StageError;
use super::surface::FormSurface;

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// The pending list was read.
    Started {
        batch_id: BatchId,
        pending: usize,
        progress: ProgressSnapshot,
    },
    /// A case entered the wizard. `position` is 1-based among pending cases.
    CaseStarted {
        internal_id: String,
        position: usize,
        pending: usize,
    },
    /// A token was read (and recorded unless rehearsing).
    CaseFiled { internal_id: String, token: String },
    /// The wizard finished but no token could be read; the case stays pending.
    CaseUnconfirmed { internal_id: String },
    /// The case could not be loaded and was not attempted.
    CaseSkipped { internal_id: String, reason: String },
    /// The case aborted the batch.
    CaseFailed { internal_id: String, error: String },
    Progress(ProgressSnapshot),
    /// Cancellation was observed before the next case.
    Cancelled,
}

/// Outcome counts of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Cases pending when the run started.
    pub pending: usize,
    pub filed: usize,
    pub unconfirmed: usize,
    pub skipped: usize,
    /// Cases found done when their turn came.
    pub already_done: usize,
    pub cancelled: bool,
}

impl BatchReport {
    /// Cases that went through the wizard.
    pub fn attempted(&self) -> usize {
        self.filed + self.unconfirmed
    }
}

/// Errors that stop a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to read batch: {0}")]
    Store(#[source] StoreError),

    #[error("Failed to open filing session: {0}")]
    Session(#[source] StageError),

    #[error("Case {internal_id} aborted the batch: {source}")]
    CaseAborted {
        internal_id: String,
        #[source]
        source: StageError,
    },

    #[error("Case {internal_id} was filed with token {token} but the token could not be recorded: {source}")]
    TokenNotRecorded {
        internal_id: String,
        token: String,
        #[source]
        source: StoreError,
    },
}

/// Drives every pending case of a batch through one exclusive session.
pub struct BatchOrchestrator {
    store: CaseStore,
    driver: FormDriver,
    record_tokens: bool,
}

impl BatchOrchestrator {
    pub fn new(store: CaseStore, driver: FormDriver) -> Self {
        Self {
            store,
            driver,
            record_tokens: true,
        }
    }

    /// Whether extracted tokens are written back. Rehearsals turn this off
    /// so the batch stays pending.
    pub fn with_token_recording(mut self, record: bool) -> Self {
        self.record_tokens = record;
        self
    }

    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    /// Process the batch until every pending case has been tried, a case
    /// aborts, or `cancel` turns true. Cancellation is only observed
    /// between cases.
    pub async fn run<S: FormSurface + ?Sized>(
        &self,
        batch_id: &BatchId,
        surface: &mut S,
        cancel: watch::Receiver<bool>,
        event_tx: mpsc::Sender<BatchEvent>,
    ) -> Result<BatchReport, BatchError> {
        let pending = self
            .store
            .list_pending_internal_ids(batch_id)
            .await
            .map_err(BatchError::Store)?;
        let progress = self
            .store
            .progress(batch_id)
            .await
            .map_err(BatchError::Store)?;

        info!(%batch_id, pending = pending.len(), %progress, "Starting batch");
        let _ = event_tx
            .send(BatchEvent::Started {
                batch_id: batch_id.clone(),
                pending: pending.len(),
                progress,
            })
            .await;

        let mut report = BatchReport {
            pending: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            info!(%batch_id, "Nothing to file");
            return Ok(report);
        }

        self.driver
            .start_session(surface)
            .await
            .map_err(BatchError::Session)?;

        for (index, internal_id) in pending.iter().enumerate() {
            if *cancel.borrow() {
                info!(%batch_id, "Cancelled before case {}", internal_id);
                report.cancelled = true;
                let _ = event_tx.send(BatchEvent::Cancelled).await;
                break;
            }

            let case = match self.store.get_case(batch_id, internal_id).await {
                Ok(Some(case)) => case,
                Ok(None) => {
                    warn!(%batch_id, internal_id, "Case disappeared from the store, skipping");
                    report.skipped += 1;
                    let _ = event_tx
                        .send(BatchEvent::CaseSkipped {
                            internal_id: internal_id.clone(),
                            reason: "not found".to_string(),
                        })
                        .await;
                    continue;
                }
                Err(e) => {
                    error!(%batch_id, internal_id, "Failed to load case: {}", e);
                    report.skipped += 1;
                    let _ = event_tx
                        .send(BatchEvent::CaseSkipped {
                            internal_id: internal_id.clone(),
                            reason: e.to_string(),
                        })
                        .await;
                    continue;
                }
            };

            if case.is_done() {
                info!(internal_id, "Already filed, skipping");
                report.already_done += 1;
                continue;
            }

            info!(
                internal_id,
                position = index + 1,
                of = pending.len(),
                "Starting case"
            );
            let _ = event_tx
                .send(BatchEvent::CaseStarted {
                    internal_id: internal_id.clone(),
                    position: index + 1,
                    pending: pending.len(),
                })
                .await;

            let participants = assemble(&case);
            let token = match self.driver.file_case(surface, &case, &participants).await {
                Ok(token) => token,
                Err(source) => {
                    error!(internal_id, stage = %source.stage, "Case aborted: {}", source.source);
                    let _ = event_tx
                        .send(BatchEvent::CaseFailed {
                            internal_id: internal_id.clone(),
                            error: source.to_string(),
                        })
                        .await;
                    return Err(BatchError::CaseAborted {
                        internal_id: internal_id.clone(),
                        source,
                    });
                }
            };

            match token {
                Some(token) => {
                    if self.record_tokens {
                        if let Err(source) = self
                            .store
                            .set_completion_token(batch_id, internal_id, &token)
                            .await
                        {
                            error!(
                                %batch_id,
                                internal_id,
                                token = %token,
                                "Case was filed but its token could not be recorded; record it manually"
                            );
                            return Err(BatchError::TokenNotRecorded {
                                internal_id: internal_id.clone(),
                                token,
                                source,
                            });
                        }
                    }
                    info!(internal_id, token = %token, "Case filed");
                    report.filed += 1;
                    let _ = event_tx
                        .send(BatchEvent::CaseFiled {
                            internal_id: internal_id.clone(),
                            token,
                        })
                        .await;
                }
                None => {
                    warn!(internal_id, "Case finished without a confirmation token; left pending");
                    report.unconfirmed += 1;
                    let _ = event_tx
                        .send(BatchEvent::CaseUnconfirmed {
                            internal_id: internal_id.clone(),
                        })
                        .await;
                }
            }

            match self.store.progress(batch_id).await {
                Ok(progress) => {
                    let _ = event_tx.send(BatchEvent::Progress(progress)).await;
                }
                Err(e) => warn!(%batch_id, "Failed to read batch progress: {}", e),
            }

            self.driver
                .return_home(surface)
                .await
                .map_err(|source| BatchError::CaseAborted {
                    internal_id: internal_id.clone(),
                    source,
                })?;
        }

        info!(
            %batch_id,
            filed = report.filed,
            unconfirmed = report.unconfirmed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "Batch run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilingConfig;
    use crate::filing::error::Stage;
    use crate::filing::scripted::ScriptedSurface;
    use crate::models::CaseDraft;
    use crate::repository::AsyncSqlitePool;
    use tempfile::TempDir;

    fn draft(id: &str) -> CaseDraft {
        CaseDraft {
            region_id: Some("19".into()),
            court_id: Some("1901".into()),
            plaintiff_id: Some("123456789012".into()),
            plaintiff_side: Some("1".into()),
            plaintiff_type: Some("1".into()),
            defendant_id: Some("900101300123".into()),
            defendant_side: Some("2".into()),
            claim_amount: Some(1000.0),
            ..CaseDraft::new(id)
        }
    }

    async fn setup(ids: &[&str]) -> (TempDir, CaseStore, BatchId) {
        let dir = tempfile::tempdir().unwrap();
        let store = CaseStore::new(AsyncSqlitePool::from_path(&dir.path().join("cases.db")));
        store.ensure_schema().await.unwrap();
        let drafts: Vec<_> = ids.iter().map(|id| draft(id)).collect();
        let batch_id = store.create_batch(&drafts).await.unwrap();
        (dir, store, batch_id)
    }

    fn orchestrator(store: &CaseStore) -> BatchOrchestrator {
        BatchOrchestrator::new(store.clone(), FormDriver::new(FilingConfig::rehearsal()))
    }

    async fn run(
        orchestrator: &BatchOrchestrator,
        batch_id: &BatchId,
        surface: &mut ScriptedSurface,
        cancel: watch::Receiver<bool>,
    ) -> (Result<BatchReport, BatchError>, Vec<BatchEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let result = orchestrator.run(batch_id, surface, cancel, tx).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (result, events)
    }

    fn not_cancelled() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn test_second_run_does_nothing() {
        let (_dir, store, batch_id) = setup(&["1", "2", "3"]).await;
        let orchestrator = orchestrator(&store);

        let mut surface = ScriptedSurface::rehearsal("T");
        let (result, _) = run(&orchestrator, &batch_id, &mut surface, not_cancelled()).await;
        let report = result.unwrap();
        assert_eq!(report.filed, 3);
        assert_eq!(surface.portal_opens(), 1);
        assert_eq!(surface.cases_started(), 3);

        let cases = store.list_cases(&batch_id).await.unwrap();
        let tokens: Vec<_> = cases.iter().map(|c| c.completion_token.as_deref()).collect();
        assert_eq!(tokens, vec![Some("T-1"), Some("T-2"), Some("T-3")]);
        assert_eq!(store.progress(&batch_id).await.unwrap(), ProgressSnapshot::new(3, 3));

        let mut again = ScriptedSurface::rehearsal("U");
        let (result, _) = run(&orchestrator, &batch_id, &mut again, not_cancelled()).await;
        assert_eq!(result.unwrap().pending, 0);
        assert!(again.interactions().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_lets_current_case_finish() {
        let (_dir, store, batch_id) = setup(&["1", "2", "3"]).await;
        let orchestrator = orchestrator(&store);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut surface = ScriptedSurface::rehearsal("T").on_case_start(move |n| {
            if n == 1 {
                cancel_tx.send_replace(true);
            }
        });
        let (result, events) = run(&orchestrator, &batch_id, &mut surface, cancel_rx).await;
        let report = result.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.filed, 1);
        assert_eq!(surface.cases_started(), 1);
        assert_eq!(store.progress(&batch_id).await.unwrap(), ProgressSnapshot::new(1, 3));
        assert!(matches!(events.last(), Some(BatchEvent::Cancelled)));
    }

    #[tokio::test]
    async fn test_unconfirmed_case_stays_pending() {
        let (_dir, store, batch_id) = setup(&["1", "2"]).await;
        let orchestrator = orchestrator(&store);

        let mut surface = ScriptedSurface::new()
            .with_missing_payload()
            .with_payload(ScriptedSurface::payload_for("OK-2"));
        let (result, _) = run(&orchestrator, &batch_id, &mut surface, not_cancelled()).await;
        let report = result.unwrap();

        assert_eq!(report.unconfirmed, 1);
        assert_eq!(report.filed, 1);
        assert_eq!(
            store.list_pending_internal_ids(&batch_id).await.unwrap(),
            vec!["1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fatal_stage_aborts_batch() {
        let (_dir, store, batch_id) = setup(&["1", "2"]).await;
        let orchestrator = orchestrator(&store);

        let mut surface = ScriptedSurface::rehearsal("T").with_court_hidden_for(3);
        let (result, events) = run(&orchestrator, &batch_id, &mut surface, not_cancelled()).await;

        match result {
            Err(BatchError::CaseAborted { internal_id, source }) => {
                assert_eq!(internal_id, "1");
                assert_eq!(source.stage, Stage::RegionCourt);
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(surface.cases_started(), 1);
        assert_eq!(store.progress(&batch_id).await.unwrap().processed, 0);
        assert!(matches!(events.last(), Some(BatchEvent::CaseFailed { .. })));
    }

    #[tokio::test]
    async fn test_rehearsal_records_nothing() {
        let (_dir, store, batch_id) = setup(&["1", "2"]).await;
        let orchestrator = orchestrator(&store).with_token_recording(false);

        let mut surface = ScriptedSurface::rehearsal("DRY");
        let (result, _) = run(&orchestrator, &batch_id, &mut surface, not_cancelled()).await;
        assert_eq!(result.unwrap().filed, 2);
        assert_eq!(store.progress(&batch_id).await.unwrap(), ProgressSnapshot::new(0, 2));
    }

    #[tokio::test]
    async fn test_lost_token_write_is_fatal() {
        let (dir, store, batch_id) = setup(&["1", "2"]).await;
        let orchestrator = orchestrator(&store);

        let db_path = dir.path().join("cases.db");
        let mut surface = ScriptedSurface::rehearsal("T").on_case_start(move |n| {
            if n == 1 {
                let conn = rusqlite::Connection::open(&db_path).unwrap();
                conn.execute_batch("DROP TABLE cases;").unwrap();
            }
        });
        let (result, _) = run(&orchestrator, &batch_id, &mut surface, not_cancelled()).await;

        match result {
            Err(BatchError::TokenNotRecorded { internal_id, token, .. }) => {
                assert_eq!(internal_id, "1");
                assert_eq!(token, "T-1");
            }
            other => panic!("expected lost token, got {:?}", other),
        }
        assert_eq!(surface.cases_started(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_case_is_skipped() {
        let (dir, store, batch_id) = setup(&["1", "2", "3"]).await;
        let orchestrator = orchestrator(&store);

        // Rebuild the table without constraints and blank case 2's row id,
        // so its row can no longer be decoded. NULL ids sort first.
        let conn = rusqlite::Connection::open(dir.path().join("cases.db")).unwrap();
        conn.execute_batch(
            "ALTER TABLE cases RENAME TO cases_old;
             CREATE TABLE cases AS SELECT * FROM cases_old;
             DROP TABLE cases_old;
             UPDATE cases SET id = NULL WHERE internal_id = '2';",
        )
        .unwrap();
        drop(conn);
        assert_eq!(
            store.list_pending_internal_ids(&batch_id).await.unwrap(),
            vec!["2".to_string(), "1".to_string(), "3".to_string()]
        );

        let mut surface = ScriptedSurface::rehearsal("T");
        let (result, events) = run(&orchestrator, &batch_id, &mut surface, not_cancelled()).await;
        let report = result.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.filed, 2);
        assert_eq!(surface.cases_started(), 2);
        assert!(events.iter().any(|e| matches!(
            e,
            BatchEvent::CaseSkipped { internal_id, .. } if internal_id == "2"
        )));
        assert_eq!(
            store.list_pending_internal_ids(&batch_id).await.unwrap(),
            vec!["2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_case_filed_elsewhere_is_not_refiled() {
        let (dir, store, batch_id) = setup(&["1", "2", "3"]).await;
        let orchestrator = orchestrator(&store);

        let db_path = dir.path().join("cases.db");
        let mut surface = ScriptedSurface::rehearsal("T").on_case_start(move |n| {
            if n == 1 {
                let conn = rusqlite::Connection::open(&db_path).unwrap();
                conn.execute(
                    "UPDATE cases SET talon_id = 'OTHER-2' WHERE internal_id = '2'",
                    [],
                )
                .unwrap();
            }
        });
        let (result, events) = run(&orchestrator, &batch_id, &mut surface, not_cancelled()).await;
        let report = result.unwrap();

        assert_eq!(report.pending, 3);
        assert_eq!(report.filed, 2);
        assert_eq!(report.already_done, 1);
        assert_eq!(surface.cases_started(), 2);
        assert!(!events.iter().any(|e| matches!(
            e,
            BatchEvent::CaseStarted { internal_id, .. } if internal_id == "2"
        )));

        let cases = store.list_cases(&batch_id).await.unwrap();
        let tokens: Vec<_> = cases.iter().map(|c| c.completion_token.as_deref()).collect();
        assert_eq!(tokens, vec![Some("T-1"), Some("OTHER-2"), Some("T-2")]);
    }

    #[tokio::test]
    async fn test_progress_read_failure_does_not_stop_batch() {
        let (dir, store, batch_id) = setup(&["1", "2"]).await;
        let orchestrator = orchestrator(&store).with_token_recording(false);

        let db_path = dir.path().join("cases.db");
        let mut surface = ScriptedSurface::rehearsal("T").on_case_start(move |n| {
            if n == 1 {
                let conn = rusqlite::Connection::open(&db_path).unwrap();
                conn.execute_batch("DROP TABLE cases;").unwrap();
            }
        });
        let (result, events) = run(&orchestrator, &batch_id, &mut surface, not_cancelled()).await;
        let report = result.unwrap();

        assert_eq!(report.filed, 1);
        assert_eq!(report.skipped, 1);
        assert!(!events.iter().any(|e| matches!(e, BatchEvent::Progress(_))));
    }

    #[tokio::test]
    async fn test_unknown_batch_is_empty() {
        let (_dir, store, _) = setup(&["1"]).await;
        let mut surface = ScriptedSurface::new();
        let (result, events) = run(
            &orchestrator(&store),
            &BatchId::new("BATCH-missing"),
            &mut surface,
            not_cancelled(),
        )
        .await;
        assert_eq!(result.unwrap(), BatchReport::default());
        assert!(surface.interactions().is_empty());
        assert!(matches!(
            events.as_slice(),
            [BatchEvent::Started { pending: 0, .. }]
        ));
    }
}
