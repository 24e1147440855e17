//! End-to-end batch runs against the in-memory portal.

use std::path::Path;

use courtfile::config::FilingConfig;
use courtfile::filing::scripted::Interaction;
use courtfile::filing::{
    BatchEvent, BatchOrchestrator, Control, Field, FormDriver, Location, ScriptedSurface,
};
use courtfile::models::{BatchId, CaseDraft, ProgressSnapshot};
use courtfile::repository::{AsyncSqlitePool, CaseStore};
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

fn sheet_row(id: &str, docs: &Path) -> CaseDraft {
    CaseDraft {
        plaintiff_name: Some("ТОО Кредит".into()),
        plaintiff_id: Some("050140001234".into()),
        plaintiff_side: Some("1".into()),
        plaintiff_type: Some("1".into()),
        plaintiff_address: Some("Алматы, Абая 1".into()),
        plaintiff_bank: Some("KZ00 0000".into()),
        defendant_id: Some("900101300123*910202400456".into()),
        defendant_side: Some("2".into()),
        defendant_phone: Some("+77010000001*+77010000002".into()),
        defendant_email: Some("a@example.kz".into()),
        rep_id: Some("880303500789".into()),
        rep_side: Some("3".into()),
        claim_amount: Some(250000.0),
        state_duty: Some(7500.0),
        claim_summary: Some("Взыскание задолженности".into()),
        claim_basis: Some("Договор займа".into()),
        region_id: Some("19".into()),
        court_id: Some("1901".into()),
        payment_doc_path: Some(docs.join("duty.pdf").display().to_string()),
        main_doc_path: Some(docs.join("claim.pdf").display().to_string()),
        other_doc_path: Some(format!(
            "{}*{}",
            docs.join("contract.pdf").display(),
            docs.join("missing.pdf").display()
        )),
        ..CaseDraft::new(id)
    }
}

async fn import(ids: &[&str]) -> (TempDir, CaseStore, BatchId) {
    let dir = tempfile::tempdir().unwrap();
    for name in ["duty.pdf", "claim.pdf", "contract.pdf"] {
        std::fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
    }
    let store = CaseStore::new(AsyncSqlitePool::from_path(&dir.path().join("courtfile.db")));
    store.ensure_schema().await.unwrap();
    let drafts: Vec<_> = ids.iter().map(|id| sheet_row(id, dir.path())).collect();
    let batch_id = store.create_batch(&drafts).await.unwrap();
    (dir, store, batch_id)
}

async fn drain(mut rx: mpsc::Receiver<BatchEvent>) -> Vec<BatchEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_full_batch_files_every_case() {
    let (_dir, store, batch_id) = import(&["101", "102"]).await;
    let orchestrator =
        BatchOrchestrator::new(store.clone(), FormDriver::new(FilingConfig::rehearsal()));

    let mut surface = ScriptedSurface::rehearsal("TALON");
    let (tx, rx) = mpsc::channel(256);
    let report = orchestrator
        .run(&batch_id, &mut surface, watch::channel(false).1, tx)
        .await
        .unwrap();
    let events = drain(rx).await;

    assert_eq!(report.pending, 2);
    assert_eq!(report.filed, 2);
    assert!(!report.cancelled);

    // one plaintiff, two defendants, one representative per case
    assert_eq!(surface.saved_participants(), 8);
    assert_eq!(surface.portal_opens(), 1);
    assert_eq!(
        surface.count_of(|i| *i == Interaction::Open(Location::Landing)),
        2
    );
    assert_eq!(surface.selections(Field::Region), vec!["19", "19"]);
    assert_eq!(surface.selections(Field::Court), vec!["1901", "1901"]);
    assert_eq!(surface.entries(Field::ClaimAmount), vec!["250000", "250000"]);

    let uploads: Vec<(Control, usize)> = surface
        .interactions()
        .iter()
        .filter_map(|i| match i {
            Interaction::Upload(control, files) => Some((*control, files.len())),
            _ => None,
        })
        .take(3)
        .collect();
    assert_eq!(
        uploads,
        vec![
            (Control::AttachFile, 1),
            (Control::UploadClaim, 1),
            (Control::AttachFile, 1),
        ]
    );

    let tokens: Vec<_> = store
        .list_cases(&batch_id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.completion_token)
        .collect();
    assert_eq!(
        tokens,
        vec![Some("TALON-1".to_string()), Some("TALON-2".to_string())]
    );

    assert!(matches!(events.first(), Some(BatchEvent::Started { pending: 2, .. })));
    assert!(matches!(
        events.last(),
        Some(BatchEvent::Progress(p)) if *p == ProgressSnapshot::new(2, 2)
    ));
}

#[tokio::test]
async fn test_interrupted_batch_resumes_where_it_stopped() {
    let (_dir, store, batch_id) = import(&["1", "2", "3", "4"]).await;
    let orchestrator =
        BatchOrchestrator::new(store.clone(), FormDriver::new(FilingConfig::rehearsal()));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut first = ScriptedSurface::rehearsal("A").on_case_start(move |n| {
        if n == 2 {
            cancel_tx.send_replace(true);
        }
    });
    let (tx, rx) = mpsc::channel(256);
    let report = orchestrator
        .run(&batch_id, &mut first, cancel_rx, tx)
        .await
        .unwrap();
    drain(rx).await;

    assert!(report.cancelled);
    assert_eq!(report.filed, 2);
    assert_eq!(
        store.list_pending_internal_ids(&batch_id).await.unwrap(),
        vec!["3".to_string(), "4".to_string()]
    );

    let mut second = ScriptedSurface::rehearsal("B");
    let (tx, rx) = mpsc::channel(256);
    let report = orchestrator
        .run(&batch_id, &mut second, watch::channel(false).1, tx)
        .await
        .unwrap();
    drain(rx).await;

    assert_eq!(report.pending, 2);
    assert_eq!(report.filed, 2);
    assert_eq!(second.cases_started(), 2);

    let tokens: Vec<_> = store
        .list_cases(&batch_id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|c| c.completion_token)
        .collect();
    assert_eq!(tokens, vec!["A-1", "A-2", "B-1", "B-2"]);
    assert!(store.progress(&batch_id).await.unwrap().is_complete());
}

#[tokio::test]
async fn test_batches_are_isolated() {
    let (_dir, store, first) = import(&["1", "2"]).await;
    let second = store
        .create_batch(&[CaseDraft::new("1"), CaseDraft::new("9")])
        .await
        .unwrap();
    let orchestrator =
        BatchOrchestrator::new(store.clone(), FormDriver::new(FilingConfig::rehearsal()));

    let mut surface = ScriptedSurface::rehearsal("T");
    let (tx, rx) = mpsc::channel(256);
    orchestrator
        .run(&first, &mut surface, watch::channel(false).1, tx)
        .await
        .unwrap();
    drain(rx).await;

    assert!(store.progress(&first).await.unwrap().is_complete());
    assert_eq!(
        store.progress(&second).await.unwrap(),
        ProgressSnapshot::new(0, 2)
    );
    assert_eq!(
        store.list_pending_internal_ids(&second).await.unwrap(),
        vec!["1".to_string(), "9".to_string()]
    );
}
