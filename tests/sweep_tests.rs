/// Bulk closure tests
///
/// Period-change sweeps and explicit bulk closes against an in-memory store.
/// Run with: cargo test --test sweep_tests

use hallpass::data::schedule::BellPeriod;
use hallpass::{
    tables, EngineConfig, MemoryStore, PassEngine, PassStatus, StaffDirectory, SweepCoordinator,
    TabularStore,
};
use std::sync::Arc;
use std::time::Duration;

async fn new_sweep() -> (Arc<MemoryStore>, Arc<PassEngine>, SweepCoordinator) {
    let store = Arc::new(MemoryStore::new());
    store.bootstrap_standard_tables().await;
    let config = EngineConfig::new()
        .base_delay(Duration::from_millis(1))
        .sweep_batch_size(2)
        .sweep_batch_pause(Duration::from_millis(1));
    let engine = Arc::new(PassEngine::with_config(store.clone(), config));
    let directory = Arc::new(StaffDirectory::new(engine.data()));
    let sweep = SweepCoordinator::new(Arc::clone(&engine), directory);
    (store, engine, sweep)
}

async fn seed_staff(store: &MemoryStore, table: &str, staff_id: &str, period_override: &str) {
    let mut row = vec![
        staff_id.to_string(),
        format!("{staff_id} Name"),
        format!("{staff_id}@school.example"),
    ];
    if table == tables::SUPPORT {
        row.push(period_override.to_string());
    }
    store.seed_row(table, row).await;
}

fn period(name: &str) -> BellPeriod {
    BellPeriod {
        period: name.to_string(),
        start_time: "08:00".to_string(),
        end_time: "08:45".to_string(),
        day_type: "A".to_string(),
    }
}

#[tokio::test]
async fn sweep_closes_out_passes_and_honors_support_override() {
    let (store, engine, sweep) = new_sweep().await;
    seed_staff(&store, tables::SUPPORT, "SUP1", "TRUE").await;

    // one OUT pass, one IN pass held by support staff with the override
    let out_pass = engine.open_pass("S1", "T1", "MEDIA", "").await.unwrap();
    let in_pass = engine.open_pass("S2", "T1", "COUNSELOR", "").await.unwrap();
    engine
        .update_pass_status(&in_pass, PassStatus::In, "COUNSELOR", "SUP1", "", "")
        .await
        .unwrap();

    let report = sweep
        .auto_close_passes(Some(&period("1")), Some(&period("2")))
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert!(engine.current_student_pass("S1").await.unwrap().is_none());
    assert!(engine.current_student_pass("S2").await.unwrap().is_some());

    let archive = store.read_all(tables::PERMANENT_RECORD).await.unwrap();
    assert_eq!(archive.len(), 2); // header + the OUT pass
    assert_eq!(archive[1][0], out_pass);
}

#[tokio::test]
async fn sweep_closes_in_pass_without_override() {
    let (store, engine, sweep) = new_sweep().await;
    seed_staff(&store, tables::SUPPORT, "SUP1", "FALSE").await;

    let pass_id = engine.open_pass("S1", "T1", "COUNSELOR", "").await.unwrap();
    engine
        .update_pass_status(&pass_id, PassStatus::In, "COUNSELOR", "SUP1", "", "")
        .await
        .unwrap();

    let report = sweep.auto_close_passes(None, None).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(engine.current_student_pass("S1").await.unwrap().is_none());
}

#[tokio::test]
async fn sweep_closes_in_pass_held_by_teacher() {
    let (store, engine, sweep) = new_sweep().await;
    seed_staff(&store, tables::TEACHERS, "T2", "").await;

    let pass_id = engine.open_pass("S1", "T1", "SCIENCE", "").await.unwrap();
    engine
        .update_pass_status(&pass_id, PassStatus::In, "SCIENCE", "T2", "", "")
        .await
        .unwrap();

    // teachers never hold a pass across a period boundary
    let report = sweep.auto_close_passes(None, None).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(engine.current_student_pass("S1").await.unwrap().is_none());
}

#[tokio::test]
async fn sweep_closes_in_pass_with_unknown_staff() {
    let (_store, engine, sweep) = new_sweep().await;

    let pass_id = engine.open_pass("S1", "T1", "MEDIA", "").await.unwrap();
    engine
        .update_pass_status(&pass_id, PassStatus::In, "MEDIA", "GHOST", "", "")
        .await
        .unwrap();

    let report = sweep.auto_close_passes(None, None).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(engine.current_student_pass("S1").await.unwrap().is_none());
}

#[tokio::test]
async fn sweep_processes_more_passes_than_one_batch() {
    let (store, engine, sweep) = new_sweep().await;

    for i in 0..5 {
        engine
            .open_pass(&format!("S{i}"), "T1", "MEDIA", "")
            .await
            .unwrap();
    }

    // batch size is 2, so this spans three batches
    let report = sweep.auto_close_passes(None, None).await.unwrap();
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.failed, 0);

    let actives = store.read_all(tables::ACTIVE_PASSES).await.unwrap();
    assert_eq!(actives.len(), 1);
    let archive = store.read_all(tables::PERMANENT_RECORD).await.unwrap();
    assert_eq!(archive.len(), 6);
}

#[tokio::test]
async fn bulk_close_isolates_per_pass_failures() {
    let (_store, engine, sweep) = new_sweep().await;

    let a = engine.open_pass("S1", "T1", "MEDIA", "").await.unwrap();
    let b = engine.open_pass("S2", "T1", "GYM", "").await.unwrap();
    let ids = vec![a.clone(), "no-such-pass".to_string(), b.clone()];

    let report = sweep.bulk_close_passes(&ids, "A1", "hallway cleared").await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].pass_id, "no-such-pass");
    assert!(report.errors[0].error.contains("no-such-pass"));

    assert!(engine.current_student_pass("S1").await.unwrap().is_none());
    assert!(engine.current_student_pass("S2").await.unwrap().is_none());
}

#[tokio::test]
async fn sweep_survives_failed_staff_lookup() {
    let (store, engine, sweep) = new_sweep().await;

    let out_pass = engine.open_pass("S1", "T1", "MEDIA", "").await.unwrap();
    let in_pass = engine.open_pass("S2", "T1", "GYM", "").await.unwrap();
    engine
        .update_pass_status(&in_pass, PassStatus::In, "GYM", "T9", "", "")
        .await
        .unwrap();

    // prime the bulk cache so the injected failures hit the staff lookup,
    // which then fails through the initial attempt and all three retries
    engine.all_active_passes().await.unwrap();
    store.fail_next_ops(4);

    let report = sweep.auto_close_passes(None, None).await.unwrap();

    // the OUT pass still closed; only the unresolvable IN pass is reported
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].pass_id, in_pass);
    assert!(report.errors[0].error.contains("retries exhausted"));

    assert!(engine.current_student_pass("S1").await.unwrap().is_none());
    assert!(engine.current_student_pass("S2").await.unwrap().is_some());

    let archive = store.read_all(tables::PERMANENT_RECORD).await.unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive[1][0], out_pass);
}

#[tokio::test]
async fn sweep_notes_record_period_transition() {
    let (store, engine, sweep) = new_sweep().await;

    let pass_id = engine.open_pass("S1", "T1", "MEDIA", "").await.unwrap();
    sweep
        .auto_close_passes(Some(&period("3")), Some(&period("4")))
        .await
        .unwrap();

    let archive = store.read_all(tables::PERMANENT_RECORD).await.unwrap();
    assert_eq!(archive[1][0], pass_id);
    assert!(archive[1][9].contains("3 -> 4"));
}
