mod helpers;

use helpers::{bytes, entry, setup_test_app, setup_test_app_with, test_config};
use stowage_core::AppError;
use stowage_db::FileRecordStore;
use stowage_upload::{BatchFileOutcome, BatchUpload, UploadOutcome};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[tokio::test]
async fn test_batch_with_one_duplicate_stores_the_rest() {
    let app = setup_test_app().await;
    let cancel = CancellationToken::new();

    let existing = app
        .service
        .upload(app.single("c.txt", bytes(1_000)), &cancel)
        .await
        .unwrap();
    assert!(matches!(existing, UploadOutcome::Stored(_)));

    let report = app
        .service
        .upload_batch(
            BatchUpload {
                owner_id: app.owner_id,
                folder_id: None,
                files: vec![
                    entry("a.txt", bytes(100)),
                    entry("b.png", bytes(200)),
                    entry("c.txt", bytes(1_010)),
                    entry("d.mp4", bytes(300)),
                    entry("e.zip", bytes(400)),
                ],
            },
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.success_count, 4);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.results[2].name, "c.txt");
    assert_eq!(report.results[2].outcome, BatchFileOutcome::DuplicateRejected);
    assert!(report.results[2].reason.is_some());

    for name in ["a.txt", "b.png", "d.mp4", "e.zip"] {
        let record = app
            .store
            .find_by_owner_and_name(app.owner_id, name)
            .await
            .unwrap()
            .unwrap();
        assert!(app.storage.exists(&record.path).await.unwrap());
    }
    assert_eq!(app.store.file_count(app.owner_id).await, 5);
    assert_eq!(app.files_on_disk(), 5);
    assert_eq!(app.service.admission().in_flight(), 0);
}

#[tokio::test]
async fn test_batch_name_conflict_is_not_replaced() {
    let app = setup_test_app().await;
    let cancel = CancellationToken::new();

    app.service
        .upload(app.single("report.pdf", bytes(10_000)), &cancel)
        .await
        .unwrap();

    let report = app
        .service
        .upload_batch(
            BatchUpload {
                owner_id: app.owner_id,
                folder_id: None,
                files: vec![entry("report.pdf", bytes(50_000))],
            },
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.results[0].outcome, BatchFileOutcome::NameConflict);
    let current = app
        .store
        .find_by_owner_and_name(app.owner_id, "report.pdf")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.size, 10_000);
}

#[tokio::test]
async fn test_batch_over_quota_is_rejected_whole() {
    let app = setup_test_app().await;
    let cancel = CancellationToken::new();
    app.store.set_storage_limit(app.owner_id, 1_000).await;

    let err = app
        .service
        .upload_batch(
            BatchUpload {
                owner_id: app.owner_id,
                folder_id: None,
                files: vec![
                    entry("a.txt", bytes(400)),
                    entry("b.txt", bytes(400)),
                    entry("c.txt", bytes(400)),
                ],
            },
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::QuotaExceeded {
            used: 0,
            incoming: 1_200,
            limit: 1_000
        }
    ));
    assert_eq!(app.files_on_disk(), 0);
    assert_eq!(app.store.file_count(app.owner_id).await, 0);
    assert_eq!(app.service.admission().in_flight(), 0);
}

#[tokio::test]
async fn test_batch_rejects_empty_request_and_empty_entries() {
    let app = setup_test_app().await;
    let cancel = CancellationToken::new();

    let err = app
        .service
        .upload_batch(
            BatchUpload {
                owner_id: app.owner_id,
                folder_id: None,
                files: Vec::new(),
            },
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = app
        .service
        .upload_batch(
            BatchUpload {
                owner_id: app.owner_id,
                folder_id: None,
                files: vec![entry("a.txt", bytes(10)), entry("empty.txt", Vec::new())],
            },
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(app.files_on_disk(), 0);
}

#[tokio::test]
async fn test_batch_entry_failures_are_isolated() {
    let mut config = test_config();
    config.max_file_size_bytes = 1_000;
    let app = setup_test_app_with(config).await;
    let cancel = CancellationToken::new();

    let mut short = entry("short.bin", bytes(50));
    short.size = 100;

    app.store.fail_next_create();
    let report = app
        .service
        .upload_batch(
            BatchUpload {
                owner_id: app.owner_id,
                folder_id: None,
                files: vec![
                    entry("first.txt", bytes(10)),
                    entry("huge.png", bytes(2_000)),
                    short,
                    entry("last.txt", bytes(10)),
                ],
            },
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(
        report.results[0].outcome,
        BatchFileOutcome::MetadataPersistFailure
    );
    assert_eq!(report.results[1].outcome, BatchFileOutcome::ValidationError);
    assert_eq!(report.results[2].outcome, BatchFileOutcome::IncompleteWrite);
    assert_eq!(report.results[3].outcome, BatchFileOutcome::Stored);
    assert_eq!(report.success_count, 1);

    assert_eq!(app.files_on_disk(), 1);
    assert_eq!(app.store.file_count(app.owner_id).await, 1);
}

#[tokio::test]
async fn test_batch_uses_existing_folder() {
    let app = setup_test_app().await;
    let cancel = CancellationToken::new();
    let folder = Uuid::new_v4();
    app.store.add_folder(app.owner_id, folder).await;

    let report = app
        .service
        .upload_batch(
            BatchUpload {
                owner_id: app.owner_id,
                folder_id: Some(folder),
                files: vec![entry("a.txt", bytes(10)), entry("b.txt", bytes(20))],
            },
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.success_count, 2);
    let listed = app
        .service
        .list_files(app.owner_id, Some(folder))
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn test_batch_denied_when_gate_full() {
    let mut config = test_config();
    config.max_concurrent_uploads = 1;
    let app = setup_test_app_with(config).await;
    let cancel = CancellationToken::new();

    let _held = app.service.admission().try_acquire().unwrap();
    let err = app
        .service
        .upload_batch(
            BatchUpload {
                owner_id: app.owner_id,
                folder_id: None,
                files: vec![entry("a.txt", bytes(10))],
            },
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AdmissionDenied { .. }));
}
