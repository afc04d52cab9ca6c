#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{path::PathBuf, sync::Arc};

use missive_common::{BatchId, MailMessage, Session};
use missive_store::{
    ContentStore, FileContentStore, MemoryContentStore, StoreConfig, StoreError,
};

fn message(subject: &str) -> MailMessage {
    MailMessage::builder()
        .from("wiki@example.org")
        .to("a@example.org")
        .to("b@example.org")
        .bcc("hidden@example.org")
        .subject(subject)
        .body("Body")
        .build()
}

/// Behaviour every backend must share
async fn exercise(store: Arc<dyn ContentStore>) {
    let session = Session::default();
    let batch = BatchId::generate();
    let other = BatchId::generate();

    let first = message("first");
    let second = message("second");
    let first_id = store.save(&batch, &first).await.unwrap();
    let second_id = store.save(&batch, &second).await.unwrap();
    store.save(&other, &message("other")).await.unwrap();

    let mut expected = vec![first_id, second_id];
    expected.sort();
    assert_eq!(store.list(&batch).await.unwrap(), expected);
    assert_eq!(store.load(&session, &batch, &second_id).await.unwrap(), second);

    store.delete(&batch, &first_id).await.unwrap();
    assert_eq!(store.list(&batch).await.unwrap(), vec![second_id]);
    assert_eq!(store.list(&other).await.unwrap().len(), 1);

    let err = store.load(&session, &batch, &first_id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(err.to_string().contains(&first_id.to_string()));
}

#[tokio::test]
async fn test_memory_store_contract() {
    exercise(Arc::new(MemoryContentStore::new())).await;
}

#[tokio::test]
async fn test_file_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileContentStore::builder().path(dir.path()).build().unwrap();
    store.init().unwrap();

    exercise(Arc::new(store)).await;
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let batch = BatchId::generate();
    let stored = message("persistent");

    let id = {
        let store = FileContentStore::builder().path(dir.path()).build().unwrap();
        store.init().unwrap();
        store.save(&batch, &stored).await.unwrap()
    };

    let reopened = StoreConfig::File(FileContentStore::builder().path(dir.path()).build().unwrap())
        .into_content_store()
        .unwrap();

    let loaded = reopened
        .load(&Session::default(), &batch, &id)
        .await
        .unwrap();
    assert_eq!(loaded, stored);
}

#[test]
fn test_path_validation_rejects_parent_dir() {
    let result = FileContentStore::builder()
        .path(PathBuf::from("/var/spool/../etc/passwd"))
        .build();

    assert!(result.unwrap_err().to_string().contains("cannot contain '..'"));
}

#[test]
fn test_path_validation_rejects_relative_paths() {
    let result = FileContentStore::builder()
        .path(PathBuf::from("relative/path"))
        .build();

    assert!(result.unwrap_err().to_string().contains("must be absolute"));
}

#[test]
#[cfg(unix)]
fn test_path_validation_rejects_unix_system_directories() {
    let system_paths = vec![
        "/etc/spool",
        "/bin/messages",
        "/sbin/mail",
        "/usr/bin/data",
        "/boot/spool",
        "/sys/messages",
        "/proc/mail",
        "/dev/spool",
    ];

    for path in system_paths {
        let result = FileContentStore::builder().path(path).build();

        assert!(
            result.unwrap_err().to_string().contains("system directory"),
            "Wrong error for path {path}"
        );
    }
}

#[test]
#[cfg(unix)]
fn test_deserialization_validates_unix_path() {
    let invalid_config = r#"(
        path: "/etc/passwd"
    )"#;

    let result: Result<FileContentStore, _> = ron::from_str(invalid_config);
    assert!(result.is_err());

    let valid_config = r#"(
        path: "/var/spool/missive"
    )"#;

    let result: Result<FileContentStore, _> = ron::from_str(valid_config);
    assert!(
        result.is_ok(),
        "Valid path rejected during deserialization: {:?}",
        result.unwrap_err()
    );
}
