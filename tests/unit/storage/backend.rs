use super::*;

fn key(folder: &str, name: &str) -> ObjectKey {
    ObjectKey {
        folder: folder.to_string(),
        name: name.to_string(),
    }
}

#[test]
fn put_writes_under_root_and_returns_prefixed_reference() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = LocalBackend::new(tmp.path(), "uploads");

    let r = backend
        .put(&key("events", "p_0a1b2c3d.png"), b"png-bytes", "image/png")
        .unwrap();
    assert_eq!(r, AssetReference::local("/uploads/events/p_0a1b2c3d.png"));
    assert_eq!(
        std::fs::read(tmp.path().join("events/p_0a1b2c3d.png")).unwrap(),
        b"png-bytes"
    );
}

#[test]
fn path_for_maps_references_back_to_files() {
    let backend = LocalBackend::new("/data/uploads", "/uploads/");
    assert_eq!(
        backend.path_for("/uploads/events/a.png").unwrap(),
        PathBuf::from("/data/uploads/events/a.png")
    );
    assert_eq!(
        backend.path_for("events/a.png").unwrap(),
        PathBuf::from("/data/uploads/events/a.png")
    );
    assert!(backend.path_for("/uploads/../etc/passwd").is_err());
    assert!(backend.path_for("/").is_err());
}

#[test]
fn delete_removes_existing_file_only() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = LocalBackend::new(tmp.path(), "uploads");
    let r = backend.put(&key("docs", "t.pdf"), b"%PDF", "application/pdf").unwrap();

    assert!(backend.delete(&r).unwrap());
    assert!(!tmp.path().join("docs/t.pdf").exists());
    assert!(!backend.delete(&r).unwrap());
}

#[test]
fn local_backend_owns_only_local_references() {
    let backend = LocalBackend::new("/x", "uploads");
    assert!(backend.owns(&AssetReference::local("/uploads/a.png")));
    let remote = AssetReference::parse("https://h.example/c/a.png").unwrap();
    assert!(!backend.owns(&remote));
    assert!(backend.delete(&remote).is_err());
}

#[test]
fn create_backend_requires_remote_credentials() {
    let cfg = BackendConfig {
        kind: BackendKind::AzureBlob,
        ..BackendConfig::default()
    };
    assert!(matches!(
        create_backend(&cfg),
        Err(TicketDocError::Configuration(_))
    ));

    let cfg = BackendConfig {
        kind: BackendKind::S3,
        ..BackendConfig::default()
    };
    assert!(matches!(
        create_backend(&cfg),
        Err(TicketDocError::Configuration(_))
    ));

    let local = create_backend(&BackendConfig::default()).unwrap();
    assert_eq!(local.kind(), BackendKind::Local);
}
