use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use super::*;
use crate::{
    assets::locator::{AssetLocator, HttpFetcher, LocalLayout},
    config::Credentials,
};

#[derive(Debug)]
struct ProbeRemote {
    calls: Arc<AtomicUsize>,
    fail_writes: bool,
}

impl StorageBackend for ProbeRemote {
    fn kind(&self) -> BackendKind {
        BackendKind::AzureBlob
    }

    fn put(
        &self,
        key: &ObjectKey,
        _bytes: &[u8],
        _content_type: &str,
    ) -> TicketDocResult<AssetReference> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(TicketDocError::backend_write("503 Service Unavailable"));
        }
        AssetReference::parse(&format!(
            "https://acct.blob.core.windows.net/uploads/{}?sp=r",
            key.path()
        ))
    }

    fn delete(&self, _reference: &AssetReference) -> TicketDocResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn owns(&self, reference: &AssetReference) -> bool {
        reference.host().as_deref() == Some("acct.blob.core.windows.net")
    }
}

fn allow(exts: &[&str]) -> BTreeSet<String> {
    exts.iter().map(|e| e.to_string()).collect()
}

fn probe(fail_writes: bool) -> (Box<dyn StorageBackend>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let remote = ProbeRemote {
        calls: Arc::clone(&calls),
        fail_writes,
    };
    (Box::new(remote), calls)
}

fn locator(root: &Path) -> AssetLocator {
    AssetLocator::with_fetcher(
        LocalLayout {
            root: root.to_path_buf(),
            upload_prefix: "uploads".to_string(),
            legacy_roots: vec![],
        },
        Arc::new(HttpFetcher::new(Duration::from_secs(1)).unwrap()),
    )
}

fn file_count(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn disallowed_extension_fails_before_any_backend_call() {
    let tmp = tempfile::tempdir().unwrap();
    let (remote, calls) = probe(false);
    let selector = BackendSelector::with_backends(
        allow(&["png", "jpg", "pdf"]),
        Some(remote),
        LocalBackend::new(tmp.path(), "uploads"),
    );

    let err = selector.put("malware.exe", b"MZ", "events").unwrap_err();
    assert!(
        matches!(err, TicketDocError::UnsupportedAssetType { ref extension } if extension == "exe"),
        "{err}"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(file_count(tmp.path()), 0);
}

#[test]
fn remote_success_returns_remote_reference() {
    let tmp = tempfile::tempdir().unwrap();
    let (remote, calls) = probe(false);
    let selector = BackendSelector::with_backends(
        allow(&["png"]),
        Some(remote),
        LocalBackend::new(tmp.path(), "uploads"),
    );

    let r = selector.put("Poster Final.PNG", b"png", "events").unwrap();
    assert!(r.is_remote());
    assert!(r.as_str().contains("/uploads/events/Poster_Final_"), "{r}");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(file_count(tmp.path()), 0);
}

#[test]
fn failed_remote_write_falls_back_to_local_and_resolves() {
    let tmp = tempfile::tempdir().unwrap();
    let (remote, calls) = probe(true);
    let selector = BackendSelector::with_backends(
        allow(&["png"]),
        Some(remote),
        LocalBackend::new(tmp.path(), "uploads"),
    );

    let bytes = b"\x89PNG not really".to_vec();
    let r = selector.put("poster.png", &bytes, "events").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!r.is_remote());
    assert!(r.as_str().starts_with("/uploads/events/poster_"), "{r}");

    assert_eq!(locator(tmp.path()).resolve(&r).unwrap(), bytes);
}

#[test]
fn unreachable_azure_endpoint_falls_back_to_local() {
    let tmp = tempfile::tempdir().unwrap();
    let config = BackendConfig {
        kind: BackendKind::AzureBlob,
        credentials: Some(Credentials::AzureSharedKey {
            account_name: "acct".to_string(),
            account_key: "a2V5".to_string(),
        }),
        endpoint: Some("http://127.0.0.1:1/acct".to_string()),
        local_root: tmp.path().to_path_buf(),
        fetch_timeout_secs: 2,
        ..BackendConfig::default()
    };
    let selector = BackendSelector::new(&config);
    assert_eq!(selector.preferred_kind(), BackendKind::AzureBlob);

    let r = selector.put("qr.png", b"qr-bytes", "qrcodes").unwrap();
    assert!(!r.is_remote());
    assert_eq!(locator(tmp.path()).resolve(&r).unwrap(), b"qr-bytes");
}

#[test]
fn missing_credentials_fail_the_write_without_fallback() {
    let tmp = tempfile::tempdir().unwrap();
    let config = BackendConfig {
        kind: BackendKind::S3,
        credentials: None,
        local_root: tmp.path().to_path_buf(),
        ..BackendConfig::default()
    };
    let selector = BackendSelector::new(&config);

    let err = selector.put("poster.png", b"png", "events").unwrap_err();
    assert!(matches!(err, TicketDocError::Configuration(_)), "{err}");
    assert_eq!(file_count(tmp.path()), 0);
    assert!(selector.remote().is_err());
}

#[test]
fn local_round_trip_is_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let config = BackendConfig {
        local_root: tmp.path().to_path_buf(),
        ..BackendConfig::default()
    };
    let selector = BackendSelector::new(&config);
    let bytes: Vec<u8> = (0..=255).collect();

    let r = selector.put("ticket.pdf", &bytes, "documents").unwrap();
    assert_eq!(locator(tmp.path()).resolve(&r).unwrap(), bytes);

    assert!(selector.delete(&r).unwrap());
    assert!(!selector.delete(&r).unwrap());
}

#[test]
fn invalid_folders_are_rejected_before_io() {
    let tmp = tempfile::tempdir().unwrap();
    let (remote, calls) = probe(false);
    let selector = BackendSelector::with_backends(
        allow(&["png"]),
        Some(remote),
        LocalBackend::new(tmp.path(), "uploads"),
    );
    assert!(selector.put("a.png", b"x", "../etc").is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn delete_with_unknown_host_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let (remote, calls) = probe(false);
    let selector = BackendSelector::with_backends(
        allow(&["png"]),
        Some(remote),
        LocalBackend::new(tmp.path(), "uploads"),
    );
    std::fs::create_dir_all(tmp.path().join("events")).unwrap();
    std::fs::write(tmp.path().join("events/a.png"), b"keep").unwrap();

    let foreign =
        AssetReference::parse("https://evil.example.com/uploads/events/a.png?sig=x").unwrap();
    let err = selector.delete(&foreign).unwrap_err();
    assert!(
        matches!(err, TicketDocError::UnknownBackend { ref host } if host == "evil.example.com"),
        "{err}"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(tmp.path().join("events/a.png").is_file());
}

#[test]
fn delete_routes_owned_remote_reference_to_its_backend() {
    let tmp = tempfile::tempdir().unwrap();
    let (remote, calls) = probe(false);
    let selector = BackendSelector::with_backends(
        allow(&["png"]),
        Some(remote),
        LocalBackend::new(tmp.path(), "uploads"),
    );
    let ours =
        AssetReference::parse("https://acct.blob.core.windows.net/uploads/events/a.png?sp=r")
            .unwrap();
    assert!(selector.delete(&ours).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn local_only_selector_rejects_remote_deletes() {
    let tmp = tempfile::tempdir().unwrap();
    let selector =
        BackendSelector::with_backends(allow(&["png"]), None, LocalBackend::new(tmp.path(), "uploads"));
    let r = AssetReference::parse("https://acct.blob.core.windows.net/uploads/a.png").unwrap();
    assert!(matches!(
        selector.delete(&r),
        Err(TicketDocError::UnknownBackend { .. })
    ));
}
