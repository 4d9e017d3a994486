use chrono::TimeZone as _;

use super::*;

fn shared_key_config(endpoint: Option<&str>) -> BackendConfig {
    BackendConfig {
        kind: BackendKind::AzureBlob,
        credentials: Some(Credentials::AzureSharedKey {
            account_name: "acct".to_string(),
            account_key: "a2V5".to_string(),
        }),
        container: "uploads".to_string(),
        endpoint: endpoint.map(str::to_string),
        fetch_timeout_secs: 2,
        ..BackendConfig::default()
    }
}

fn expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

#[test]
fn account_sas_matches_known_signature() {
    let backend = AzureBlobBackend::from_config(&shared_key_config(None)).unwrap();
    let sas = backend.account_sas("r", expiry()).unwrap();
    assert_eq!(
        sas,
        "sv=2019-12-12&ss=b&srt=o&sp=r&se=2030-01-01T00%3A00%3A00Z&spr=https\
         &sig=bYn5LzY9N96JfI1NoDgoA129Ckz%2FvtOUQPnZlsPF5rA%3D"
    );
}

#[test]
fn http_endpoints_sign_for_both_protocols() {
    let cfg = BackendConfig {
        credentials: Some(Credentials::AzureSharedKey {
            account_name: "devstoreaccount1".to_string(),
            account_key: "a2V5".to_string(),
        }),
        ..shared_key_config(Some("http://127.0.0.1:10000/devstoreaccount1"))
    };
    let backend = AzureBlobBackend::from_config(&cfg).unwrap();
    let sas = backend.account_sas("d", expiry()).unwrap();
    assert!(sas.contains("&spr=https%2Chttp&"));
    assert!(sas.ends_with("&sig=UtcTiLjhEkYjRHsPbX2eFRcL1FBObrPXoKkTvwu%2FTZ8%3D"));
}

#[test]
fn read_token_expiry_is_visible_on_the_parsed_reference() {
    let backend = AzureBlobBackend::from_config(&shared_key_config(None)).unwrap();
    let url = backend.blob_url("uploads", "events/p_1234abcd.png");
    assert_eq!(
        url,
        "https://acct.blob.core.windows.net/uploads/events/p_1234abcd.png"
    );
    let sas = backend.account_sas("r", expiry()).unwrap();
    let reference = AssetReference::parse(&format!("{url}?{sas}")).unwrap();
    match reference {
        AssetReference::Remote { expires_at, .. } => assert_eq!(expires_at, Some(expiry())),
        other => panic!("expected remote, got {other:?}"),
    }
}

#[test]
fn connection_string_keeps_padding_in_keys() {
    let cs = ConnectionString::parse(
        "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5==;EndpointSuffix=core.chinacloudapi.cn",
    )
    .unwrap();
    assert_eq!(cs.account_name, "acct");
    assert_eq!(cs.account_key, "a2V5==");
    assert_eq!(cs.blob_endpoint(), "https://acct.blob.core.chinacloudapi.cn");

    assert!(ConnectionString::parse("AccountName=acct").is_err());
    assert!(ConnectionString::parse("garbage").is_err());
}

#[test]
fn connection_string_blob_endpoint_wins_over_suffix() {
    let cfg = BackendConfig {
        credentials: Some(Credentials::AzureConnectionString {
            value: "AccountName=devstoreaccount1;AccountKey=a2V5;BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1;"
                .to_string(),
        }),
        ..shared_key_config(None)
    };
    let backend = AzureBlobBackend::from_config(&cfg).unwrap();
    assert_eq!(
        backend.blob_url("uploads", "a.png"),
        "http://127.0.0.1:10000/devstoreaccount1/uploads/a.png"
    );
}

#[test]
fn missing_or_foreign_credentials_are_configuration_errors() {
    let none = BackendConfig {
        credentials: None,
        ..shared_key_config(None)
    };
    assert!(matches!(
        AzureBlobBackend::from_config(&none),
        Err(TicketDocError::Configuration(_))
    ));

    let s3 = BackendConfig {
        credentials: Some(Credentials::S3 {
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            region: "us-east-1".to_string(),
        }),
        ..shared_key_config(None)
    };
    assert!(matches!(
        AzureBlobBackend::from_config(&s3),
        Err(TicketDocError::Configuration(_))
    ));

    let bad_key = BackendConfig {
        credentials: Some(Credentials::AzureSharedKey {
            account_name: "acct".to_string(),
            account_key: "not base64!".to_string(),
        }),
        ..shared_key_config(None)
    };
    assert!(matches!(
        AzureBlobBackend::from_config(&bad_key),
        Err(TicketDocError::Configuration(_))
    ));
}

#[test]
fn blob_location_skips_endpoint_path_and_reads_container() {
    let cfg = BackendConfig {
        credentials: Some(Credentials::AzureSharedKey {
            account_name: "devstoreaccount1".to_string(),
            account_key: "a2V5".to_string(),
        }),
        ..shared_key_config(Some("http://127.0.0.1:10000/devstoreaccount1"))
    };
    let backend = AzureBlobBackend::from_config(&cfg).unwrap();
    let r = AssetReference::parse(
        "http://127.0.0.1:10000/devstoreaccount1/legacy/events/p_1.png?sv=2019-12-12&sig=x",
    )
    .unwrap();
    assert_eq!(
        backend.blob_location(&r),
        Some(("legacy".to_string(), "events/p_1.png".to_string()))
    );
}

#[test]
fn owns_matches_account_host_only() {
    let backend = AzureBlobBackend::from_config(&shared_key_config(None)).unwrap();
    let ours =
        AssetReference::parse("https://ACCT.blob.core.windows.net/uploads/events/a.png").unwrap();
    let theirs =
        AssetReference::parse("https://other.blob.core.windows.net/uploads/events/a.png").unwrap();
    assert!(backend.owns(&ours));
    assert!(!backend.owns(&theirs));
    assert!(!backend.owns(&AssetReference::local("/uploads/events/a.png")));
    assert!(backend.blob_location(&theirs).is_none());
}

#[test]
fn put_to_unreachable_endpoint_is_backend_write_error() {
    let backend =
        AzureBlobBackend::from_config(&shared_key_config(Some("http://127.0.0.1:1/acct"))).unwrap();
    let key = ObjectKey {
        folder: "events".to_string(),
        name: "p_1234abcd.png".to_string(),
    };
    let err = backend.put(&key, b"bytes", "image/png").unwrap_err();
    assert!(matches!(err, TicketDocError::BackendWrite(_)), "{err}");
}
