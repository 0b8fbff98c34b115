use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use aulad::hashing::{hash_password, insecure_hash, matches};
use aulad::service::AppService;
use aulad::store::LocalStore;
use aulad::sync::{SyncClient, SyncConfig};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn offline_service(workspace: &std::path::Path) -> AppService {
    let store = LocalStore::open(workspace).expect("open store");
    AppService::new(store, Arc::new(SyncClient::new(SyncConfig::default())))
}

#[test]
fn digest_formats_never_collide() {
    let strong = hash_password("hunter2");
    let weak = insecure_hash("hunter2");
    assert_eq!(strong.len(), 64);
    assert!(strong.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(weak.starts_with("insecure_"));
    assert_ne!(strong, weak);
}

#[test]
fn verify_round_trip() {
    let workspace = temp_dir("aulad-auth-roundtrip");
    let svc = offline_service(&workspace);

    svc.set_password("hunter2").expect("set password");
    assert!(svc.verify_password("hunter2"));
    assert!(!svc.verify_password("hunter3"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn legacy_insecure_hash_still_verifies() {
    let workspace = temp_dir("aulad-auth-legacy");
    let svc = offline_service(&workspace);

    // A credential minted by a legacy client on a non-secure origin.
    svc.store
        .save_password_hash(&insecure_hash("hunter2"))
        .expect("store legacy hash");
    assert!(svc.verify_password("hunter2"));
    assert!(!svc.verify_password("hunter3"));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn verify_with_no_stored_hash_fails_closed() {
    let workspace = temp_dir("aulad-auth-empty");
    let svc = offline_service(&workspace);
    assert!(!svc.verify_password("anything"));
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn matches_tries_both_digests() {
    assert!(matches("pw", &hash_password("pw")));
    assert!(matches("pw", &insecure_hash("pw")));
    assert!(!matches("pw", &hash_password("other")));
}
