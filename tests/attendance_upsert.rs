use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use aulad::model::AttendanceRecord;
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
fn upsert_replaces_by_date_and_student() {
    let workspace = temp_dir("aulad-attendance-upsert");
    let svc = offline_service(&workspace);

    svc.record_attendance(AttendanceRecord {
        date: "2024-03-01".to_string(),
        student_id: "S1".to_string(),
        present: true,
    })
    .expect("first record");
    svc.record_attendance(AttendanceRecord {
        date: "2024-03-01".to_string(),
        student_id: "S1".to_string(),
        present: false,
    })
    .expect("second record");

    let records = svc.store.attendance().expect("read attendance");
    assert_eq!(records.len(), 1, "exactly one record per (date, student)");
    assert!(!records[0].present, "latest upsert wins");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn upsert_keeps_other_composite_keys() {
    let workspace = temp_dir("aulad-attendance-others");
    let svc = offline_service(&workspace);

    svc.bulk_record_attendance(vec![
        AttendanceRecord {
            date: "2024-03-01".to_string(),
            student_id: "S1".to_string(),
            present: true,
        },
        AttendanceRecord {
            date: "2024-03-01".to_string(),
            student_id: "S2".to_string(),
            present: true,
        },
        AttendanceRecord {
            date: "2024-03-02".to_string(),
            student_id: "S1".to_string(),
            present: true,
        },
    ])
    .expect("seed records");

    svc.record_attendance(AttendanceRecord {
        date: "2024-03-01".to_string(),
        student_id: "S1".to_string(),
        present: false,
    })
    .expect("replace one");

    let records = svc.store.attendance().expect("read attendance");
    assert_eq!(records.len(), 3);
    let replaced = records
        .iter()
        .find(|a| a.date == "2024-03-01" && a.student_id == "S1")
        .expect("replaced record present");
    assert!(!replaced.present);
    assert!(records
        .iter()
        .filter(|a| !(a.date == "2024-03-01" && a.student_id == "S1"))
        .all(|a| a.present));

    let _ = std::fs::remove_dir_all(workspace);
}
