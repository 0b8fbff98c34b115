use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use aulad::model::{AttendanceRecord, Student, StudentStatus};
use aulad::service::AppService;
use aulad::store::LocalStore;
use aulad::sync::{SyncClient, SyncConfig};
use serde_json::Value;

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

type Captured = Arc<Mutex<Vec<(String, Value)>>>;

/// Minimal HTTP endpoint that records (path, JSON body) and answers 200.
fn spawn_capture_endpoint() -> (String, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let addr = listener.local_addr().expect("stub addr");
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);

    std::thread::spawn(move || {
        for conn in listener.incoming() {
            let Ok(conn) = conn else { break };
            let mut reader = BufReader::new(conn);

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            let path = request_line
                .split_whitespace()
                .nth(1)
                .unwrap_or("")
                .to_string();

            let mut content_length = 0usize;
            loop {
                let mut header = String::new();
                if reader.read_line(&mut header).is_err() || header.trim().is_empty() {
                    break;
                }
                if let Some(v) = header
                    .to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .map(str::trim)
                    .and_then(|v| v.parse().ok())
                {
                    content_length = v;
                }
            }

            let mut body = vec![0u8; content_length];
            if reader.read_exact(&mut body).is_err() {
                continue;
            }
            if let Ok(json) = serde_json::from_slice::<Value>(&body) {
                sink.lock().expect("capture lock").push((path, json));
            }

            let resp = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\nConnection: close\r\n\r\n{\"ok\":true}";
            let _ = reader.into_inner().write_all(resp.as_bytes());
        }
    });

    (format!("http://{}", addr), captured)
}

fn wait_for_request(captured: &Captured, path: &str) -> Value {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some((_, body)) = captured
            .lock()
            .expect("capture lock")
            .iter()
            .find(|(p, _)| p == path)
        {
            return body.clone();
        }
        assert!(
            Instant::now() < deadline,
            "no request to {} arrived in time",
            path
        );
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn service_with_endpoint(workspace: &std::path::Path, base: String) -> AppService {
    let store = LocalStore::open(workspace).expect("open store");
    let cfg = SyncConfig {
        endpoint_base: Some(base),
        ..SyncConfig::default()
    };
    AppService::new(store, Arc::new(SyncClient::new(cfg)))
}

#[test]
fn student_push_maps_to_snake_case() {
    let workspace = temp_dir("aulad-wire-students");
    let (base, captured) = spawn_capture_endpoint();
    let svc = service_with_endpoint(&workspace, base);

    svc.add_student(Student {
        id: "S1".to_string(),
        document_number: Some("1002003004".to_string()),
        first_name: "Ana Maria".to_string(),
        last_name: "Lopez".to_string(),
        email: "ana@example.com".to_string(),
        username: None,
        active: true,
        group: Some("2894667".to_string()),
        status: StudentStatus::InTraining,
        description: None,
    })
    .expect("add student");

    let body = wait_for_request(&captured, "/save-students");
    let row = &body["students"][0];
    assert_eq!(row["id"], "S1");
    assert_eq!(row["document_number"], "1002003004");
    assert_eq!(row["first_name"], "Ana Maria");
    assert_eq!(row["last_name"], "Lopez");
    assert_eq!(row["status"], "in_training");
    assert!(row.get("firstName").is_none(), "wire shape is snake_case");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn attendance_push_sends_only_changed_records() {
    let workspace = temp_dir("aulad-wire-attendance");
    let (base, captured) = spawn_capture_endpoint();
    let svc = service_with_endpoint(&workspace, base);

    svc.store
        .save_attendance(&[AttendanceRecord {
            date: "2024-02-28".to_string(),
            student_id: "S0".to_string(),
            present: true,
        }])
        .expect("preexisting attendance");

    svc.record_attendance(AttendanceRecord {
        date: "2024-03-01".to_string(),
        student_id: "S1".to_string(),
        present: false,
    })
    .expect("record");

    let body = wait_for_request(&captured, "/save-attendance");
    let records = body["records"].as_array().expect("records array");
    assert_eq!(records.len(), 1, "only the mutated record goes out");
    assert_eq!(records[0]["student_id"], "S1");
    assert_eq!(records[0]["present"], false);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn student_delete_requests_a_soft_delete() {
    let workspace = temp_dir("aulad-wire-softdelete");
    let (base, captured) = spawn_capture_endpoint();
    let svc = service_with_endpoint(&workspace, base);

    svc.add_student(Student {
        id: "S1".to_string(),
        document_number: None,
        first_name: "Ana".to_string(),
        last_name: "Lopez".to_string(),
        email: String::new(),
        username: None,
        active: true,
        group: None,
        status: StudentStatus::InTraining,
        description: None,
    })
    .expect("add student");
    svc.delete_student("S1").expect("delete student");

    let body = wait_for_request(&captured, "/soft-delete-student");
    assert_eq!(body["studentId"], "S1");
    assert!(svc.store.students().expect("students").is_empty());

    let _ = std::fs::remove_dir_all(workspace);
}
