use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use aulad::model::{GradeActivity, DEFAULT_PHASE};
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

fn activity(name: &str) -> GradeActivity {
    GradeActivity {
        id: String::new(),
        name: name.to_string(),
        ficha_code: "A".to_string(),
        phase: DEFAULT_PHASE.to_string(),
        detail: None,
        max_score: 100.0,
        created_at: String::new(),
    }
}

#[test]
fn delete_activity_prunes_only_its_grades() {
    let workspace = temp_dir("aulad-activity-delete");
    let svc = offline_service(&workspace);

    let a1 = svc.add_grade_activity(activity("Evidencia 1")).expect("add a1");
    let a2 = svc.add_grade_activity(activity("Evidencia 2")).expect("add a2");

    svc.upsert_grade("S1", &a1.id, 85.0).expect("grade s1/a1");
    svc.upsert_grade("S2", &a1.id, 40.0).expect("grade s2/a1");
    svc.upsert_grade("S1", &a2.id, 90.0).expect("grade s1/a2");

    svc.delete_grade_activity(&a1.id).expect("delete a1");

    let activities = svc.store.grade_activities().expect("activities");
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].id, a2.id);

    let grades = svc.store.grades().expect("grades");
    assert_eq!(grades.len(), 1, "only a2's entries survive");
    assert_eq!(grades[0].activity_id, a2.id);
    assert_eq!(grades[0].student_id, "S1");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn grade_upsert_replaces_and_derives_letter() {
    let workspace = temp_dir("aulad-grade-upsert");
    let svc = offline_service(&workspace);

    let a = svc.add_grade_activity(activity("Evidencia 1")).expect("add");
    let first = svc.upsert_grade("S1", &a.id, 69.9).expect("failing grade");
    assert_eq!(first.letter, "D");

    let second = svc.upsert_grade("S1", &a.id, 70.0).expect("passing grade");
    assert_eq!(second.letter, "A");

    let grades = svc.store.grades().expect("grades");
    assert_eq!(grades.len(), 1, "composite key replaced, not appended");
    assert_eq!(grades[0].score, 70.0);
    assert_eq!(grades[0].letter, "A");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn activity_defaults_are_filled_on_add() {
    let workspace = temp_dir("aulad-activity-defaults");
    let svc = offline_service(&workspace);

    let mut blank = activity("Evidencia 1");
    blank.phase = String::new();
    let added = svc.add_grade_activity(blank).expect("add");
    assert!(!added.id.is_empty());
    assert_eq!(added.phase, DEFAULT_PHASE);
    assert!(!added.created_at.is_empty());

    let _ = std::fs::remove_dir_all(workspace);
}
