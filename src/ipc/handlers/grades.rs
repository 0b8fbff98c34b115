use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{bad_params, parse_field, required_str, service};
use crate::ipc::types::{AppState, Request};
use crate::model::GradeActivity;
use crate::store::keys;

fn handle_activities_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.grade_activities() {
        Ok(activities) => ok(&req.id, json!({ "activities": activities })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_activities_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let activity: GradeActivity = match parse_field(&req.params, "activity") {
        Ok(a) => a,
        Err(e) => return e.response(&req.id),
    };
    match svc.add_grade_activity(activity) {
        Ok(added) => ok(&req.id, json!({ "activity": added })),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_activities_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let activity: GradeActivity = match parse_field(&req.params, "activity") {
        Ok(a) => a,
        Err(e) => return e.response(&req.id),
    };
    match svc.update_grade_activity(activity) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_activities_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let id = match required_str(&req.params, "activityId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match svc.delete_grade_activity(&id) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.grades() {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_grades_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let student_id = match required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let activity_id = match required_str(&req.params, "activityId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(score) = req.params.get("score").and_then(|v| v.as_f64()) else {
        return bad_params("missing params.score").response(&req.id);
    };
    if !(0.0..=100.0).contains(&score) {
        return bad_params("score must be between 0 and 100").response(&req.id);
    }
    match svc.upsert_grade(&student_id, &activity_id, score) {
        Ok(entry) => ok(&req.id, json!({ "grade": entry })),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

// The RAP and observation slots are opaque documents; the store does not
// validate them.
fn handle_raw_get(state: &mut AppState, req: &Request, slot: &str) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.get_raw(slot) {
        Ok(value) => ok(&req.id, json!({ "value": value })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_raw_set(state: &mut AppState, req: &Request, slot: &str) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let Some(value) = req.params.get("value") else {
        return bad_params("missing params.value").response(&req.id);
    };
    match svc.store.put_raw(slot, value) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.activities.list" => Some(handle_activities_list(state, req)),
        "grades.activities.add" => Some(handle_activities_add(state, req)),
        "grades.activities.update" => Some(handle_activities_update(state, req)),
        "grades.activities.delete" => Some(handle_activities_delete(state, req)),
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.upsert" => Some(handle_grades_upsert(state, req)),
        "grades.observations.get" => Some(handle_raw_get(state, req, keys::GRADE_OBSERVATIONS)),
        "grades.observations.set" => Some(handle_raw_set(state, req, keys::GRADE_OBSERVATIONS)),
        "rap.notes.get" => Some(handle_raw_get(state, req, keys::RAP_NOTES)),
        "rap.notes.set" => Some(handle_raw_set(state, req, keys::RAP_NOTES)),
        "rap.columns.get" => Some(handle_raw_get(state, req, keys::RAP_COLUMNS)),
        "rap.columns.set" => Some(handle_raw_set(state, req, keys::RAP_COLUMNS)),
        _ => None,
    }
}
