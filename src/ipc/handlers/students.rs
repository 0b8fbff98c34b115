use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_field, required_str, service};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.students() {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let student: Student = match parse_field(&req.params, "student") {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.add_student(student) {
        Ok(added) => ok(&req.id, json!({ "student": added })),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_bulk_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let students: Vec<Student> = match parse_field(&req.params, "students") {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.bulk_add_students(students) {
        Ok(count) => ok(&req.id, json!({ "added": count })),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let student: Student = match parse_field(&req.params, "student") {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.update_student(student) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let id = match required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match svc.delete_student(&id) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.add" => Some(handle_add(state, req)),
        "students.bulkAdd" => Some(handle_bulk_add(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
