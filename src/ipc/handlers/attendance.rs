use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_field, service};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceRecord;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.attendance() {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let record: AttendanceRecord = match parse_field(&req.params, "record") {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    match svc.record_attendance(record) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_bulk_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let records: Vec<AttendanceRecord> = match parse_field(&req.params, "records") {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    match svc.bulk_record_attendance(records) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(handle_list(state, req)),
        "attendance.record" => Some(handle_record(state, req)),
        "attendance.bulkRecord" => Some(handle_bulk_record(state, req)),
        _ => None,
    }
}
