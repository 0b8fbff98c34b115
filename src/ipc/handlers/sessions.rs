use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_field, required_str, service};
use crate::ipc::types::{AppState, Request};
use crate::model::Session;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.sessions() {
        Ok(sessions) => ok(&req.id, json!({ "sessions": sessions })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let session: Session = match parse_field(&req.params, "session") {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.add_session(session) {
        Ok(added) => ok(&req.id, json!({ "session": added })),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let id = match required_str(&req.params, "sessionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match svc.delete_session(&id) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.list" => Some(handle_list(state, req)),
        "sessions.add" => Some(handle_add(state, req)),
        "sessions.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
