use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_field, required_str, service};
use crate::ipc::types::{AppState, Request};
use crate::model::Ficha;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.fichas() {
        Ok(fichas) => ok(&req.id, json!({ "fichas": fichas })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let ficha: Ficha = match parse_field(&req.params, "ficha") {
        Ok(f) => f,
        Err(e) => return e.response(&req.id),
    };
    match svc.add_ficha(ficha) {
        Ok(added) => ok(&req.id, json!({ "ficha": added })),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let ficha: Ficha = match parse_field(&req.params, "ficha") {
        Ok(f) => f,
        Err(e) => return e.response(&req.id),
    };
    match svc.update_ficha(ficha) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

// Ficha deletion is the one all-or-nothing cascade; a remote failure is
// surfaced to the caller instead of being swallowed.
fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let code = match required_str(&req.params, "code") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match svc.delete_ficha(&code) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "ficha_delete_failed", format!("{e:?}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fichas.list" => Some(handle_list(state, req)),
        "fichas.add" => Some(handle_add(state, req)),
        "fichas.update" => Some(handle_update(state, req)),
        "fichas.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
