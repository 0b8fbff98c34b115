use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{bad_params, parse_field, service};
use crate::ipc::types::{AppState, Request};
use crate::model::EmailSettings;
use crate::store::keys;

fn handle_email_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.email_settings() {
        Ok(settings) => ok(&req.id, json!({ "settings": settings })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_email_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let settings: EmailSettings = match parse_field(&req.params, "settings") {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.save_email_settings(&settings) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

fn handle_drafts_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.store.get_raw(keys::DRAFTS) {
        Ok(value) => ok(&req.id, json!({ "value": value })),
        Err(e) => err(&req.id, "store_read_failed", format!("{e:?}")),
    }
}

fn handle_drafts_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let Some(value) = req.params.get("value") else {
        return bad_params("missing params.value").response(&req.id);
    };
    match svc.store.put_raw(keys::DRAFTS, value) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.email.get" => Some(handle_email_get(state, req)),
        "settings.email.set" => Some(handle_email_set(state, req)),
        "drafts.get" => Some(handle_drafts_get(state, req)),
        "drafts.set" => Some(handle_drafts_set(state, req)),
        _ => None,
    }
}
