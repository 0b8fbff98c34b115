use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, service};
use crate::ipc::types::{AppState, Request};

fn handle_set_password(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let password = match required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match svc.set_password(&password) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "store_write_failed", format!("{e:?}")),
    }
}

// A wrong password is a normal outcome, not an error response.
fn handle_verify(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let password = match required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    ok(&req.id, json!({ "valid": svc.verify_password(&password) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.setPassword" => Some(handle_set_password(state, req)),
        "auth.verify" => Some(handle_verify(state, req)),
        _ => None,
    }
}
