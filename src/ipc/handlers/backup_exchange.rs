use serde_json::json;

use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{bad_params, service};
use crate::ipc::types::{AppState, Request};

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match backup::export_backup(&svc.store) {
        Ok(doc) => match serde_json::to_value(&doc) {
            Ok(value) => ok(&req.id, json!({ "backup": value })),
            Err(e) => err(&req.id, "backup_export_failed", e.to_string()),
        },
        Err(e) => err(&req.id, "backup_export_failed", format!("{e:?}")),
    }
}

// Accepts the backup either as a JSON document or as its string form; the
// importer itself reports success as a boolean rather than throwing.
fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let Some(raw) = req.params.get("backup") else {
        return bad_params("missing params.backup").response(&req.id);
    };
    let text = match raw {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let imported = backup::import_backup(&svc.store, &text);
    if imported {
        ok(&req.id, json!({ "imported": true }))
    } else {
        err(&req.id, "backup_import_failed", "backup rejected")
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_export(state, req)),
        "backup.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
