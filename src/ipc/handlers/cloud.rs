use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::service;
use crate::ipc::types::{AppState, Request};

/// Manual full pull. Replaces the synced local collections wholesale;
/// local edits that were never pushed are lost.
fn handle_pull_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match svc.sync.pull_all(&svc.store) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => err(&req.id, "sync_pull_failed", format!("{e:?}")),
    }
}

fn handle_watch_attendance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = match service(state) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let Some(workspace) = state.workspace.as_ref() else {
        return err(&req.id, "no_workspace", "no workspace selected");
    };
    std::sync::Arc::clone(&svc.sync).watch_attendance(workspace, svc.store.bus());
    ok(&req.id, json!({}))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.pullAll" => Some(handle_pull_all(state, req)),
        "sync.watchAttendance" => Some(handle_watch_attendance(state, req)),
        _ => None,
    }
}
