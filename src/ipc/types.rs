use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::service::AppService;
use crate::sync::SyncClient;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub service: Option<AppService>,
    /// Created once at startup and injected; shared with every service.
    pub sync: Arc<SyncClient>,
}
