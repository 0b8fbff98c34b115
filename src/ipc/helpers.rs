use serde::de::DeserializeOwned;

use super::error::err;
use super::types::AppState;
use crate::service::AppService;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message)
    }
}

pub fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
    }
}

pub fn service(state: &AppState) -> Result<&AppService, HandlerErr> {
    state.service.as_ref().ok_or(HandlerErr {
        code: "no_workspace",
        message: "no workspace selected".to_string(),
    })
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| bad_params(format!("missing params.{}", key)))
}

pub fn parse_field<T: DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<T, HandlerErr> {
    let value = params
        .get(key)
        .cloned()
        .ok_or_else(|| bad_params(format!("missing params.{}", key)))?;
    serde_json::from_value(value).map_err(|e| bad_params(format!("invalid params.{}: {}", key, e)))
}
