use crate::config::{self, GradingSettings};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            _ => None,
        }
    }
}

pub fn grading_settings(conn: &Connection) -> Result<GradingSettings, HandlerErr> {
    config::load_grading_settings(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn handle_setup_get(state: &AppState) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let grading = grading_settings(conn)?;
    Ok(json!({ "grading": grading.to_json() }))
}

fn handle_setup_update(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.conn()?;
    let Some(section) = params.get("section").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::bad_params("missing section"));
    };
    let Some(section) = SetupSection::parse(section) else {
        return Err(HandlerErr {
            code: "bad_params".to_string(),
            message: "section must be one of: grading".to_string(),
            details: Some(json!({ "section": section })),
        });
    };
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    match section {
        SetupSection::Grading => {
            let updated = config::update_grading_settings(conn, patch)
                .map_err(|e| HandlerErr::new(e.code(), e.to_string()))?;
            tracing::info!(
                gpa_scale = updated.gpa_scale.as_str(),
                display_decimals = updated.display_decimals,
                "grading settings updated"
            );
            Ok(json!({ "ok": true, "grading": updated.to_json() }))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "setup.get" => handle_setup_get(state),
        "setup.update" => handle_setup_update(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
