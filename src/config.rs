use crate::db;
use crate::letter::GpaScale;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const GRADING_SETTINGS_KEY: &str = "setup.grading";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingSettings {
    pub gpa_scale: GpaScale,
    pub display_decimals: u32,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            gpa_scale: GpaScale::Standard,
            display_decimals: 1,
        }
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

impl GradingSettings {
    pub fn merge_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        for (k, v) in patch {
            match k.as_str() {
                "gpaScale" => {
                    let s = v
                        .as_str()
                        .ok_or_else(|| "gpaScale must be string".to_string())?;
                    self.gpa_scale = GpaScale::parse(s)
                        .ok_or_else(|| "gpaScale must be one of: standard, plus".to_string())?;
                }
                "displayDecimals" => {
                    self.display_decimals = parse_i64_range(v, k, 0, 3)? as u32;
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            }
        }
        Ok(())
    }

    pub fn to_json(self) -> Value {
        serde_json::json!({
            "gpaScale": self.gpa_scale.as_str(),
            "displayDecimals": self.display_decimals,
        })
    }
}

/// Defaults overlaid with whatever the workspace has stored.
pub fn load_grading_settings(conn: &Connection) -> anyhow::Result<GradingSettings> {
    let mut current = GradingSettings::default();
    if let Some(saved) = db::settings_get_json(conn, GRADING_SETTINGS_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // A malformed stored value must not lock the workspace out of grading.
            let mut candidate = current;
            match candidate.merge_patch(saved_obj) {
                Ok(()) => current = candidate,
                Err(e) => tracing::warn!("ignoring stored grading settings: {e}"),
            }
        }
    }
    Ok(current)
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0}")]
    Invalid(String),
    #[error("failed to read grading settings: {0}")]
    Load(anyhow::Error),
    #[error("failed to store grading settings: {0}")]
    Store(anyhow::Error),
}

impl SettingsError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "bad_params",
            Self::Load(_) => "db_query_failed",
            Self::Store(_) => "db_update_failed",
        }
    }
}

pub fn update_grading_settings(
    conn: &Connection,
    patch: &Map<String, Value>,
) -> Result<GradingSettings, SettingsError> {
    let mut current = load_grading_settings(conn).map_err(SettingsError::Load)?;
    current.merge_patch(patch).map_err(SettingsError::Invalid)?;
    db::settings_set_json(conn, GRADING_SETTINGS_KEY, &current.to_json())
        .map_err(SettingsError::Store)?;
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn patch_applies_known_fields() {
        let mut s = GradingSettings::default();
        s.merge_patch(&obj(json!({ "gpaScale": "PLUS", "displayDecimals": 2 })))
            .expect("patch");
        assert_eq!(s.gpa_scale, GpaScale::Plus);
        assert_eq!(s.display_decimals, 2);
    }

    #[test]
    fn patch_rejects_bad_values() {
        let mut s = GradingSettings::default();
        assert!(s.merge_patch(&obj(json!({ "gpaScale": "five" }))).is_err());
        assert!(s.merge_patch(&obj(json!({ "displayDecimals": 9 }))).is_err());
        assert!(s.merge_patch(&obj(json!({ "letterScale": "x" }))).is_err());
    }

    #[test]
    fn json_round_trips_through_patch() {
        let s = GradingSettings {
            gpa_scale: GpaScale::Plus,
            display_decimals: 0,
        };
        let mut back = GradingSettings::default();
        back.merge_patch(&obj(s.to_json())).expect("patch");
        assert_eq!(back, s);
    }

    #[test]
    fn storage_failures_are_not_reported_as_bad_input() {
        let ws = std::env::temp_dir()
            .join(format!("gradebook-config-store-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&ws).expect("create temp dir");
        let conn = db::open_db(&ws).expect("open");

        let err = update_grading_settings(&conn, &obj(json!({ "gpaScale": "moon" })))
            .expect_err("invalid patch");
        assert!(matches!(err, SettingsError::Invalid(_)));
        assert_eq!(err.code(), "bad_params");

        conn.execute("DROP TABLE settings", []).expect("drop settings");
        let err = update_grading_settings(&conn, &obj(json!({ "gpaScale": "plus" })))
            .expect_err("missing table");
        assert!(matches!(err, SettingsError::Load(_)));
        assert_eq!(err.code(), "db_query_failed");
        drop(conn);
        let _ = std::fs::remove_dir_all(ws);
    }
}
