use crate::domain::models::PlannerPolicy;
use crate::infrastructure::error::PlannerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const APP_JSON: &str = "app.json";
pub const TRAINING_JSON: &str = "training.json";
pub const MEALS_JSON: &str = "meals.json";
pub const CALENDAR_JSON: &str = "calendar.json";
const DEFAULT_USER_ID: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppConfig {
    #[serde(default = "default_user_id")]
    user_id: String,
    #[serde(flatten)]
    policy: PlannerPolicy,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    let policy = PlannerPolicy::default();
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "userId": DEFAULT_USER_ID,
                "wakeTime": policy.wake_time,
                "sleepTime": policy.sleep_time,
                "includeSleepBlocks": policy.include_sleep_blocks,
                "sleepColor": policy.sleep_color
            }),
        ),
        (
            TRAINING_JSON,
            serde_json::json!({
                "schema": 1,
                "days": []
            }),
        ),
        (
            MEALS_JSON,
            serde_json::json!({
                "schema": 1,
                "days": []
            }),
        ),
        (
            CALENDAR_JSON,
            serde_json::json!({
                "schema": 1,
                "events": []
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), PlannerError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

/// Parses a config document and checks its `schema` version.
pub fn parse_config(raw: &str, path: &Path) -> Result<serde_json::Value, PlannerError> {
    let parsed: serde_json::Value = serde_json::from_str(raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            PlannerError::InvalidConfig(format!("missing schema in {}", path.display()))
        })?;
    if schema != 1 {
        return Err(PlannerError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn read_config(path: &Path) -> Result<serde_json::Value, PlannerError> {
    let raw = fs::read_to_string(path)?;
    parse_config(&raw, path)
}

fn read_app_config(config_dir: &Path) -> Result<AppConfig, PlannerError> {
    let path = config_dir.join(APP_JSON);
    let app: AppConfig = serde_json::from_value(read_config(&path)?)?;
    app.policy.validate().map_err(|message| {
        PlannerError::InvalidConfig(format!("{message} in {}", path.display()))
    })?;
    Ok(app)
}

pub fn load_policy(config_dir: &Path) -> Result<PlannerPolicy, PlannerError> {
    Ok(read_app_config(config_dir)?.policy)
}

pub fn read_user_id(config_dir: &Path) -> Result<String, PlannerError> {
    let user_id = read_app_config(config_dir)?.user_id;
    let normalized = user_id.trim();
    if normalized.is_empty() {
        Ok(DEFAULT_USER_ID.to_string())
    } else {
        Ok(normalized.to_string())
    }
}
