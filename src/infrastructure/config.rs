use crate::infrastructure::error::StoreError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SCHEDULE_JSON: &str = "schedule.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    pub app_name: String,
    pub timezone: String,
    pub cutover_hour: u32,
}

impl AppConfig {
    pub fn timezone(&self) -> Result<Tz, StoreError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            StoreError::InvalidConfig(format!("unknown timezone '{}'", self.timezone))
        })
    }

    fn validate(&self) -> Result<(), StoreError> {
        self.timezone()?;
        if self.cutover_hour >= 24 {
            return Err(StoreError::InvalidConfig(format!(
                "cutoverHour must be below 24, got {}",
                self.cutover_hour
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub schema: u8,
    pub morning_hour: u32,
    pub poll_interval_secs: u64,
    pub poll_window_start_hour: u32,
    pub poll_window_end_hour: u32,
}

impl ScheduleConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.morning_hour >= 24 {
            return Err(StoreError::InvalidConfig(format!(
                "morningHour must be below 24, got {}",
                self.morning_hour
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(StoreError::InvalidConfig(
                "pollIntervalSecs must be at least 1".to_string(),
            ));
        }
        if self.poll_window_start_hour >= self.poll_window_end_hour
            || self.poll_window_end_hour > 24
        {
            return Err(StoreError::InvalidConfig(format!(
                "poll window [{}, {}) is not a valid hour range",
                self.poll_window_start_hour, self.poll_window_end_hour
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub app: AppConfig,
    pub schedule: ScheduleConfig,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "FocusTrack",
                "timezone": "UTC",
                "cutoverHour": 4
            }),
        ),
        (
            SCHEDULE_JSON,
            serde_json::json!({
                "schema": 1,
                "morningHour": 8,
                "pollIntervalSecs": 10,
                "pollWindowStartHour": 8,
                "pollWindowEndHour": 24
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), StoreError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, StoreError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            StoreError::InvalidConfig(format!("missing schema in {}", path.display()))
        })?;
    if schema != 1 {
        return Err(StoreError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, StoreError> {
    let app: AppConfig = serde_json::from_value(read_config(&config_dir.join(APP_JSON))?)?;
    app.validate()?;
    let schedule: ScheduleConfig =
        serde_json::from_value(read_config(&config_dir.join(SCHEDULE_JSON))?)?;
    schedule.validate()?;
    Ok(ConfigBundle { app, schedule })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_written_once_and_load_cleanly() {
        let dir = tempdir().expect("temp dir");
        ensure_default_configs(dir.path()).expect("write defaults");

        let bundle = load_configs(dir.path()).expect("load configs");
        assert_eq!(bundle.app.timezone, "UTC");
        assert_eq!(bundle.app.cutover_hour, 4);
        assert_eq!(bundle.schedule.morning_hour, 8);
        assert_eq!(bundle.schedule.poll_interval_secs, 10);

        // a second pass must not clobber user edits
        let app_path = dir.path().join("app.json");
        fs::write(
            &app_path,
            r#"{"schema": 1, "appName": "FocusTrack", "timezone": "Asia/Shanghai", "cutoverHour": 5}"#,
        )
        .expect("edit config");
        ensure_default_configs(dir.path()).expect("second pass");
        let bundle = load_configs(dir.path()).expect("reload configs");
        assert_eq!(bundle.app.timezone, "Asia/Shanghai");
        assert_eq!(bundle.app.cutover_hour, 5);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let dir = tempdir().expect("temp dir");
        ensure_default_configs(dir.path()).expect("write defaults");
        fs::write(
            dir.path().join("app.json"),
            r#"{"schema": 1, "appName": "FocusTrack", "timezone": "Mars/Olympus", "cutoverHour": 4}"#,
        )
        .expect("edit config");

        let error = load_configs(dir.path()).expect_err("invalid timezone");
        assert!(matches!(error, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let dir = tempdir().expect("temp dir");
        ensure_default_configs(dir.path()).expect("write defaults");
        fs::write(
            dir.path().join("schedule.json"),
            r#"{"schema": 2, "morningHour": 8, "pollIntervalSecs": 10, "pollWindowStartHour": 8, "pollWindowEndHour": 24}"#,
        )
        .expect("edit config");

        assert!(load_configs(dir.path()).is_err());
    }

    #[test]
    fn empty_poll_window_is_rejected() {
        let dir = tempdir().expect("temp dir");
        ensure_default_configs(dir.path()).expect("write defaults");
        fs::write(
            dir.path().join("schedule.json"),
            r#"{"schema": 1, "morningHour": 8, "pollIntervalSecs": 10, "pollWindowStartHour": 22, "pollWindowEndHour": 8}"#,
        )
        .expect("edit config");

        assert!(load_configs(dir.path()).is_err());
    }
}
