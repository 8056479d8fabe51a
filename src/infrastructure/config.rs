use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

const APP_JSON: &str = "app.json";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/dashboard/";
const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
const DEFAULT_CSRF_COOKIE: &str = "csrftoken";
const DEFAULT_SESSION_COOKIE: &str = "sessionid";
const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

const ENV_BASE_URL: &str = "CLINIC_AGENDA_BASE_URL";
const ENV_TIMEZONE: &str = "CLINIC_AGENDA_TIMEZONE";
const ENV_SESSION: &str = "CLINIC_AGENDA_SESSION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaConfig {
    pub base_url: Url,
    pub timezone: Tz,
    pub csrf_cookie_name: String,
    pub session_cookie_name: String,
    pub session_cookie: Option<String>,
    pub request_timeout_seconds: u64,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([(
        APP_JSON,
        serde_json::json!({
            "schema": 1,
            "appName": "Clinic Agenda",
            "baseUrl": DEFAULT_BASE_URL,
            "timezone": DEFAULT_TIMEZONE,
            "csrfCookieName": DEFAULT_CSRF_COOKIE,
            "sessionCookieName": DEFAULT_SESSION_COOKIE,
            "requestTimeoutSeconds": DEFAULT_TIMEOUT_SECONDS
        }),
    )])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_agenda_config(config_dir: &Path) -> Result<AgendaConfig, InfraError> {
    load_agenda_config_with_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_agenda_config_with_lookup<F>(config_dir: &Path, lookup: F) -> Result<AgendaConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let app = read_config(&config_dir.join(APP_JSON))?;

    let base_url = non_empty(lookup(ENV_BASE_URL))
        .or_else(|| string_field(&app, "baseUrl"))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let timezone = non_empty(lookup(ENV_TIMEZONE))
        .or_else(|| string_field(&app, "timezone"))
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

    Ok(AgendaConfig {
        base_url: parse_base_url(&base_url)?,
        timezone: parse_timezone(&timezone)?,
        csrf_cookie_name: string_field(&app, "csrfCookieName")
            .unwrap_or_else(|| DEFAULT_CSRF_COOKIE.to_string()),
        session_cookie_name: string_field(&app, "sessionCookieName")
            .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
        session_cookie: non_empty(lookup(ENV_SESSION)),
        request_timeout_seconds: app
            .get("requestTimeoutSeconds")
            .and_then(serde_json::Value::as_u64)
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    })
}

pub fn parse_timezone(value: &str) -> Result<Tz, InfraError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{value}': {error}")))
}

fn parse_base_url(value: &str) -> Result<Url, InfraError> {
    let trimmed = value.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&normalized)
        .map_err(|error| InfraError::InvalidConfig(format!("invalid baseUrl '{value}': {error}")))?;
    if url.cannot_be_a_base() {
        return Err(InfraError::InvalidConfig(format!(
            "baseUrl cannot be a base: {value}"
        )));
    }
    Ok(url)
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
