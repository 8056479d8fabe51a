use crate::domain::status::{StatusColorMap, StatusPalette};
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};

/// One entry of a settings choice list.
///
/// Older settings stored `[value, label]` pairs; current ones store the display
/// label alone. Both collapse to the label.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChoiceEntry {
    Pair(Vec<String>),
    Label(String),
}

impl ChoiceEntry {
    fn into_label(self) -> Option<String> {
        let label = match self {
            ChoiceEntry::Label(label) => label,
            ChoiceEntry::Pair(mut parts) if parts.len() >= 2 => parts.swap_remove(1),
            ChoiceEntry::Pair(mut parts) => parts.pop()?,
        };
        let label = label.trim();
        (!label.is_empty()).then(|| label.to_string())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawSettings {
    #[serde(default)]
    duration_options: Option<Vec<u32>>,
    #[serde(default)]
    type_choices: Option<Vec<ChoiceEntry>>,
    #[serde(default)]
    status_choices: Option<Vec<ChoiceEntry>>,
    #[serde(default)]
    status_colors: Option<StatusColorMap>,
    #[serde(default)]
    location_options: Option<Vec<ChoiceEntry>>,
    #[serde(default)]
    insurance_operators: Option<Vec<ChoiceEntry>>,
    #[serde(default)]
    cancellation_reasons: Option<Vec<ChoiceEntry>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct AppointmentSettings {
    pub duration_options: Vec<u32>,
    pub type_choices: Vec<String>,
    pub status_choices: Vec<String>,
    pub status_colors: StatusColorMap,
    pub location_options: Vec<String>,
    pub insurance_operators: Vec<String>,
    pub cancellation_reasons: Vec<String>,
}

impl AppointmentSettings {
    pub fn palette(&self) -> StatusPalette {
        StatusPalette::new(self.status_colors.clone())
    }
}

impl From<RawSettings> for AppointmentSettings {
    fn from(raw: RawSettings) -> Self {
        Self {
            duration_options: raw.duration_options.unwrap_or_default(),
            type_choices: labels(raw.type_choices),
            status_choices: labels(raw.status_choices),
            status_colors: raw.status_colors.unwrap_or_default(),
            location_options: labels(raw.location_options),
            insurance_operators: labels(raw.insurance_operators),
            cancellation_reasons: labels(raw.cancellation_reasons),
        }
    }
}

pub fn decode_settings(payload: serde_json::Value) -> Result<AppointmentSettings, InfraError> {
    let settings = match payload {
        serde_json::Value::Object(mut object) => object
            .remove("settings")
            .ok_or_else(|| InfraError::MalformedResponse("settings payload is missing".to_string()))?,
        other => {
            return Err(InfraError::MalformedResponse(format!(
                "settings response is not an object: {other}"
            )));
        }
    };
    let raw: RawSettings = serde_json::from_value(settings)
        .map_err(|error| InfraError::MalformedResponse(format!("invalid settings payload: {error}")))?;
    Ok(raw.into())
}

fn labels(entries: Option<Vec<ChoiceEntry>>) -> Vec<String> {
    entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(ChoiceEntry::into_label)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AppointmentStatus;

    #[test]
    fn legacy_pairs_and_labels_normalize_to_labels() {
        let payload = serde_json::json!({
            "success": true,
            "settings": {
                "duration_options": [15, 30, 45],
                "status_choices": [["scheduled", "Agendada"], ["confirmed", "Confirmada"]],
                "type_choices": ["Consulta", "Retorno"],
                "status_colors": {"Agendada": "#000000"}
            }
        });
        let settings = decode_settings(payload).expect("decodes");

        assert_eq!(settings.status_choices, vec!["Agendada", "Confirmada"]);
        assert_eq!(settings.type_choices, vec!["Consulta", "Retorno"]);
        assert_eq!(settings.duration_options, vec![15, 30, 45]);
        assert!(settings.cancellation_reasons.is_empty());
        assert_eq!(
            settings.palette().resolve(&AppointmentStatus::Scheduled).color,
            "#000000"
        );
    }

    #[test]
    fn null_collections_become_empty() {
        let payload = serde_json::json!({
            "settings": {"status_colors": null, "insurance_operators": null}
        });
        let settings = decode_settings(payload).expect("decodes");
        assert!(settings.status_colors.is_empty());
        assert!(settings.insurance_operators.is_empty());
    }

    #[test]
    fn blank_and_single_element_entries_are_handled() {
        let payload = serde_json::json!({
            "settings": {"location_options": [" ", ["Sala 1"], "Sala 2"]}
        });
        let settings = decode_settings(payload).expect("decodes");
        assert_eq!(settings.location_options, vec!["Sala 1", "Sala 2"]);
    }

    #[test]
    fn missing_settings_object_is_malformed() {
        let result = decode_settings(serde_json::json!({"success": true}));
        assert!(matches!(result, Err(InfraError::MalformedResponse(_))));
    }
}
