use crate::domain::models::AppointmentStatus;
use std::collections::HashMap;

pub const NEUTRAL_COLOR: &str = "#6c757d";

const STATUS_LABELS: [(&str, &str); 7] = [
    ("scheduled", "Agendada"),
    ("confirmed", "Confirmada"),
    ("in_progress", "Em Andamento"),
    ("completed", "Concluída"),
    ("cancelled", "Cancelada"),
    ("no_show", "Não Compareceu"),
    ("rescheduled", "Reagendada"),
];

const DEFAULT_COLORS: [(&str, &str); 7] = [
    ("Agendada", "#ad0202"),
    ("Confirmada", "#007bff"),
    ("Em Andamento", "#ffc107"),
    ("Concluída", "#28a745"),
    ("Cancelada", "#dc3545"),
    ("Não Compareceu", "#6c757d"),
    ("Reagendada", "#17a2b8"),
];

impl AppointmentStatus {
    pub fn label(&self) -> &str {
        let code = self.code();
        STATUS_LABELS
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, label)| *label)
            .unwrap_or(code)
    }

    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        STATUS_LABELS
            .iter()
            .find(|(_, candidate)| *candidate == label)
            .map(|(code, _)| AppointmentStatus::from_code(code))
            .unwrap_or_else(|| AppointmentStatus::from_code(label))
    }

    pub fn badge_class(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "bg-info",
            AppointmentStatus::Confirmed => "bg-primary",
            AppointmentStatus::InProgress => "bg-warning",
            AppointmentStatus::Completed => "bg-success",
            AppointmentStatus::Cancelled => "bg-danger",
            AppointmentStatus::NoShow => "bg-secondary",
            AppointmentStatus::Rescheduled => "bg-info",
            AppointmentStatus::Other(_) => "bg-secondary",
        }
    }
}

pub type StatusColorMap = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStatus {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusPalette {
    configured: StatusColorMap,
}

impl StatusPalette {
    pub fn new(configured: StatusColorMap) -> Self {
        let configured = configured
            .into_iter()
            .map(|(label, color)| (label.trim().to_string(), color.trim().to_string()))
            .filter(|(label, color)| !label.is_empty() && !color.is_empty())
            .collect();
        Self { configured }
    }

    pub fn configured(&self) -> &StatusColorMap {
        &self.configured
    }

    pub fn resolve(&self, status: &AppointmentStatus) -> ResolvedStatus {
        let label = status.label().to_string();
        let color = self.color_for_label(&label);
        ResolvedStatus { label, color }
    }

    pub fn color_for_label(&self, label: &str) -> String {
        if let Some(color) = self.configured.get(label) {
            return color.clone();
        }
        if let Some((_, color)) = DEFAULT_COLORS.iter().find(|(candidate, _)| *candidate == label) {
            return (*color).to_string();
        }
        tracing::warn!(status_label = label, "no color configured for status, using neutral");
        NEUTRAL_COLOR.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn every_status_has_a_distinct_label() {
        let labels = AppointmentStatus::ALL
            .iter()
            .map(|status| status.label().to_string())
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(labels.len(), AppointmentStatus::ALL.len());
    }

    #[test]
    fn label_table_is_bidirectional() {
        for status in AppointmentStatus::ALL {
            assert_eq!(AppointmentStatus::from_label(status.label()), status);
        }
    }

    #[test]
    fn unknown_code_passes_through_as_label() {
        let status = AppointmentStatus::from_code("triage");
        assert_eq!(status.label(), "triage");
    }

    #[test]
    fn configured_color_wins_over_default() {
        let palette = StatusPalette::new(HashMap::from([(
            "Confirmada".to_string(),
            "#123456".to_string(),
        )]));
        let resolved = palette.resolve(&AppointmentStatus::Confirmed);
        assert_eq!(resolved.label, "Confirmada");
        assert_eq!(resolved.color, "#123456");
    }

    #[test]
    fn built_in_default_applies_when_not_configured() {
        let palette = StatusPalette::default();
        assert_eq!(palette.resolve(&AppointmentStatus::Scheduled).color, "#ad0202");
        assert_eq!(palette.resolve(&AppointmentStatus::Rescheduled).color, "#17a2b8");
    }

    #[test]
    fn unknown_status_falls_back_to_neutral() {
        let palette = StatusPalette::default();
        let resolved = palette.resolve(&AppointmentStatus::from_code("triage"));
        assert_eq!(resolved.color, NEUTRAL_COLOR);
    }

    #[test]
    fn blank_configured_entries_are_ignored() {
        let palette = StatusPalette::new(HashMap::from([(
            "Cancelada".to_string(),
            "  ".to_string(),
        )]));
        assert_eq!(palette.resolve(&AppointmentStatus::Cancelled).color, "#dc3545");
    }

    // Feature: clinic-agenda, Property 2: every known status resolves to a non-empty color
    proptest! {
        #[test]
        fn every_known_status_resolves_to_a_color(
            index in 0usize..7,
            overrides in proptest::collection::hash_map("[A-Za-z ]{1,16}", "#[0-9a-f]{6}", 0..6)
        ) {
            let palette = StatusPalette::new(overrides);
            let status = AppointmentStatus::ALL[index].clone();
            let resolved = palette.resolve(&status);
            prop_assert!(!resolved.color.trim().is_empty());
            prop_assert!(!resolved.label.is_empty());
        }
    }
}
