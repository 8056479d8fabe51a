use crate::domain::models::AppointmentStatus;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Drag,
    Resize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    Unplaced,
    Rendered,
    Dragging,
    Resizing,
    Reconciling,
    Committed,
    Reverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSignal {
    Render,
    Begin(GestureKind),
    Release { conflict: bool },
    Persisted,
    PersistFailed,
    Settle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: EventPhase,
    pub signal: PhaseSignal,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot apply {:?} to an event in {:?}", self.signal, self.from)
    }
}

impl EventPhase {
    pub fn apply(self, signal: PhaseSignal) -> Result<EventPhase, InvalidTransition> {
        use EventPhase::*;
        use PhaseSignal::*;

        let next = match (self, signal) {
            (_, Render) => Rendered,
            (Rendered, Begin(GestureKind::Drag)) => Dragging,
            (Rendered, Begin(GestureKind::Resize)) => Resizing,
            (Dragging | Resizing, Release { conflict: true }) => Reverted,
            (Dragging | Resizing, Release { conflict: false }) => Reconciling,
            (Reconciling, Persisted) => Committed,
            (Reconciling, PersistFailed) => Reverted,
            (Committed | Reverted, Settle) => Rendered,
            (from, signal) => return Err(InvalidTransition { from, signal }),
        };
        Ok(next)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, EventPhase::Reconciling)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
    ConfirmAttendance,
    Complete,
    Cancel,
}

impl StatusAction {
    pub fn target_status(self) -> AppointmentStatus {
        match self {
            StatusAction::ConfirmAttendance => AppointmentStatus::Confirmed,
            StatusAction::Complete => AppointmentStatus::Completed,
            StatusAction::Cancel => AppointmentStatus::Cancelled,
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            StatusAction::ConfirmAttendance => "Erro ao confirmar presença",
            StatusAction::Complete => "Erro ao concluir consulta",
            StatusAction::Cancel => "Erro ao cancelar consulta",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            StatusAction::ConfirmAttendance => "Presença confirmada com sucesso!",
            StatusAction::Complete => "Consulta concluída com sucesso!",
            StatusAction::Cancel => "Consulta cancelada com sucesso!",
        }
    }
}

pub fn offered_actions(status: &AppointmentStatus) -> Vec<StatusAction> {
    match status {
        AppointmentStatus::Scheduled => vec![StatusAction::ConfirmAttendance, StatusAction::Cancel],
        AppointmentStatus::Confirmed => vec![StatusAction::Complete, StatusAction::Cancel],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_without_conflict_reaches_committed() {
        let phase = EventPhase::Unplaced
            .apply(PhaseSignal::Render)
            .and_then(|phase| phase.apply(PhaseSignal::Begin(GestureKind::Drag)))
            .and_then(|phase| phase.apply(PhaseSignal::Release { conflict: false }))
            .and_then(|phase| phase.apply(PhaseSignal::Persisted))
            .expect("valid path");
        assert_eq!(phase, EventPhase::Committed);
        assert_eq!(phase.apply(PhaseSignal::Settle), Ok(EventPhase::Rendered));
    }

    #[test]
    fn conflicting_release_reverts_immediately() {
        let phase = EventPhase::Resizing
            .apply(PhaseSignal::Release { conflict: true })
            .expect("valid transition");
        assert_eq!(phase, EventPhase::Reverted);
    }

    #[test]
    fn failed_persistence_reverts() {
        assert_eq!(
            EventPhase::Reconciling.apply(PhaseSignal::PersistFailed),
            Ok(EventPhase::Reverted)
        );
    }

    #[test]
    fn gesture_cannot_start_while_reconciling() {
        let result = EventPhase::Reconciling.apply(PhaseSignal::Begin(GestureKind::Drag));
        assert!(result.is_err());
    }

    #[test]
    fn refetch_rerenders_from_any_phase() {
        for phase in [EventPhase::Unplaced, EventPhase::Committed, EventPhase::Reverted] {
            assert_eq!(phase.apply(PhaseSignal::Render), Ok(EventPhase::Rendered));
        }
    }

    #[test]
    fn only_scheduled_and_confirmed_offer_actions() {
        assert_eq!(
            offered_actions(&AppointmentStatus::Scheduled),
            vec![StatusAction::ConfirmAttendance, StatusAction::Cancel]
        );
        assert_eq!(
            offered_actions(&AppointmentStatus::Confirmed),
            vec![StatusAction::Complete, StatusAction::Cancel]
        );
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::InProgress,
            AppointmentStatus::NoShow,
            AppointmentStatus::Rescheduled,
        ] {
            assert!(offered_actions(&status).is_empty());
        }
    }
}
