use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult};
use crate::application::calendar_controller::{
    CalendarController, EventDetails, GestureOutcome, RefetchOutcome, StatusActionOutcome,
};
use crate::domain::lifecycle::StatusAction;
use crate::domain::models::{
    AppointmentDraft, AppointmentStatus, CalendarEvent, DateRange, DoctorSummary, PatientDraft,
    PatientSummary,
};
use crate::infrastructure::config::AgendaConfig;
use crate::infrastructure::dashboard_client::{DashboardApi, MutationAck, ReqwestDashboardClient};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::parse_date;
use crate::infrastructure::event_store::InMemoryEventStore;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::settings::AppointmentSettings;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct AppState<C: DashboardApi = ReqwestDashboardClient> {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    config: AgendaConfig,
    controller: CalendarController<C, InMemoryEventStore>,
    session: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    settings: Option<AppointmentSettings>,
    selected_patient: Option<PatientSummary>,
}

impl AppState<ReqwestDashboardClient> {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let client = Arc::new(ReqwestDashboardClient::new(&bootstrap.config)?);
        Ok(Self::from_bootstrap(bootstrap, client))
    }
}

impl<C: DashboardApi> AppState<C> {
    pub fn with_client(workspace_root: PathBuf, client: Arc<C>) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Ok(Self::from_bootstrap(bootstrap, client))
    }

    fn from_bootstrap(bootstrap: BootstrapResult, client: Arc<C>) -> Self {
        let controller = CalendarController::new(
            client,
            Arc::new(InMemoryEventStore::default()),
            bootstrap.config.timezone,
        );
        Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            config: bootstrap.config,
            controller,
            session: Mutex::new(SessionState::default()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.controller = self.controller.with_notifier(notifier);
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn config(&self) -> &AgendaConfig {
        &self.config
    }

    pub fn controller(&self) -> &CalendarController<C, InMemoryEventStore> {
        &self.controller
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
    }

    pub fn log_error(&self, command: &str, message: &str) {
        tracing::error!(command, "{message}");
    }

    pub fn teardown(&self) -> Result<(), InfraError> {
        self.controller.clear()?;
        *lock_session(self)? = SessionState::default();
        self.log_info("teardown", "agenda state cleared");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub events: Vec<CalendarEvent>,
    pub stale: bool,
}

pub async fn load_schedule_impl<C: DashboardApi>(
    state: &AppState<C>,
    start: Option<String>,
    end: Option<String>,
) -> Result<ScheduleView, InfraError> {
    let range = resolve_range(state.config.timezone, start, end)?;
    let (events, stale) = match state.controller.refetch(range).await? {
        RefetchOutcome::Applied { events } => (events, false),
        RefetchOutcome::Stale => (state.controller.events()?, true),
    };
    state.log_info(
        "load_schedule",
        &format!(
            "range={}..{} events={} stale={stale}",
            range.start(),
            range.end(),
            events.len()
        ),
    );
    Ok(ScheduleView {
        start: range.start(),
        end: range.end(),
        events,
        stale,
    })
}

pub async fn move_appointment_impl<C: DashboardApi>(
    state: &AppState<C>,
    event_id: String,
    new_start: String,
) -> Result<GestureOutcome, InfraError> {
    let new_start = parse_wall_clock_input(&new_start, "new_start")?;
    let outcome = state.controller.drop_event(event_id.trim(), new_start).await?;
    state.log_info("move_appointment", &describe_gesture(&event_id, &outcome));
    Ok(outcome)
}

pub async fn resize_appointment_impl<C: DashboardApi>(
    state: &AppState<C>,
    event_id: String,
    new_end: String,
) -> Result<GestureOutcome, InfraError> {
    let new_end = parse_wall_clock_input(&new_end, "new_end")?;
    let outcome = state.controller.resize_event(event_id.trim(), new_end).await?;
    state.log_info("resize_appointment", &describe_gesture(&event_id, &outcome));
    Ok(outcome)
}

pub fn event_details_impl<C: DashboardApi>(
    state: &AppState<C>,
    event_id: String,
) -> Result<EventDetails, InfraError> {
    state.controller.open_details(event_id.trim())
}

pub async fn apply_status_action_impl<C: DashboardApi>(
    state: &AppState<C>,
    event_id: String,
    action: String,
    cancellation_reason: Option<String>,
) -> Result<StatusActionOutcome, InfraError> {
    let action = parse_status_action(&action)?;
    state
        .controller
        .apply_status_action(event_id.trim(), action, cancellation_reason)
        .await
}

pub async fn update_status_impl<C: DashboardApi>(
    state: &AppState<C>,
    event_id: String,
    status: String,
) -> Result<MutationAck, InfraError> {
    let status = AppointmentStatus::from_code(status.trim());
    if !AppointmentStatus::ALL.contains(&status) {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported status: {}",
            status.code()
        )));
    }
    state.controller.update_status(event_id.trim(), status).await
}

pub fn select_slot_impl<C: DashboardApi>(
    state: &AppState<C>,
    start: String,
    end: String,
) -> Result<AppointmentDraft, InfraError> {
    let start = parse_wall_clock_input(&start, "start")?;
    let end = parse_wall_clock_input(&end, "end")?;
    let mut draft = state.controller.select_slot(start, end)?;
    if let Some(patient) = lock_session(state)?.selected_patient.as_ref() {
        draft.patient_id = Some(patient.id.clone());
    }
    Ok(draft)
}

pub async fn create_appointment_impl<C: DashboardApi>(
    state: &AppState<C>,
    draft: AppointmentDraft,
) -> Result<MutationAck, InfraError> {
    let ack = state.controller.create_appointment(&draft).await?;
    state.log_info(
        "create_appointment",
        &format!(
            "created appointment {} on {} {}",
            ack.appointment_id.as_deref().unwrap_or("?"),
            draft.date,
            draft.time.format("%H:%M")
        ),
    );
    Ok(ack)
}

pub async fn load_settings_impl<C: DashboardApi>(
    state: &AppState<C>,
) -> Result<AppointmentSettings, InfraError> {
    let settings = state.controller.reload_settings().await?;
    lock_session(state)?.settings = Some(settings.clone());
    Ok(settings)
}

pub fn cached_settings_impl<C: DashboardApi>(
    state: &AppState<C>,
) -> Result<Option<AppointmentSettings>, InfraError> {
    Ok(lock_session(state)?.settings.clone())
}

pub async fn search_patients_impl<C: DashboardApi>(
    state: &AppState<C>,
    query: Option<String>,
) -> Result<Vec<PatientSummary>, InfraError> {
    state
        .controller
        .search_patients(query.as_deref().unwrap_or_default())
        .await
}

pub fn select_patient_impl<C: DashboardApi>(
    state: &AppState<C>,
    patient: Option<PatientSummary>,
) -> Result<Option<PatientSummary>, InfraError> {
    let mut session = lock_session(state)?;
    session.selected_patient = patient;
    Ok(session.selected_patient.clone())
}

pub async fn create_patient_impl<C: DashboardApi>(
    state: &AppState<C>,
    draft: PatientDraft,
) -> Result<PatientSummary, InfraError> {
    let patient = state.controller.create_patient(&draft).await?;
    state.log_info(
        "create_patient",
        &format!("created patient {} ({})", patient.id, patient.full_name),
    );
    select_patient_impl(state, Some(patient.clone()))?;
    Ok(patient)
}

pub async fn list_doctors_impl<C: DashboardApi>(
    state: &AppState<C>,
) -> Result<Vec<DoctorSummary>, InfraError> {
    state.controller.list_doctors().await
}

fn lock_session<C: DashboardApi>(state: &AppState<C>) -> Result<MutexGuard<'_, SessionState>, InfraError> {
    state
        .session
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("session lock poisoned: {error}")))
}

fn resolve_range(
    zone: Tz,
    start: Option<String>,
    end: Option<String>,
) -> Result<DateRange, InfraError> {
    match (start, end) {
        (None, None) => Ok(DateRange::week_of(Utc::now().with_timezone(&zone).date_naive())),
        (Some(start), None) => Ok(DateRange::week_of(parse_date(&start, "start")?)),
        (start, Some(end)) => {
            let end = parse_date(&end, "end")?;
            let start = match start {
                Some(raw) => parse_date(&raw, "start")?,
                None => end,
            };
            DateRange::new(start, end).map_err(InfraError::InvalidConfig)
        }
    }
}

fn parse_wall_clock_input(value: &str, field_name: &str) -> Result<NaiveDateTime, InfraError> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    Err(InfraError::InvalidConfig(format!(
        "{field_name} must be YYYY-MM-DDTHH:MM"
    )))
}

fn parse_status_action(value: &str) -> Result<StatusAction, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "confirm_attendance" | "confirm" => Ok(StatusAction::ConfirmAttendance),
        "complete" => Ok(StatusAction::Complete),
        "cancel" => Ok(StatusAction::Cancel),
        other => Err(InfraError::InvalidConfig(format!("unsupported status action: {other}"))),
    }
}

fn describe_gesture(event_id: &str, outcome: &GestureOutcome) -> String {
    match outcome {
        GestureOutcome::Committed(event) => format!(
            "event {event_id} committed at {}..{}",
            event.start.format("%Y-%m-%d %H:%M"),
            event.end.format("%H:%M")
        ),
        GestureOutcome::Reverted(reason) => format!("event {event_id} reverted: {reason:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::calendar_controller::RevertReason;
    use crate::infrastructure::dashboard_client::AppointmentUpdate;
    use crate::infrastructure::event_mapper::ScheduleResponse;
    use crate::infrastructure::notifier::RecordingNotifier;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "clinic-agenda-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self, client: Arc<StaticDashboardApi>) -> AppState<StaticDashboardApi> {
            AppState::with_client(self.path.clone(), client)
                .expect("initialize app state")
                .with_notifier(Arc::new(RecordingNotifier::default()))
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[derive(Default)]
    struct StaticDashboardApi {
        updates: Mutex<Vec<AppointmentUpdate>>,
        list_calls: AtomicUsize,
    }

    #[async_trait]
    impl DashboardApi for StaticDashboardApi {
        async fn list_schedule(&self, _range: DateRange) -> Result<ScheduleResponse, InfraError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(serde_json::json!({
                "appointments": [{
                    "id": 5,
                    "patient_name": "João Pereira",
                    "doctor_name": "Dra. Lima",
                    "appointment_date": "2024-03-18",
                    "appointment_time": "14:00",
                    "duration_minutes": 60,
                    "status": "confirmed"
                }],
                "blocks": []
            }))
            .expect("valid fixture"))
        }

        async fn update_appointment(&self, update: &AppointmentUpdate) -> Result<MutationAck, InfraError> {
            self.updates.lock().expect("update lock").push(update.clone());
            Ok(MutationAck::default())
        }

        async fn create_appointment(&self, _draft: &AppointmentDraft) -> Result<MutationAck, InfraError> {
            Ok(MutationAck::default())
        }

        async fn confirm_attendance(&self, _appointment_id: &str) -> Result<MutationAck, InfraError> {
            Ok(MutationAck::default())
        }

        async fn complete_appointment(&self, _appointment_id: &str) -> Result<MutationAck, InfraError> {
            Ok(MutationAck::default())
        }

        async fn cancel_appointment(
            &self,
            _appointment_id: &str,
            _reason: &str,
        ) -> Result<MutationAck, InfraError> {
            Ok(MutationAck::default())
        }

        async fn fetch_settings(&self) -> Result<AppointmentSettings, InfraError> {
            Ok(AppointmentSettings {
                duration_options: vec![30, 60],
                ..AppointmentSettings::default()
            })
        }

        async fn search_patients(&self, query: &str) -> Result<Vec<PatientSummary>, InfraError> {
            let patients = vec![PatientSummary {
                id: "5".to_string(),
                full_name: "João Pereira".to_string(),
                email: Some("joao@example.com".to_string()),
                phone: None,
            }];
            Ok(patients.into_iter().filter(|patient| patient.matches(query)).collect())
        }

        async fn create_patient(&self, draft: &PatientDraft) -> Result<PatientSummary, InfraError> {
            Ok(draft.clone().into_summary("31".to_string()))
        }

        async fn list_doctors(&self) -> Result<Vec<DoctorSummary>, InfraError> {
            Ok(vec![DoctorSummary {
                id: "2".to_string(),
                full_name: "Dra. Lima".to_string(),
                specialization: Some("Clínica geral".to_string()),
                medical_license: None,
            }])
        }
    }

    #[tokio::test]
    async fn load_schedule_uses_requested_week() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(StaticDashboardApi::default()));

        let view = load_schedule_impl(&state, Some("2024-03-20".to_string()), None)
            .await
            .expect("load schedule");

        assert_eq!(view.start.to_string(), "2024-03-18");
        assert_eq!(view.end.to_string(), "2024-03-24");
        assert_eq!(view.events.len(), 1);
        assert!(!view.stale);
    }

    #[tokio::test]
    async fn load_schedule_rejects_inverted_range() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(StaticDashboardApi::default()));

        let result = load_schedule_impl(
            &state,
            Some("2024-03-20".to_string()),
            Some("2024-03-18".to_string()),
        )
        .await;
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn move_appointment_sends_wall_clock_fields() {
        let workspace = TempWorkspace::new();
        let client = Arc::new(StaticDashboardApi::default());
        let state = workspace.app_state(Arc::clone(&client));
        load_schedule_impl(&state, Some("2024-03-18".to_string()), None)
            .await
            .expect("load schedule");

        let outcome = move_appointment_impl(&state, "5".to_string(), "2024-03-19T08:30".to_string())
            .await
            .expect("move");

        assert!(matches!(outcome, GestureOutcome::Committed(_)));
        assert_eq!(
            client.updates.lock().expect("update lock").clone(),
            vec![AppointmentUpdate::Reschedule {
                appointment_id: "5".to_string(),
                date: "2024-03-19".to_string(),
                time: "08:30".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn resize_to_zero_length_is_reverted() {
        let workspace = TempWorkspace::new();
        let client = Arc::new(StaticDashboardApi::default());
        let state = workspace.app_state(Arc::clone(&client));
        load_schedule_impl(&state, Some("2024-03-18".to_string()), None)
            .await
            .expect("load schedule");

        let outcome = resize_appointment_impl(&state, "5".to_string(), "2024-03-18 14:00".to_string())
            .await
            .expect("resize");

        assert_eq!(outcome, GestureOutcome::Reverted(RevertReason::InvalidInterval));
        assert!(client.updates.lock().expect("update lock").is_empty());
    }

    #[test]
    fn malformed_gesture_input_is_rejected() {
        assert!(parse_wall_clock_input("18/03/2024 14:00", "new_start").is_err());
        assert!(parse_status_action("reopen").is_err());
        assert_eq!(
            parse_status_action(" Confirm_Attendance ").expect("action"),
            StatusAction::ConfirmAttendance
        );
    }

    #[tokio::test]
    async fn unknown_status_is_rejected_before_any_request() {
        let workspace = TempWorkspace::new();
        let client = Arc::new(StaticDashboardApi::default());
        let state = workspace.app_state(Arc::clone(&client));
        load_schedule_impl(&state, Some("2024-03-18".to_string()), None)
            .await
            .expect("load schedule");

        let result = update_status_impl(&state, "5".to_string(), "archived".to_string()).await;

        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
        assert!(client.updates.lock().expect("update lock").is_empty());
    }

    #[tokio::test]
    async fn selected_patient_prefills_slot_draft() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(StaticDashboardApi::default()));

        let patients = search_patients_impl(&state, Some("joão".to_string()))
            .await
            .expect("search");
        assert_eq!(patients.len(), 1);
        select_patient_impl(&state, patients.into_iter().next()).expect("select");

        let draft = select_slot_impl(&state, "2024-03-18T09:00".to_string(), "2024-03-18T09:30".to_string())
            .expect("draft");
        assert_eq!(draft.patient_id.as_deref(), Some("5"));
        assert_eq!(draft.duration_minutes, 30);
    }

    #[tokio::test]
    async fn new_patient_and_listed_doctor_complete_a_draft() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(StaticDashboardApi::default()));

        let patient = create_patient_impl(
            &state,
            PatientDraft {
                first_name: "Ana".to_string(),
                last_name: "Lima".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 4),
                gender: Some("F".to_string()),
                ..PatientDraft::default()
            },
        )
        .await
        .expect("create patient");
        assert_eq!(patient.id, "31");

        let doctors = list_doctors_impl(&state).await.expect("doctors");
        let mut draft = select_slot_impl(&state, "2024-03-18T10:00".to_string(), "2024-03-18T10:30".to_string())
            .expect("draft");
        assert_eq!(draft.patient_id.as_deref(), Some("31"));

        draft.doctor_id = doctors.first().map(|doctor| doctor.id.clone());
        assert_eq!(draft.validate(), Ok(()));
        create_appointment_impl(&state, draft).await.expect("create appointment");
    }

    #[tokio::test]
    async fn rejected_patient_leaves_selection_unchanged() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(StaticDashboardApi::default()));

        let result = create_patient_impl(&state, PatientDraft::default()).await;

        assert!(matches!(result, Err(InfraError::InvalidRecord(_))));
        let draft = select_slot_impl(&state, "2024-03-18T10:00".to_string(), "2024-03-18T10:30".to_string())
            .expect("draft");
        assert_eq!(draft.patient_id, None);
    }

    #[tokio::test]
    async fn teardown_clears_session_and_events() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(StaticDashboardApi::default()));
        load_schedule_impl(&state, Some("2024-03-18".to_string()), None)
            .await
            .expect("load schedule");
        load_settings_impl(&state).await.expect("settings");
        assert!(cached_settings_impl(&state).expect("cached").is_some());

        state.teardown().expect("teardown");

        assert!(cached_settings_impl(&state).expect("cached").is_none());
        assert!(state.controller().events().expect("events").is_empty());
        assert!(event_details_impl(&state, "5".to_string()).is_err());
    }
}
