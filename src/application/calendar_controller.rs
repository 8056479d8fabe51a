use crate::domain::conflict::find_conflicts;
use crate::domain::lifecycle::{
    offered_actions, EventPhase, GestureKind, PhaseSignal, StatusAction,
};
use crate::domain::models::{
    AppointmentDraft, AppointmentStatus, CalendarEvent, DateRange, DoctorSummary, PatientDraft,
    PatientSummary, PaymentType,
};
use crate::domain::status::StatusPalette;
use crate::infrastructure::dashboard_client::{AppointmentUpdate, DashboardApi, MutationAck};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{localize, map_schedule, wall_clock_fields};
use crate::infrastructure::event_store::EventStore;
use crate::infrastructure::notifier::{Notification, Notifier, TracingNotifier};
use crate::infrastructure::settings::AppointmentSettings;
use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

const DEFAULT_CANCELLATION_REASON: &str = "Cancelado pelo usuário";
const LOAD_FAILED: &str = "Erro ao carregar agenda";
const SETTINGS_FAILED: &str = "Erro ao carregar configurações";
const RESCHEDULED: &str = "Consulta atualizada com sucesso!";
const RESCHEDULE_FAILED: &str = "Erro ao atualizar consulta";
const RESIZED: &str = "Duração da consulta atualizada com sucesso!";
const RESIZE_FAILED: &str = "Erro ao atualizar duração";
const CREATED: &str = "Consulta agendada com sucesso!";
const CREATE_FAILED: &str = "Erro ao agendar consulta";
const STATUS_UPDATED: &str = "Status atualizado com sucesso!";
const STATUS_UPDATE_FAILED: &str = "Erro ao atualizar status";
const PATIENT_CREATED: &str = "Paciente criado com sucesso!";
const PATIENT_CREATE_FAILED: &str = "Erro ao criar paciente";
const DOCTORS_FAILED: &str = "Erro ao carregar médicos";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefetchOutcome {
    Applied { events: Vec<CalendarEvent> },
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RevertReason {
    Conflict { with: Vec<String> },
    InvalidInterval,
    Rejected(String),
    Transport(String),
    NotEditable,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum GestureOutcome {
    Committed(CalendarEvent),
    Reverted(RevertReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum GestureStart {
    Started(EventPhase),
    Refused(RevertReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StatusActionOutcome {
    Applied { status: AppointmentStatus },
    NotOffered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentDetails {
    pub id: String,
    pub patient_name: String,
    pub is_self_pay: bool,
    pub is_first_appointment: bool,
    pub doctor_name: String,
    pub date: String,
    pub time: String,
    pub duration: String,
    pub appointment_type: String,
    pub payment_type: String,
    pub value: String,
    pub location: String,
    pub reason: String,
    pub notes: String,
    pub status: AppointmentStatus,
    pub status_label: String,
    pub badge_class: &'static str,
    pub offered_actions: Vec<StatusAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDetails {
    pub id: String,
    pub title: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetails {
    Appointment(AppointmentDetails),
    Block(BlockDetails),
}

pub struct CalendarController<C, S>
where
    C: DashboardApi,
    S: EventStore,
{
    api: Arc<C>,
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    zone: Tz,
    palette: RwLock<StatusPalette>,
    generation: AtomicU64,
    phases: Mutex<HashMap<String, EventPhase>>,
    last_range: Mutex<Option<DateRange>>,
}

impl<C, S> CalendarController<C, S>
where
    C: DashboardApi,
    S: EventStore,
{
    pub fn new(api: Arc<C>, store: Arc<S>, zone: Tz) -> Self {
        Self {
            api,
            store,
            notifier: Arc::new(TracingNotifier),
            zone,
            palette: RwLock::new(StatusPalette::default()),
            generation: AtomicU64::new(0),
            phases: Mutex::new(HashMap::new()),
            last_range: Mutex::new(None),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_palette(mut self, palette: StatusPalette) -> Self {
        self.palette = RwLock::new(palette);
        self
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn events(&self) -> Result<Vec<CalendarEvent>, InfraError> {
        self.store.list_all()
    }

    pub fn last_range(&self) -> Result<Option<DateRange>, InfraError> {
        Ok(*self.lock_last_range()?)
    }

    pub fn phase_of(&self, event_id: &str) -> Result<EventPhase, InfraError> {
        Ok(self
            .lock_phases()?
            .get(event_id)
            .copied()
            .unwrap_or(EventPhase::Unplaced))
    }

    /// Replaces the whole event set with the schedule for `range`, unless a
    /// later refetch has started by the time the response arrives.
    pub async fn refetch(&self, range: DateRange) -> Result<RefetchOutcome, InfraError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.lock_last_range()? = Some(range);

        let events = match self.load_events(range).await {
            Ok(events) => events,
            Err(error) => {
                if self.is_current(generation) {
                    self.report_failure(LOAD_FAILED, &error);
                }
                return Err(error);
            }
        };

        let mut phases = self.lock_phases()?;
        if !self.is_current(generation) {
            tracing::debug!(generation, "discarding stale schedule response");
            return Ok(RefetchOutcome::Stale);
        }
        self.store.replace_all(events.clone())?;
        phases.clear();
        for event in &events {
            phases.insert(event.id.clone(), EventPhase::Rendered);
        }
        tracing::debug!(
            generation,
            count = events.len(),
            start = %range.start(),
            end = %range.end(),
            "schedule applied"
        );
        Ok(RefetchOutcome::Applied { events })
    }

    pub fn begin_drag(&self, event_id: &str) -> Result<GestureStart, InfraError> {
        self.begin(event_id, GestureKind::Drag)
    }

    pub fn begin_resize(&self, event_id: &str) -> Result<GestureStart, InfraError> {
        self.begin(event_id, GestureKind::Resize)
    }

    pub async fn drop_event(
        &self,
        event_id: &str,
        new_start: NaiveDateTime,
    ) -> Result<GestureOutcome, InfraError> {
        let event = self.require_event(event_id)?;
        if let GestureStart::Refused(reason) = self.begin(event_id, GestureKind::Drag)? {
            return Ok(GestureOutcome::Reverted(reason));
        }

        let start = localize(self.zone, new_start);
        let end = start + event.duration();
        if let Some(outcome) = self.check_release(&event, start, end)? {
            return Ok(outcome);
        }

        let (date, time) = wall_clock_fields(&start);
        let update = AppointmentUpdate::Reschedule {
            appointment_id: event.id.clone(),
            date,
            time,
        };
        let moved = CalendarEvent { start, end, ..event };
        let generation = self.generation.load(Ordering::SeqCst);
        self.persist(moved, generation, &update, RESCHEDULED, RESCHEDULE_FAILED)
            .await
    }

    pub async fn resize_event(
        &self,
        event_id: &str,
        new_end: NaiveDateTime,
    ) -> Result<GestureOutcome, InfraError> {
        let event = self.require_event(event_id)?;
        if let GestureStart::Refused(reason) = self.begin(event_id, GestureKind::Resize)? {
            return Ok(GestureOutcome::Reverted(reason));
        }

        let end = localize(self.zone, new_end);
        let minutes = (end - event.start).num_minutes();
        let Some(duration_minutes) = u32::try_from(minutes).ok().filter(|minutes| *minutes > 0) else {
            self.advance(event_id, PhaseSignal::Release { conflict: true })?;
            return Ok(GestureOutcome::Reverted(RevertReason::InvalidInterval));
        };
        if let Some(outcome) = self.check_release(&event, event.start, end)? {
            return Ok(outcome);
        }

        let update = AppointmentUpdate::Duration {
            appointment_id: event.id.clone(),
            duration_minutes,
        };
        let resized = CalendarEvent { end, ..event };
        let generation = self.generation.load(Ordering::SeqCst);
        self.persist(resized, generation, &update, RESIZED, RESIZE_FAILED)
            .await
    }

    pub fn open_details(&self, event_id: &str) -> Result<EventDetails, InfraError> {
        let event = self.require_event(event_id)?;
        if event.is_block() {
            return Ok(EventDetails::Block(BlockDetails {
                id: event.id.clone(),
                title: event.title.clone(),
                date: event.start.format("%d/%m/%Y").to_string(),
                start_time: event.start.format("%H:%M").to_string(),
                end_time: event.end.format("%H:%M").to_string(),
                reason: event.extended.reason.clone(),
            }));
        }

        let props = &event.extended;
        let status = props
            .status
            .clone()
            .unwrap_or(AppointmentStatus::Scheduled);
        Ok(EventDetails::Appointment(AppointmentDetails {
            id: event.id.clone(),
            patient_name: props.patient_name.clone().unwrap_or_else(|| event.title.clone()),
            is_self_pay: props.is_self_pay,
            is_first_appointment: props.is_first_appointment,
            doctor_name: props.doctor_name.clone().unwrap_or_default(),
            date: event.start.format("%d/%m/%Y").to_string(),
            time: event.start.format("%H:%M").to_string(),
            duration: format!("{} minutos", event.duration_minutes()),
            appointment_type: props.type_label.clone().unwrap_or_default(),
            payment_type: props
                .payment_type
                .as_ref()
                .map(PaymentType::label)
                .unwrap_or("-")
                .to_string(),
            value: props
                .value
                .as_ref()
                .map(|value| format!("R$ {value}"))
                .unwrap_or_else(|| "-".to_string()),
            location: props.location.clone().unwrap_or_else(|| "Consultório".to_string()),
            reason: props.reason.clone().unwrap_or_else(|| "Consulta médica".to_string()),
            notes: props.notes.clone().unwrap_or_else(|| "Nenhuma observação".to_string()),
            status_label: status.label().to_string(),
            badge_class: status.badge_class(),
            offered_actions: offered_actions(&status),
            status,
        }))
    }

    pub async fn apply_status_action(
        &self,
        event_id: &str,
        action: StatusAction,
        cancellation_reason: Option<String>,
    ) -> Result<StatusActionOutcome, InfraError> {
        let event = self.require_event(event_id)?;
        let offered = event
            .extended
            .status
            .as_ref()
            .filter(|_| event.is_editable())
            .map(offered_actions)
            .unwrap_or_default();
        if !offered.contains(&action) {
            tracing::debug!(event_id, ?action, "status action not offered");
            return Ok(StatusActionOutcome::NotOffered);
        }

        let result = match action {
            StatusAction::ConfirmAttendance => self.api.confirm_attendance(&event.id).await,
            StatusAction::Complete => self.api.complete_appointment(&event.id).await,
            StatusAction::Cancel => {
                let reason = cancellation_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or(DEFAULT_CANCELLATION_REASON);
                self.api.cancel_appointment(&event.id, reason).await
            }
        };

        match result {
            Ok(ack) => {
                self.notifier.notify(Notification::success(
                    ack.message.unwrap_or_else(|| action.success_message().to_string()),
                ));
                self.refresh_last_range().await;
                Ok(StatusActionOutcome::Applied {
                    status: action.target_status(),
                })
            }
            Err(error) => {
                self.report_failure(action.failure_message(), &error);
                Err(error)
            }
        }
    }

    pub fn select_slot(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<AppointmentDraft, InfraError> {
        AppointmentDraft::for_slot(start, end).map_err(InfraError::InvalidRecord)
    }

    pub async fn create_appointment(&self, draft: &AppointmentDraft) -> Result<MutationAck, InfraError> {
        if let Err(message) = draft.validate() {
            self.notifier.notify(Notification::error(message.clone()));
            return Err(InfraError::InvalidRecord(message));
        }
        match self.api.create_appointment(draft).await {
            Ok(ack) => {
                self.notifier.notify(Notification::success(CREATED));
                self.refresh_last_range().await;
                Ok(ack)
            }
            Err(error) => {
                self.report_failure(CREATE_FAILED, &error);
                Err(error)
            }
        }
    }

    pub async fn update_status(
        &self,
        event_id: &str,
        status: AppointmentStatus,
    ) -> Result<MutationAck, InfraError> {
        let event = self.require_event(event_id)?;
        if !event.is_editable() {
            return Err(InfraError::InvalidRecord(format!(
                "event {event_id} is a schedule block and cannot change status"
            )));
        }
        let update = AppointmentUpdate::Status {
            appointment_id: event.id.clone(),
            status,
        };
        match self.api.update_appointment(&update).await {
            Ok(ack) => {
                self.notifier.notify(Notification::success(STATUS_UPDATED));
                self.refresh_last_range().await;
                Ok(ack)
            }
            Err(error) => {
                self.report_failure(STATUS_UPDATE_FAILED, &error);
                Err(error)
            }
        }
    }

    pub async fn search_patients(&self, query: &str) -> Result<Vec<PatientSummary>, InfraError> {
        self.api.search_patients(query).await
    }

    pub async fn create_patient(&self, draft: &PatientDraft) -> Result<PatientSummary, InfraError> {
        if let Err(message) = draft.validate() {
            self.notifier.notify(Notification::error(message.clone()));
            return Err(InfraError::InvalidRecord(message));
        }
        match self.api.create_patient(draft).await {
            Ok(patient) => {
                self.notifier.notify(Notification::success(PATIENT_CREATED));
                tracing::info!(patient_id = %patient.id, "patient created");
                Ok(patient)
            }
            Err(error) => {
                self.report_failure(PATIENT_CREATE_FAILED, &error);
                Err(error)
            }
        }
    }

    pub async fn list_doctors(&self) -> Result<Vec<DoctorSummary>, InfraError> {
        self.api.list_doctors().await.inspect_err(|error| {
            self.report_failure(DOCTORS_FAILED, error);
        })
    }

    pub async fn reload_settings(&self) -> Result<AppointmentSettings, InfraError> {
        let settings = match self.api.fetch_settings().await {
            Ok(settings) => settings,
            Err(error) => {
                self.report_failure(SETTINGS_FAILED, &error);
                return Err(error);
            }
        };
        {
            let mut palette = self
                .palette
                .write()
                .map_err(|error| InfraError::InvalidConfig(format!("palette lock poisoned: {error}")))?;
            *palette = settings.palette();
        }
        self.refresh_last_range().await;
        Ok(settings)
    }

    pub fn clear(&self) -> Result<(), InfraError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut phases = self.lock_phases()?;
        self.store.replace_all(Vec::new())?;
        phases.clear();
        *self.lock_last_range()? = None;
        Ok(())
    }

    async fn load_events(&self, range: DateRange) -> Result<Vec<CalendarEvent>, InfraError> {
        let response = self.api.list_schedule(range).await?;
        let palette = self.current_palette()?;
        map_schedule(&response, self.zone, &palette)
    }

    async fn refresh_last_range(&self) {
        let range = match self.last_range() {
            Ok(Some(range)) => range,
            Ok(None) => return,
            Err(error) => {
                tracing::error!(%error, "cannot read last visible range");
                return;
            }
        };
        if let Err(error) = self.refetch(range).await {
            tracing::warn!(%error, "refresh after mutation failed");
        }
    }

    fn begin(&self, event_id: &str, kind: GestureKind) -> Result<GestureStart, InfraError> {
        let event = self.require_event(event_id)?;
        if !event.is_editable() {
            return Ok(GestureStart::Refused(RevertReason::NotEditable));
        }

        let mut phases = self.lock_phases()?;
        let current = match phases.get(event_id).copied() {
            None | Some(EventPhase::Unplaced) => EventPhase::Rendered,
            Some(phase @ (EventPhase::Committed | EventPhase::Reverted)) => {
                phase.apply(PhaseSignal::Settle).unwrap_or(EventPhase::Rendered)
            }
            Some(phase) => phase,
        };
        let already_started = matches!(
            (current, kind),
            (EventPhase::Dragging, GestureKind::Drag) | (EventPhase::Resizing, GestureKind::Resize)
        );
        if already_started {
            return Ok(GestureStart::Started(current));
        }

        match current.apply(PhaseSignal::Begin(kind)) {
            Ok(next) => {
                phases.insert(event_id.to_string(), next);
                Ok(GestureStart::Started(next))
            }
            Err(invalid) => {
                tracing::debug!(event_id, %invalid, "gesture refused");
                Ok(GestureStart::Refused(RevertReason::Busy))
            }
        }
    }

    fn check_release(
        &self,
        event: &CalendarEvent,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Option<GestureOutcome>, InfraError> {
        let others = self.store.list_all()?;
        let conflicts: Vec<String> = find_conflicts(&event.id, start, end, &others)
            .into_iter()
            .map(|other| other.id.clone())
            .collect();
        if conflicts.is_empty() {
            self.advance(&event.id, PhaseSignal::Release { conflict: false })?;
            return Ok(None);
        }

        tracing::info!(event_id = %event.id, conflicts = ?conflicts, "gesture reverted on conflict");
        self.advance(&event.id, PhaseSignal::Release { conflict: true })?;
        Ok(Some(GestureOutcome::Reverted(RevertReason::Conflict {
            with: conflicts,
        })))
    }

    /// `generation` is the event set the candidate was computed against. If a
    /// refetch replaced that set while the update was in flight, the refetched
    /// events win and the candidate is not written back.
    async fn persist(
        &self,
        candidate: CalendarEvent,
        generation: u64,
        update: &AppointmentUpdate,
        success_message: &str,
        failure_message: &str,
    ) -> Result<GestureOutcome, InfraError> {
        match self.api.update_appointment(update).await {
            Ok(_) => {
                {
                    let _phases = self.lock_phases()?;
                    if self.is_current(generation) && self.store.get_by_id(&candidate.id)?.is_some() {
                        self.store.upsert(&candidate)?;
                    } else {
                        tracing::debug!(
                            event_id = %candidate.id,
                            generation,
                            "event set replaced during update; keeping refetched events"
                        );
                    }
                }
                self.advance(&candidate.id, PhaseSignal::Persisted)?;
                self.notifier.notify(Notification::success(success_message));
                tracing::info!(event_id = %candidate.id, "gesture committed");
                Ok(GestureOutcome::Committed(candidate))
            }
            Err(error) => {
                self.advance(&candidate.id, PhaseSignal::PersistFailed)?;
                self.report_failure(failure_message, &error);
                let reason = match error {
                    InfraError::Api(message) => RevertReason::Rejected(message),
                    other => RevertReason::Transport(other.to_string()),
                };
                Ok(GestureOutcome::Reverted(reason))
            }
        }
    }

    fn advance(&self, event_id: &str, signal: PhaseSignal) -> Result<(), InfraError> {
        let mut phases = self.lock_phases()?;
        let current = phases.get(event_id).copied().unwrap_or(EventPhase::Unplaced);
        match current.apply(signal) {
            Ok(next) => {
                phases.insert(event_id.to_string(), next);
            }
            Err(invalid) => tracing::debug!(event_id, %invalid, "phase transition skipped"),
        }
        Ok(())
    }

    fn report_failure(&self, prefix: &str, error: &InfraError) {
        match error {
            InfraError::Api(message) => tracing::warn!(%message, "{prefix}"),
            other => tracing::error!(error = %other, "{prefix}"),
        }
        self.notifier
            .notify(Notification::error_with_detail(prefix, error.server_message()));
    }

    fn require_event(&self, event_id: &str) -> Result<CalendarEvent, InfraError> {
        self.store
            .get_by_id(event_id)?
            .ok_or_else(|| InfraError::InvalidRecord(format!("unknown calendar event: {event_id}")))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn current_palette(&self) -> Result<StatusPalette, InfraError> {
        self.palette
            .read()
            .map(|palette| palette.clone())
            .map_err(|error| InfraError::InvalidConfig(format!("palette lock poisoned: {error}")))
    }

    fn lock_phases(&self) -> Result<MutexGuard<'_, HashMap<String, EventPhase>>, InfraError> {
        self.phases
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("phase table lock poisoned: {error}")))
    }

    fn lock_last_range(&self) -> Result<MutexGuard<'_, Option<DateRange>>, InfraError> {
        self.last_range
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("range lock poisoned: {error}")))
    }
}
