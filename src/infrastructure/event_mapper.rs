use crate::domain::models::{
    Appointment, AppointmentStatus, AppointmentType, CalendarEvent, EventKind, ExtendedProps,
    PaymentType, ScheduleBlock,
};
use crate::domain::status::{StatusPalette, NEUTRAL_COLOR};
use crate::infrastructure::error::InfraError;
use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
};
use chrono_tz::Tz;
use serde::Deserialize;

pub const BLOCK_COLOR: &str = NEUTRAL_COLOR;
const BLOCK_ID_PREFIX: &str = "block-";
const BLOCK_TITLE_PREFIX: &str = "Bloqueio";
const BLOCK_TITLE_GENERIC: &str = "Horário bloqueado";

/// Identifiers arrive as JSON numbers from the dashboard but as strings from
/// some older views.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    pub fn into_string(self) -> String {
        match self {
            WireId::Number(value) => value.to_string(),
            WireId::Text(value) => value.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppointmentRecord {
    pub id: WireId,
    #[serde(default)]
    pub patient_id: Option<WireId>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    pub status: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_first_appointment: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BlockRecord {
    pub id: WireId,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub appointments: Vec<AppointmentRecord>,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
}

pub fn map_schedule(
    response: &ScheduleResponse,
    zone: Tz,
    palette: &StatusPalette,
) -> Result<Vec<CalendarEvent>, InfraError> {
    let mut events = Vec::with_capacity(response.appointments.len() + response.blocks.len());
    for record in &response.appointments {
        let appointment = decode_appointment(record)?;
        events.push(appointment_event(&appointment, zone, palette));
    }
    for record in &response.blocks {
        let block = decode_block(record, zone)?;
        events.push(block_event(&block, zone));
    }
    Ok(events)
}

pub fn decode_appointment(record: &AppointmentRecord) -> Result<Appointment, InfraError> {
    let id = record.id.clone().into_string();
    let date = parse_date(&record.appointment_date, "appointment_date")?;
    let time = parse_time(&record.appointment_time, "appointment_time")?;

    let appointment = Appointment {
        id,
        patient_id: record.patient_id.clone().map(WireId::into_string),
        patient_name: record.patient_name.clone().unwrap_or_default(),
        doctor_name: record.doctor_name.clone().unwrap_or_default(),
        date,
        time,
        duration_minutes: record.duration_minutes,
        appointment_type: record
            .appointment_type
            .as_deref()
            .map(AppointmentType::from_code)
            .unwrap_or(AppointmentType::Consultation),
        payment_type: optional_text(record.payment_type.as_deref()).map(|value| PaymentType::from_code(&value)),
        status: AppointmentStatus::from_code(&record.status),
        value: record.value.as_ref().and_then(value_text),
        reason: optional_text(record.reason.as_deref()),
        notes: optional_text(record.notes.as_deref()),
        location: optional_text(record.location.as_deref()),
        is_first_appointment: record.is_first_appointment,
    };
    appointment.validate().map_err(InfraError::InvalidRecord)?;
    Ok(appointment)
}

pub fn decode_block(record: &BlockRecord, zone: Tz) -> Result<ScheduleBlock, InfraError> {
    let block = ScheduleBlock {
        id: record.id.clone().into_string(),
        start: parse_wall_clock(&record.start, "block.start", zone)?,
        end: parse_wall_clock(&record.end, "block.end", zone)?,
        reason: optional_text(record.reason.as_deref()),
    };
    block.validate().map_err(InfraError::InvalidRecord)?;
    Ok(block)
}

pub fn appointment_event(
    appointment: &Appointment,
    zone: Tz,
    palette: &StatusPalette,
) -> CalendarEvent {
    let start = localize(zone, appointment.starts_at());
    let end = start + Duration::minutes(i64::from(appointment.duration_minutes));
    let resolved = palette.resolve(&appointment.status);

    CalendarEvent {
        id: appointment.id.clone(),
        title: appointment.patient_name.clone(),
        start,
        end,
        color: resolved.color,
        kind: EventKind::Appointment,
        extended: ExtendedProps {
            patient_id: appointment.patient_id.clone(),
            patient_name: Some(appointment.patient_name.clone()),
            doctor_name: Some(appointment.doctor_name.clone()),
            type_label: Some(appointment.appointment_type.label().to_string()),
            appointment_type: Some(appointment.appointment_type.clone()),
            status: Some(appointment.status.clone()),
            status_label: Some(resolved.label),
            payment_type: appointment.payment_type.clone(),
            value: appointment.value.clone(),
            reason: appointment.reason.clone(),
            notes: appointment.notes.clone(),
            location: appointment.location.clone(),
            is_first_appointment: appointment.is_first_appointment,
            is_self_pay: appointment.is_self_pay(),
        },
    }
}

pub fn block_event(block: &ScheduleBlock, zone: Tz) -> CalendarEvent {
    let title = match block.reason.as_deref() {
        Some(reason) => format!("{BLOCK_TITLE_PREFIX}: {reason}"),
        None => BLOCK_TITLE_GENERIC.to_string(),
    };
    CalendarEvent {
        id: block_event_id(&block.id),
        title,
        start: localize(zone, block.start),
        end: localize(zone, block.end),
        color: BLOCK_COLOR.to_string(),
        kind: EventKind::Block,
        extended: ExtendedProps {
            reason: block.reason.clone(),
            ..ExtendedProps::default()
        },
    }
}

pub fn block_event_id(block_id: &str) -> String {
    format!("{BLOCK_ID_PREFIX}{block_id}")
}

/// Interprets a wall-clock reading in `zone`.
///
/// Ambiguous readings (clocks turned back) take the earlier instant. Readings
/// inside a forward gap keep the offset in force before the gap, so they land
/// after it by the gap length.
pub fn localize(zone: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(value) => value,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before_gap = zone
                .from_local_datetime(&(naive - Duration::days(1)))
                .earliest()
                .map(|value| value.offset().fix().local_minus_utc())
                .unwrap_or(0);
            zone.from_utc_datetime(&(naive - Duration::seconds(i64::from(before_gap))))
        }
    }
}

pub fn wall_clock_fields(instant: &DateTime<Tz>) -> (String, String) {
    let local = instant.naive_local();
    (
        local.format("%Y-%m-%d").to_string(),
        local.format("%H:%M").to_string(),
    )
}

pub fn parse_date(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidRecord(format!("invalid {field_name} '{value}': {error}"))
    })
}

pub fn parse_time(value: &str, field_name: &str) -> Result<NaiveTime, InfraError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|error| InfraError::InvalidRecord(format!("invalid {field_name} '{value}': {error}")))
}

fn parse_wall_clock(value: &str, field_name: &str, zone: Tz) -> Result<NaiveDateTime, InfraError> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|parsed| parsed.with_timezone(&zone).naive_local())
        .map_err(|error| InfraError::InvalidRecord(format!("invalid {field_name} '{value}': {error}")))
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::String(text) => optional_text(Some(text)),
        _ => None,
    }
}
