use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SELF_PAY_CODE: &str = "particular";
pub const SELF_PAY_LABEL: &str = "Particular";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
    Other(String),
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
        AppointmentStatus::Rescheduled,
    ];

    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "scheduled" => AppointmentStatus::Scheduled,
            "confirmed" => AppointmentStatus::Confirmed,
            "in_progress" => AppointmentStatus::InProgress,
            "completed" => AppointmentStatus::Completed,
            "cancelled" => AppointmentStatus::Cancelled,
            "no_show" => AppointmentStatus::NoShow,
            "rescheduled" => AppointmentStatus::Rescheduled,
            _ => AppointmentStatus::Other(code.trim().to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::Other(code) => code,
        }
    }
}

impl From<String> for AppointmentStatus {
    fn from(value: String) -> Self {
        AppointmentStatus::from_code(&value)
    }
}

impl From<AppointmentStatus> for String {
    fn from(value: AppointmentStatus) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum PaymentType {
    Convenio,
    Particular,
    Other(String),
}

impl PaymentType {
    pub fn from_code(code: &str) -> Self {
        let trimmed = code.trim();
        if trimmed.eq_ignore_ascii_case(SELF_PAY_CODE) || trimmed == SELF_PAY_LABEL {
            return PaymentType::Particular;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "convenio" | "convênio" => PaymentType::Convenio,
            _ => PaymentType::Other(trimmed.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            PaymentType::Convenio => "convenio",
            PaymentType::Particular => SELF_PAY_CODE,
            PaymentType::Other(code) => code,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PaymentType::Convenio => "Convênio",
            PaymentType::Particular => SELF_PAY_LABEL,
            PaymentType::Other(code) => code,
        }
    }

    pub fn is_self_pay(&self) -> bool {
        matches!(self, PaymentType::Particular)
    }
}

impl From<String> for PaymentType {
    fn from(value: String) -> Self {
        PaymentType::from_code(&value)
    }
}

impl From<PaymentType> for String {
    fn from(value: PaymentType) -> Self {
        value.code().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum AppointmentType {
    Consultation,
    FollowUp,
    Checkup,
    Emergency,
    Procedure,
    Therapy,
    Other,
    Custom(String),
}

impl AppointmentType {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "consultation" => AppointmentType::Consultation,
            "follow_up" => AppointmentType::FollowUp,
            "checkup" => AppointmentType::Checkup,
            "emergency" => AppointmentType::Emergency,
            "procedure" => AppointmentType::Procedure,
            "therapy" => AppointmentType::Therapy,
            "other" => AppointmentType::Other,
            _ => AppointmentType::Custom(code.trim().to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            AppointmentType::Consultation => "consultation",
            AppointmentType::FollowUp => "follow_up",
            AppointmentType::Checkup => "checkup",
            AppointmentType::Emergency => "emergency",
            AppointmentType::Procedure => "procedure",
            AppointmentType::Therapy => "therapy",
            AppointmentType::Other => "other",
            AppointmentType::Custom(code) => code,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AppointmentType::Consultation => "Consulta",
            AppointmentType::FollowUp => "Retorno",
            AppointmentType::Checkup => "Check-up",
            AppointmentType::Emergency => "Emergência",
            AppointmentType::Procedure => "Procedimento",
            AppointmentType::Therapy => "Terapia",
            AppointmentType::Other => "Outro",
            AppointmentType::Custom(code) => code,
        }
    }
}

impl From<String> for AppointmentType {
    fn from(value: String) -> Self {
        AppointmentType::from_code(&value)
    }
}

impl From<AppointmentType> for String {
    fn from(value: AppointmentType) -> Self {
        value.code().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: String,
    pub patient_id: Option<String>,
    pub patient_name: String,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub appointment_type: AppointmentType,
    pub payment_type: Option<PaymentType>,
    pub status: AppointmentStatus,
    pub value: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub is_first_appointment: bool,
}

impl Appointment {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "appointment.id")?;
        if self.duration_minutes == 0 {
            return Err("appointment.duration_minutes must be > 0".to_string());
        }
        Ok(())
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn is_self_pay(&self) -> bool {
        self.payment_type
            .as_ref()
            .map(PaymentType::is_self_pay)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleBlock {
    pub id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub reason: Option<String>,
}

impl ScheduleBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        if self.end <= self.start {
            return Err("block.end must be after block.start".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Appointment,
    Block,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedProps {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub appointment_type: Option<AppointmentType>,
    pub type_label: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub status_label: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub value: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub is_first_appointment: bool,
    pub is_self_pay: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub color: String,
    pub kind: EventKind,
    #[serde(rename = "extendedProps")]
    pub extended: ExtendedProps,
}

impl CalendarEvent {
    pub fn is_block(&self) -> bool {
        self.kind == EventKind::Block
    }

    pub fn is_editable(&self) -> bool {
        self.kind == EventKind::Appointment
    }

    pub fn local_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if end < start {
            return Err(format!("range end {end} must not precede start {start}"));
        }
        Ok(Self { start, end })
    }

    pub fn week_of(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_monday());
        let start = date - Duration::days(offset);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppointmentDraft {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub appointment_type: AppointmentType,
    pub payment_type: PaymentType,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
}

impl AppointmentDraft {
    pub fn for_slot(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, String> {
        let minutes = (end - start).num_minutes();
        if minutes <= 0 {
            return Err("selected slot must end after it starts".to_string());
        }
        let duration_minutes = u32::try_from(minutes)
            .map_err(|_| format!("selected slot is too long: {minutes} minutes"))?;
        Ok(Self {
            patient_id: None,
            doctor_id: None,
            date: start.date(),
            time: start.time(),
            duration_minutes,
            appointment_type: AppointmentType::Consultation,
            payment_type: PaymentType::Particular,
            status: AppointmentStatus::Scheduled,
            reason: None,
            notes: None,
            location: None,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        let patient = self.patient_id.as_deref().unwrap_or_default();
        let doctor = self.doctor_id.as_deref().unwrap_or_default();
        if patient.trim().is_empty() || doctor.trim().is_empty() {
            return Err("Paciente, médico, data e horário são obrigatórios".to_string());
        }
        if self.duration_minutes == 0 {
            return Err("draft.duration_minutes must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientSummary {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl PatientSummary {
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.full_name.to_lowercase().contains(&query)
            || self
                .email
                .as_deref()
                .map(|email| email.to_lowercase().contains(&query))
                .unwrap_or(false)
            || self
                .phone
                .as_deref()
                .map(|phone| phone.contains(&query))
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctorSummary {
    pub id: String,
    pub full_name: String,
    pub specialization: Option<String>,
    pub medical_license: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PatientDraft {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl PatientDraft {
    pub fn validate(&self) -> Result<(), String> {
        let gender = self.gender.as_deref().unwrap_or_default();
        if self.first_name.trim().is_empty()
            || self.last_name.trim().is_empty()
            || self.date_of_birth.is_none()
            || gender.trim().is_empty()
        {
            return Err("Nome, sobrenome, data de nascimento e sexo são obrigatórios".to_string());
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    pub fn into_summary(self, id: String) -> PatientSummary {
        PatientSummary {
            id,
            full_name: self.full_name(),
            email: non_blank(self.email),
            phone: non_blank(self.phone),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
