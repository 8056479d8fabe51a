use crate::domain::models::{
    AppointmentDraft, AppointmentStatus, DateRange, DoctorSummary, PatientDraft, PatientSummary,
};
use crate::infrastructure::config::AgendaConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{ScheduleResponse, WireId};
use crate::infrastructure::settings::{decode_settings, AppointmentSettings};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const SCHEDULE_PATH: &str = "api/week-appointments/";
const APPOINTMENTS_PATH: &str = "api/appointments/";
const UPDATE_PATH: &str = "api/appointments/update/";
const CONFIRM_PATH: &str = "api/appointments/confirm-attendance/";
const COMPLETE_PATH: &str = "api/appointments/complete/";
const CANCEL_PATH: &str = "api/appointments/cancel/";
const SETTINGS_PATH: &str = "api/appointment-settings/";
const PATIENTS_PATH: &str = "api/patients/";
const CREATE_PATIENT_PATH: &str = "api/patients/create/";
const DOCTORS_PATH: &str = "api/doctors/";
const CSRF_HEADER: &str = "X-CSRFToken";
const BODY_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentUpdate {
    Reschedule {
        appointment_id: String,
        date: String,
        time: String,
    },
    Duration {
        appointment_id: String,
        duration_minutes: u32,
    },
    Status {
        appointment_id: String,
        status: AppointmentStatus,
    },
}

impl AppointmentUpdate {
    pub fn appointment_id(&self) -> &str {
        match self {
            AppointmentUpdate::Reschedule { appointment_id, .. }
            | AppointmentUpdate::Duration { appointment_id, .. }
            | AppointmentUpdate::Status { appointment_id, .. } => appointment_id,
        }
    }

    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("appointment_id", self.appointment_id().to_string())];
        match self {
            AppointmentUpdate::Reschedule { date, time, .. } => {
                fields.push(("appointment_date", date.clone()));
                fields.push(("appointment_time", time.clone()));
            }
            AppointmentUpdate::Duration {
                duration_minutes, ..
            } => fields.push(("duration_minutes", duration_minutes.to_string())),
            AppointmentUpdate::Status { status, .. } => {
                fields.push(("status", status.code().to_string()));
            }
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct MutationAck {
    pub message: Option<String>,
    pub appointment_id: Option<String>,
}

#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn list_schedule(&self, range: DateRange) -> Result<ScheduleResponse, InfraError>;

    async fn update_appointment(&self, update: &AppointmentUpdate) -> Result<MutationAck, InfraError>;

    async fn create_appointment(&self, draft: &AppointmentDraft) -> Result<MutationAck, InfraError>;

    async fn confirm_attendance(&self, appointment_id: &str) -> Result<MutationAck, InfraError>;

    async fn complete_appointment(&self, appointment_id: &str) -> Result<MutationAck, InfraError>;

    async fn cancel_appointment(
        &self,
        appointment_id: &str,
        reason: &str,
    ) -> Result<MutationAck, InfraError>;

    async fn fetch_settings(&self) -> Result<AppointmentSettings, InfraError>;

    async fn search_patients(&self, query: &str) -> Result<Vec<PatientSummary>, InfraError>;

    async fn create_patient(&self, draft: &PatientDraft) -> Result<PatientSummary, InfraError>;

    async fn list_doctors(&self) -> Result<Vec<DoctorSummary>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestDashboardClient {
    client: Client,
    base_url: Url,
    jar: Arc<Jar>,
    csrf_cookie_name: String,
}

impl ReqwestDashboardClient {
    pub fn new(config: &AgendaConfig) -> Result<Self, InfraError> {
        let jar = Arc::new(Jar::default());
        if let Some(session) = config.session_cookie.as_deref() {
            jar.add_cookie_str(
                &format!("{}={session}; Path=/", config.session_cookie_name),
                &config.base_url,
            );
        }
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|error| InfraError::Transport(format!("failed to build http client: {error}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            jar,
            csrf_cookie_name: config.csrf_cookie_name.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, InfraError> {
        self.base_url
            .join(path)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid endpoint path {path}: {error}")))
    }

    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let cookies = header.to_str().ok()?;
        cookie_value(cookies, &self.csrf_cookie_name)
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<serde_json::Value, InfraError> {
        let endpoint = self.endpoint(path)?;
        let response = self
            .client
            .get(endpoint)
            .query(query)
            .send()
            .await
            .map_err(|error| InfraError::Transport(format!("network error while {context}: {error}")))?;
        read_envelope(response, context).await
    }

    fn form_request(
        &self,
        path: &str,
        fields: &[(&'static str, String)],
        context: &str,
    ) -> Result<RequestBuilder, InfraError> {
        let endpoint = self.endpoint(path)?;
        let request = self.client.post(endpoint).form(fields);
        match self.csrf_token() {
            Some(token) => Ok(request.header(CSRF_HEADER, token)),
            None => {
                tracing::warn!(context, "no csrf cookie available for mutating request");
                Ok(request)
            }
        }
    }

    async fn post_form(
        &self,
        path: &str,
        fields: &[(&'static str, String)],
        context: &str,
    ) -> Result<serde_json::Value, InfraError> {
        let response = self
            .form_request(path, fields, context)?
            .send()
            .await
            .map_err(|error| InfraError::Transport(format!("network error while {context}: {error}")))?;
        read_envelope(response, context).await
    }
}

#[derive(Debug, serde::Deserialize)]
struct PatientRecord {
    id: WireId,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

impl PatientRecord {
    fn into_summary(self) -> PatientSummary {
        let full_name = self
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                [self.first_name.as_deref(), self.last_name.as_deref()]
                    .into_iter()
                    .flatten()
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            });
        PatientSummary {
            id: self.id.into_string(),
            full_name,
            email: self.email.filter(|value| !value.trim().is_empty()),
            phone: self.phone.filter(|value| !value.trim().is_empty()),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct DoctorRecord {
    id: WireId,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    specialization: Option<String>,
    #[serde(default)]
    medical_license: Option<String>,
}

impl DoctorRecord {
    fn into_summary(self) -> DoctorSummary {
        DoctorSummary {
            id: self.id.into_string(),
            full_name: self.full_name.trim().to_string(),
            specialization: self.specialization.filter(|value| !value.trim().is_empty()),
            medical_license: self.medical_license.filter(|value| !value.trim().is_empty()),
        }
    }
}

#[async_trait]
impl DashboardApi for ReqwestDashboardClient {
    async fn list_schedule(&self, range: DateRange) -> Result<ScheduleResponse, InfraError> {
        let query = [
            ("start", range.start().format("%Y-%m-%d").to_string()),
            ("end", range.end().format("%Y-%m-%d").to_string()),
        ];
        let payload = self.get_json(SCHEDULE_PATH, &query, "listing appointments").await?;
        serde_json::from_value(payload).map_err(|error| {
            InfraError::MalformedResponse(format!("invalid schedule payload: {error}"))
        })
    }

    async fn update_appointment(&self, update: &AppointmentUpdate) -> Result<MutationAck, InfraError> {
        let payload = self
            .post_form(UPDATE_PATH, &update.form_fields(), "updating appointment")
            .await?;
        Ok(mutation_ack(&payload))
    }

    async fn create_appointment(&self, draft: &AppointmentDraft) -> Result<MutationAck, InfraError> {
        draft.validate().map_err(InfraError::InvalidRecord)?;
        let payload = self
            .post_form(APPOINTMENTS_PATH, &draft_fields(draft), "creating appointment")
            .await?;
        Ok(mutation_ack(&payload))
    }

    async fn confirm_attendance(&self, appointment_id: &str) -> Result<MutationAck, InfraError> {
        let fields = [("appointment_id", appointment_id.to_string())];
        let payload = self
            .post_form(CONFIRM_PATH, &fields, "confirming attendance")
            .await?;
        Ok(mutation_ack(&payload))
    }

    async fn complete_appointment(&self, appointment_id: &str) -> Result<MutationAck, InfraError> {
        let fields = [("appointment_id", appointment_id.to_string())];
        let payload = self
            .post_form(COMPLETE_PATH, &fields, "completing appointment")
            .await?;
        Ok(mutation_ack(&payload))
    }

    async fn cancel_appointment(
        &self,
        appointment_id: &str,
        reason: &str,
    ) -> Result<MutationAck, InfraError> {
        let fields = [
            ("appointment_id", appointment_id.to_string()),
            ("cancellation_reason", reason.to_string()),
        ];
        let payload = self
            .post_form(CANCEL_PATH, &fields, "cancelling appointment")
            .await?;
        Ok(mutation_ack(&payload))
    }

    async fn fetch_settings(&self) -> Result<AppointmentSettings, InfraError> {
        let payload = self.get_json(SETTINGS_PATH, &[], "loading settings").await?;
        decode_settings(payload)
    }

    async fn search_patients(&self, query: &str) -> Result<Vec<PatientSummary>, InfraError> {
        let query = query.trim();
        let params: Vec<(&str, String)> = if query.is_empty() {
            Vec::new()
        } else {
            vec![("q", query.to_string())]
        };
        let mut payload = self.get_json(PATIENTS_PATH, &params, "searching patients").await?;
        let patients = payload
            .get_mut("patients")
            .map(serde_json::Value::take)
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        let records: Vec<PatientRecord> = serde_json::from_value(patients).map_err(|error| {
            InfraError::MalformedResponse(format!("invalid patients payload: {error}"))
        })?;
        Ok(records
            .into_iter()
            .map(PatientRecord::into_summary)
            .filter(|patient| patient.matches(query))
            .collect())
    }

    async fn create_patient(&self, draft: &PatientDraft) -> Result<PatientSummary, InfraError> {
        draft.validate().map_err(InfraError::InvalidRecord)?;
        let payload = self
            .post_form(CREATE_PATIENT_PATH, &patient_fields(draft), "creating patient")
            .await?;
        let patient_id = payload
            .get("patient_id")
            .and_then(wire_id_text)
            .ok_or_else(|| InfraError::MalformedResponse("patient creation returned no patient_id".to_string()))?;
        Ok(draft.clone().into_summary(patient_id))
    }

    async fn list_doctors(&self) -> Result<Vec<DoctorSummary>, InfraError> {
        let mut payload = self.get_json(DOCTORS_PATH, &[], "listing doctors").await?;
        let doctors = payload
            .get_mut("doctors")
            .map(serde_json::Value::take)
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        let records: Vec<DoctorRecord> = serde_json::from_value(doctors).map_err(|error| {
            InfraError::MalformedResponse(format!("invalid doctors payload: {error}"))
        })?;
        Ok(records.into_iter().map(DoctorRecord::into_summary).collect())
    }
}

/// The HTTP status is not consulted: `success: false` arrives with 200, and
/// anything that is not JSON counts as a transport failure.
async fn read_envelope(
    response: reqwest::Response,
    context: &str,
) -> Result<serde_json::Value, InfraError> {
    let body = response
        .text()
        .await
        .map_err(|error| InfraError::Transport(format!("failed reading response while {context}: {error}")))?;
    parse_envelope(&body, context)
}

pub fn parse_envelope(body: &str, context: &str) -> Result<serde_json::Value, InfraError> {
    let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|error| {
        InfraError::Transport(format!(
            "non-JSON response while {context}: {error}; body={}",
            snippet(body)
        ))
    })?;
    check_envelope(parsed)
}

pub fn check_envelope(payload: serde_json::Value) -> Result<serde_json::Value, InfraError> {
    let success = payload
        .get("success")
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| InfraError::MalformedResponse("response has no success flag".to_string()))?;
    if !success {
        let message = payload
            .get("error")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or("erro desconhecido");
        return Err(InfraError::Api(message.to_string()));
    }
    Ok(payload)
}

fn mutation_ack(payload: &serde_json::Value) -> MutationAck {
    MutationAck {
        message: payload
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned),
        appointment_id: payload.get("appointment_id").and_then(wire_id_text),
    }
}

fn wire_id_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn patient_fields(draft: &PatientDraft) -> Vec<(&'static str, String)> {
    vec![
        ("first_name", draft.first_name.trim().to_string()),
        ("last_name", draft.last_name.trim().to_string()),
        ("email", draft.email.clone().unwrap_or_default()),
        ("phone", draft.phone.clone().unwrap_or_default()),
        (
            "date_of_birth",
            draft
                .date_of_birth
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        ),
        ("gender", draft.gender.clone().unwrap_or_default()),
    ]
}

fn draft_fields(draft: &AppointmentDraft) -> Vec<(&'static str, String)> {
    vec![
        ("patient", draft.patient_id.clone().unwrap_or_default()),
        ("doctor", draft.doctor_id.clone().unwrap_or_default()),
        ("appointment_date", draft.date.format("%Y-%m-%d").to_string()),
        ("appointment_time", draft.time.format("%H:%M").to_string()),
        ("duration_minutes", draft.duration_minutes.to_string()),
        ("appointment_type", draft.appointment_type.code().to_string()),
        ("payment_type", draft.payment_type.code().to_string()),
        ("status", draft.status.code().to_string()),
        ("reason", draft.reason.clone().unwrap_or_default()),
        ("notes", draft.notes.clone().unwrap_or_default()),
        ("location", draft.location.clone().unwrap_or_default()),
    ]
}

fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}
