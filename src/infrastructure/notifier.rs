use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn error_with_detail(prefix: &str, detail: Option<&str>) -> Self {
        match detail.map(str::trim).filter(|detail| !detail.is_empty()) {
            Some(detail) => Self::error(format!("{prefix}: {detail}")),
            None => Self::error(prefix),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                tracing::info!(target: "clinic_agenda::notify", message = %notification.message)
            }
            NotificationLevel::Error => {
                tracing::warn!(target: "clinic_agenda::notify", message = %notification.message)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn take(&self) -> Vec<Notification> {
        match self.received.lock() {
            Ok(mut received) => std::mem::take(&mut *received),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        match self.received.lock() {
            Ok(mut received) => received.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_is_appended_after_colon() {
        let notification =
            Notification::error_with_detail("Erro ao atualizar consulta", Some("conflito"));
        assert_eq!(notification.message, "Erro ao atualizar consulta: conflito");
        assert_eq!(notification.level, NotificationLevel::Error);
    }

    #[test]
    fn blank_detail_keeps_prefix_only() {
        let notification = Notification::error_with_detail("Erro ao atualizar duração", Some("  "));
        assert_eq!(notification.message, "Erro ao atualizar duração");
    }

    #[test]
    fn recording_notifier_drains_on_take() {
        let notifier = RecordingNotifier::default();
        notifier.notify(Notification::success("ok"));
        assert_eq!(notifier.take(), vec![Notification::success("ok")]);
        assert!(notifier.take().is_empty());
    }
}
