use crate::domain::models::CalendarEvent;
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub trait EventStore: Send + Sync {
    fn get_by_id(&self, event_id: &str) -> Result<Option<CalendarEvent>, InfraError>;
    fn replace_all(&self, events: Vec<CalendarEvent>) -> Result<(), InfraError>;
    fn upsert(&self, event: &CalendarEvent) -> Result<(), InfraError>;
    fn list_all(&self) -> Result<Vec<CalendarEvent>, InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Mutex<HashMap<String, CalendarEvent>>,
}

impl InMemoryEventStore {
    fn normalized_id(event_id: &str) -> Option<String> {
        let normalized = event_id.trim();
        if normalized.is_empty() {
            return None;
        }
        Some(normalized.to_string())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CalendarEvent>>, InfraError> {
        self.events
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("event store lock poisoned: {error}")))
    }
}

impl EventStore for InMemoryEventStore {
    fn get_by_id(&self, event_id: &str) -> Result<Option<CalendarEvent>, InfraError> {
        let Some(event_id) = Self::normalized_id(event_id) else {
            return Ok(None);
        };
        Ok(self.lock()?.get(&event_id).cloned())
    }

    fn replace_all(&self, events: Vec<CalendarEvent>) -> Result<(), InfraError> {
        let mut stored = self.lock()?;
        stored.clear();
        for event in events {
            if let Some(event_id) = Self::normalized_id(&event.id) {
                stored.insert(event_id, event);
            }
        }
        Ok(())
    }

    fn upsert(&self, event: &CalendarEvent) -> Result<(), InfraError> {
        let event_id = Self::normalized_id(&event.id)
            .ok_or_else(|| InfraError::InvalidRecord("event id is required for upsert".to_string()))?;
        self.lock()?.insert(event_id, event.clone());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<CalendarEvent>, InfraError> {
        let mut events: Vec<CalendarEvent> = self.lock()?.values().cloned().collect();
        events.sort_by(|left, right| left.start.cmp(&right.start).then_with(|| left.id.cmp(&right.id)));
        Ok(events)
    }
}
