use crate::domain::models::CalendarEvent;
use chrono::DateTime;
use chrono_tz::Tz;

/// Events that a candidate placement `[start, end)` would collide with.
///
/// Only events on the candidate's local calendar day are considered; intervals
/// that merely touch do not overlap. The check is advisory: callers revert the
/// gesture on a non-empty result and never partially accept it.
pub fn find_conflicts<'a>(
    candidate_id: &str,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    events: &'a [CalendarEvent],
) -> Vec<&'a CalendarEvent> {
    let day = start.date_naive();
    events
        .iter()
        .filter(|event| event.id != candidate_id)
        .filter(|event| event.start.date_naive() == day)
        .filter(|event| overlaps(start, end, event.start, event.end))
        .collect()
}

pub fn has_conflict(
    candidate_id: &str,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    events: &[CalendarEvent],
) -> bool {
    !find_conflicts(candidate_id, start, end, events).is_empty()
}

pub fn overlaps(
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    other_start: DateTime<Tz>,
    other_end: DateTime<Tz>,
) -> bool {
    start < other_end && end > other_start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EventKind, ExtendedProps};
    use chrono::{Duration, NaiveDate, TimeZone};
    use chrono_tz::America::Sao_Paulo;
    use proptest::prelude::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        let naive = NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid datetime");
        Sao_Paulo
            .from_local_datetime(&naive)
            .single()
            .expect("unambiguous local time")
    }

    fn event(id: &str, start: DateTime<Tz>, end: DateTime<Tz>) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: id.to_string(),
            start,
            end,
            color: "#007bff".to_string(),
            kind: EventKind::Appointment,
            extended: ExtendedProps::default(),
        }
    }

    #[test]
    fn overlapping_event_on_same_day_conflicts() {
        let events = vec![
            event("1", at(15, 9, 0), at(15, 9, 30)),
            event("2", at(15, 10, 0), at(15, 10, 30)),
        ];
        let conflicts = find_conflicts("1", at(15, 9, 0), at(15, 10, 15), &events);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, "2");
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        let events = vec![event("2", at(15, 10, 0), at(15, 10, 30))];
        assert!(!has_conflict("1", at(15, 9, 30), at(15, 10, 0), &events));
        assert!(!has_conflict("1", at(15, 10, 30), at(15, 11, 0), &events));
    }

    #[test]
    fn candidate_never_conflicts_with_itself() {
        let events = vec![event("1", at(15, 9, 0), at(15, 10, 0))];
        assert!(!has_conflict("1", at(15, 9, 15), at(15, 9, 45), &events));
    }

    #[test]
    fn events_on_other_days_are_ignored() {
        let events = vec![event("2", at(16, 9, 0), at(16, 10, 0))];
        assert!(!has_conflict("1", at(15, 9, 0), at(15, 10, 0), &events));
    }

    #[test]
    fn containing_interval_conflicts() {
        let events = vec![event("2", at(15, 9, 15), at(15, 9, 30))];
        assert!(has_conflict("1", at(15, 9, 0), at(15, 10, 0), &events));
    }

    // Feature: clinic-agenda, Property 1: overlap is flagged iff half-open intervals intersect
    proptest! {
        #[test]
        fn flags_overlap_iff_half_open_intervals_intersect(
            s1 in 0i64..600,
            len1 in 1i64..240,
            s2 in 0i64..600,
            len2 in 1i64..240
        ) {
            let base = at(15, 6, 0);
            let (start1, end1) = (base + Duration::minutes(s1), base + Duration::minutes(s1 + len1));
            let (start2, end2) = (base + Duration::minutes(s2), base + Duration::minutes(s2 + len2));
            let events = vec![event("other", start2, end2)];

            let expected = s1 < s2 + len2 && s1 + len1 > s2;
            prop_assert_eq!(has_conflict("candidate", start1, end1, &events), expected);
        }
    }
}
