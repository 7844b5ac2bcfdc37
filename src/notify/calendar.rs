use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use super::{post_json, Notice, Notifier, NotifyError, SalonProfile};
use crate::model::Id;

/// Every appointment blocks one hour on the salon calendar.
const EVENT_LENGTH_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarAction {
    Create,
    Update,
    Cancel,
}

/// Calendar entry handed to the relay. The relay keys events by
/// `appointment_id`, so an update or cancel finds the entry made at booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub appointment_id: Id,
    pub action: CalendarAction,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub time_zone: String,
}

impl CalendarEvent {
    pub fn build(notice: &Notice, salon: &SalonProfile, time_zone: &str) -> Self {
        let d = notice.details();
        let action = match notice {
            Notice::Booked(_) => CalendarAction::Create,
            Notice::Rescheduled { .. } => CalendarAction::Update,
            Notice::Cancelled(_) => CalendarAction::Cancel,
        };
        let start = d.appointment_date.and_time(d.appointment_time.to_naive_time());

        let mut description = format!(
            "Customer: {}\nEmail: {}\nPhone: {}\nService: {}\nBooking ID: {}",
            d.name, d.email, d.phone, d.service, d.appointment_id
        );
        if !d.message.is_empty() {
            description.push_str(&format!("\nNotes: {}", d.message));
        }

        Self {
            appointment_id: d.appointment_id,
            action,
            summary: format!("{} - {}", d.service, d.name),
            description,
            location: format!("{}, {}", salon.name, salon.location),
            start,
            end: start + Duration::minutes(EVENT_LENGTH_MINUTES),
            time_zone: time_zone.to_string(),
        }
    }
}

/// Mirrors appointments onto the salon calendar through an HTTP relay.
pub struct CalendarRelay {
    client: reqwest::Client,
    url: String,
    salon: SalonProfile,
    time_zone: String,
}

impl CalendarRelay {
    pub fn new(client: reqwest::Client, url: String, salon: SalonProfile, time_zone: String) -> Self {
        Self {
            client,
            url,
            salon,
            time_zone,
        }
    }
}

#[async_trait]
impl Notifier for CalendarRelay {
    fn name(&self) -> &'static str {
        "calendar"
    }

    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        let event = CalendarEvent::build(notice, &self.salon, &self.time_zone);
        post_json(&self.client, &self.url, &event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::details;
    use chrono::NaiveDate;

    fn salon() -> SalonProfile {
        SalonProfile {
            name: "Glam Tips Nail Salon".into(),
            location: "123 Beauty Street, Glamour City".into(),
        }
    }

    #[test]
    fn booking_creates_one_hour_event() {
        let event = CalendarEvent::build(&Notice::Booked(details(8)), &salon(), "America/New_York");
        assert_eq!(event.action, CalendarAction::Create);
        assert_eq!(event.summary, "Gel Manicure - Maya");
        assert_eq!(event.location, "Glam Tips Nail Salon, 123 Beauty Street, Glamour City");
        assert_eq!(event.start.to_string(), "2025-06-01 09:00:00");
        assert_eq!(event.end.to_string(), "2025-06-01 10:00:00");
        assert!(event.description.contains("Booking ID: 8"));
        assert!(!event.description.contains("Notes:"));
    }

    #[test]
    fn reschedule_updates_at_new_time() {
        let mut d = details(8);
        d.appointment_date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        d.appointment_time = "17:30".parse().unwrap();
        d.message = "Short nails please".into();
        let notice = Notice::Rescheduled {
            details: d,
            previous_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            previous_time: "09:00".parse().unwrap(),
        };
        let event = CalendarEvent::build(&notice, &salon(), "Europe/London");
        assert_eq!(event.action, CalendarAction::Update);
        assert_eq!(event.end.to_string(), "2025-06-03 18:30:00");
        assert_eq!(event.time_zone, "Europe/London");
        assert!(event.description.ends_with("Notes: Short nails please"));
    }

    #[test]
    fn serialized_action_is_lowercase() {
        let event = CalendarEvent::build(&Notice::Cancelled(details(2)), &salon(), "UTC");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "cancel");
        assert_eq!(json["start"], "2025-06-01T09:00:00");
    }
}
