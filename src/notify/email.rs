use async_trait::async_trait;
use serde::Serialize;

use super::{post_json, Notice, Notifier, NotifyError, SalonProfile};

/// Plain-text message handed to the email relay, which owns templating and delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl EmailMessage {
    pub fn compose(notice: &Notice, salon: &SalonProfile) -> Self {
        let d = notice.details();
        let (subject, opening) = match notice {
            Notice::Booked(_) => (
                format!("Booking Confirmation - {}", salon.name),
                "Thank you for booking with us! Your appointment request has been received.",
            ),
            Notice::Cancelled(_) => (
                format!("Appointment Cancelled - {}", salon.name),
                "Your appointment has been cancelled. We hope to see you another time.",
            ),
            Notice::Rescheduled { .. } => (
                format!("Appointment Rescheduled - {}", salon.name),
                "Your appointment has been moved to a new date and time.",
            ),
        };

        let mut text = format!(
            "Hi {name},\n\n{opening}\n\nBooking ID: #{id}\nService: {service}\nDate: {date}\nTime: {time}\n",
            name = d.name,
            id = d.appointment_id,
            service = d.service,
            date = d.appointment_date.format("%A, %B %-d, %Y"),
            time = d.appointment_time,
        );
        if let Notice::Rescheduled { previous_date, previous_time, .. } = notice {
            text.push_str(&format!("Previously: {previous_date} {previous_time}\n"));
        }
        text.push_str(&format!("\n{}\n{}\n", salon.name, salon.location));

        Self {
            to: d.email.clone(),
            subject,
            text,
        }
    }
}

/// Sends composed messages to an HTTP email relay.
pub struct EmailRelay {
    client: reqwest::Client,
    url: String,
    salon: SalonProfile,
}

impl EmailRelay {
    pub fn new(client: reqwest::Client, url: String, salon: SalonProfile) -> Self {
        Self { client, url, salon }
    }
}

#[async_trait]
impl Notifier for EmailRelay {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        let message = EmailMessage::compose(notice, &self.salon);
        post_json(&self.client, &self.url, &message).await
    }
}
