//! Fire-and-forget notification dispatch.
//!
//! The engine enqueues a [`Notice`] after a booking, cancellation or
//! reschedule has been committed. A single background task fans each notice
//! out to the configured [`Notifier`]s under a timeout. Nothing here can fail
//! or delay the operation that produced the notice.

mod calendar;
mod email;

pub use calendar::{CalendarAction, CalendarEvent, CalendarRelay};
pub use email::{EmailMessage, EmailRelay};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::model::{Appointment, Id};
use crate::slots::SlotTime;

/// Appointment fields carried to notifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentDetails {
    pub appointment_id: Id,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: SlotTime,
    pub service: String,
    pub message: String,
}

impl From<&Appointment> for AppointmentDetails {
    fn from(a: &Appointment) -> Self {
        Self {
            appointment_id: a.id,
            name: a.name.clone(),
            email: a.email.clone(),
            phone: a.phone.clone(),
            appointment_date: a.appointment_date,
            appointment_time: a.appointment_time,
            service: a.service.clone(),
            message: a.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Booked(AppointmentDetails),
    Cancelled(AppointmentDetails),
    Rescheduled {
        #[serde(flatten)]
        details: AppointmentDetails,
        previous_date: NaiveDate,
        previous_time: SlotTime,
    },
}

impl Notice {
    pub fn kind(&self) -> &'static str {
        match self {
            Notice::Booked(_) => "booked",
            Notice::Cancelled(_) => "cancelled",
            Notice::Rescheduled { .. } => "rescheduled",
        }
    }

    pub fn details(&self) -> &AppointmentDetails {
        match self {
            Notice::Booked(d) | Notice::Cancelled(d) => d,
            Notice::Rescheduled { details, .. } => details,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay responded with status {0}")]
    Status(u16),
    #[error("{0}")]
    Rejected(String),
}

/// A side-effect sink for appointment notices (email, calendar, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Salon details quoted in outgoing emails and calendar entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalonProfile {
    pub name: String,
    pub location: String,
}

/// Writes one structured log line per notice. Always installed.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        let d = notice.details();
        tracing::info!(
            kind = notice.kind(),
            appointment_id = d.appointment_id,
            date = %d.appointment_date,
            time = %d.appointment_time,
            service = %d.service,
            "appointment notice"
        );
        Ok(())
    }
}

/// POST `body` as JSON to a relay endpoint; any non-2xx is an error.
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &T,
) -> Result<(), NotifyError> {
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(NotifyError::Status(status.as_u16()))
    }
}

enum Envelope {
    Notice(Notice),
    /// Acknowledged once every envelope queued before it was dispatched.
    Flush(oneshot::Sender<()>),
}

/// Bounded queue in front of the dispatcher task.
pub struct NotifyHub {
    tx: mpsc::Sender<Envelope>,
}

impl NotifyHub {
    /// Spawn the dispatcher. Must be called inside a tokio runtime.
    pub fn start(notifiers: Vec<Arc<dyn Notifier>>, timeout: Duration, capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_dispatcher(rx, notifiers, timeout));
        Arc::new(Self { tx })
    }

    /// Enqueue a notice. Never blocks; a full queue drops the notice.
    pub fn send(&self, notice: Notice) {
        let kind = notice.kind();
        let id = notice.details().appointment_id;
        if let Err(e) = self.tx.try_send(Envelope::Notice(notice)) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "dispatcher stopped",
            };
            tracing::warn!(kind, appointment_id = id, reason, "dropping appointment notice");
            metrics::counter!(crate::observability::NOTIFICATIONS_DROPPED_TOTAL).increment(1);
        }
    }

    /// Wait until everything queued so far has been dispatched, up to `wait`.
    /// Returns false on timeout.
    pub async fn flush(&self, wait: Duration) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        let drained = async {
            self.tx.send(Envelope::Flush(ack_tx)).await.is_ok() && ack_rx.await.is_ok()
        };
        tokio::time::timeout(wait, drained).await.unwrap_or(false)
    }
}

async fn run_dispatcher(
    mut rx: mpsc::Receiver<Envelope>,
    notifiers: Vec<Arc<dyn Notifier>>,
    timeout: Duration,
) {
    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Notice(notice) => dispatch(&notifiers, &notice, timeout).await,
            Envelope::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

async fn dispatch(notifiers: &[Arc<dyn Notifier>], notice: &Notice, timeout: Duration) {
    let id = notice.details().appointment_id;
    let kind = notice.kind();
    let calls = notifiers.iter().map(|n| async move {
        let outcome = match tokio::time::timeout(timeout, n.notify(notice)).await {
            Ok(Ok(())) => {
                tracing::debug!(notifier = n.name(), kind, appointment_id = id, "notice delivered");
                "ok"
            }
            Ok(Err(e)) => {
                tracing::warn!(notifier = n.name(), kind, appointment_id = id, error = %e, "notice failed");
                "failed"
            }
            Err(_) => {
                tracing::warn!(notifier = n.name(), kind, appointment_id = id, ?timeout, "notice timed out");
                "timeout"
            }
        };
        metrics::counter!(
            crate::observability::NOTIFICATIONS_TOTAL,
            "notifier" => n.name(),
            "kind" => kind,
            "outcome" => outcome
        )
        .increment(1);
    });
    futures::future::join_all(calls).await;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Forwards every notice it receives to a channel.
    pub struct Recorder {
        tx: mpsc::UnboundedSender<Notice>,
    }

    impl Recorder {
        pub fn new() -> (Arc<dyn Notifier>, mpsc::UnboundedReceiver<Notice>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let recorder: Arc<dyn Notifier> = Arc::new(Self { tx });
            (recorder, rx)
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
            let _ = self.tx.send(notice.clone());
            Ok(())
        }
    }

    /// Always fails.
    pub struct Broken;

    #[async_trait]
    impl Notifier for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn notify(&self, _notice: &Notice) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected("provider unavailable".into()))
        }
    }

    /// Never completes within any reasonable timeout.
    pub struct Stalled;

    #[async_trait]
    impl Notifier for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn notify(&self, _notice: &Notice) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    pub fn details(id: Id) -> AppointmentDetails {
        AppointmentDetails {
            appointment_id: id,
            name: "Maya".into(),
            email: "maya@example.com".into(),
            phone: "555-0101".into(),
            appointment_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            appointment_time: "09:00".parse().unwrap(),
            service: "Gel Manicure".into(),
            message: String::new(),
        }
    }
}
