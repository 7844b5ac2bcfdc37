use chrono::Utc;
use tokio::sync::oneshot;

use crate::limits::*;
use crate::model::*;
use crate::notify::Notice;
use crate::observability::BOOKINGS_TOTAL;

use super::conflict::{check_slot_free, validate_draft, validate_schedule};
use super::{Engine, EngineError, Entity, WalCommand};

impl Engine {
    /// Book a slot. The conflict check and the insert happen under one date
    /// lock, so of two concurrent requests for the same slot exactly one wins.
    pub async fn book(&self, draft: AppointmentDraft) -> Result<Appointment, EngineError> {
        let result = self.book_inner(&draft).await;
        let outcome = match &result {
            Ok(_) => "booked",
            Err(EngineError::SlotConflict { .. }) => "conflict",
            Err(EngineError::WalError(_)) => "error",
            Err(_) => "invalid",
        };
        metrics::counter!(BOOKINGS_TOTAL, "outcome" => outcome).increment(1);

        let appointment = result?;
        tracing::info!(
            appointment_id = appointment.id,
            date = %appointment.appointment_date,
            time = %appointment.appointment_time,
            service = %appointment.service,
            "appointment booked"
        );
        self.notify.send(Notice::Booked((&appointment).into()));
        Ok(appointment)
    }

    async fn book_inner(&self, draft: &AppointmentDraft) -> Result<Appointment, EngineError> {
        let valid = validate_draft(draft, &self.grid)?;
        if self.appointment_day.len() >= MAX_APPOINTMENTS {
            return Err(EngineError::LimitExceeded("too many appointments"));
        }

        let _gate = self.write_gate.read().await;
        let day = self.day_or_create(valid.date);
        let mut guard = day.write().await;
        check_slot_free(&guard, valid.time, None)?;

        let appointment = Appointment {
            id: self.seq.next_appointment(),
            name: valid.name,
            email: valid.email,
            phone: valid.phone,
            appointment_date: valid.date,
            appointment_time: valid.time,
            service: valid.service,
            message: valid.message,
            status: AppointmentStatus::Pending,
            created_at: Utc::now(),
        };
        let event = Event::AppointmentBooked {
            appointment: appointment.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(appointment)
    }

    /// Administrative status change. Any status may follow any other, but
    /// leaving `cancelled` re-claims the slot and fails if it was taken.
    pub async fn set_status(&self, id: Id, status: &str) -> Result<Appointment, EngineError> {
        let status: AppointmentStatus = status.parse().map_err(EngineError::InvalidStatus)?;
        let _gate = self.write_gate.read().await;
        let mut guard = self.resolve_appointment_write(id).await?;
        let current = guard
            .get(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?;

        if current.status == status {
            return Ok(current);
        }
        if !current.status.occupies_slot() && status.occupies_slot() {
            check_slot_free(&guard, current.appointment_time, Some(id))?;
        }
        if current.status.is_terminal() {
            tracing::warn!(
                appointment_id = id,
                from = %current.status,
                to = %status,
                "status changed out of a terminal state"
            );
        }

        let event = Event::AppointmentStatusChanged { id, status };
        self.persist_and_apply(&mut guard, &event).await?;
        tracing::info!(appointment_id = id, from = %current.status, to = %status, "status updated");

        Ok(Appointment { status, ..current })
    }

    /// Move an appointment to another slot, keeping its status.
    pub async fn reschedule(&self, id: Id, draft: ScheduleDraft) -> Result<Appointment, EngineError> {
        let (date, time) = validate_schedule(&draft, &self.grid)?;
        let gate = self.write_gate.read().await;

        let (previous, updated) = loop {
            let from = self
                .appointment_date(id)
                .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
            let source = self
                .get_day(from)
                .ok_or(EngineError::NotFound(Entity::Appointment, id))?;

            if from == date {
                let mut guard = source.write().await;
                let Some(previous) = guard.get(id).cloned() else { continue };
                check_slot_free(&guard, time, Some(id))?;
                warn_if_terminal(&previous);

                let event = Event::AppointmentRescheduled { id, date, time };
                self.persist_and_apply(&mut guard, &event).await?;
                let updated = guard
                    .get(id)
                    .cloned()
                    .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
                break (previous, updated);
            }

            // Two partitions: lock in ascending date order.
            let target = self.day_or_create(date);
            let (mut from_guard, mut to_guard) = if from < date {
                let f = source.write().await;
                let t = target.write().await;
                (f, t)
            } else {
                let t = target.write().await;
                let f = source.write().await;
                (f, t)
            };
            let Some(previous) = from_guard.get(id).cloned() else { continue };
            check_slot_free(&to_guard, time, Some(id))?;
            warn_if_terminal(&previous);

            self.persist_and_move(&mut from_guard, &mut to_guard, id, time).await?;
            let updated = to_guard
                .get(id)
                .cloned()
                .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
            break (previous, updated);
        };
        drop(gate);

        tracing::info!(
            appointment_id = id,
            from_date = %previous.appointment_date,
            from_time = %previous.appointment_time,
            to_date = %date,
            to_time = %time,
            "appointment rescheduled"
        );
        self.notify.send(Notice::Rescheduled {
            details: (&updated).into(),
            previous_date: previous.appointment_date,
            previous_time: previous.appointment_time,
        });
        Ok(updated)
    }

    /// Cancel an appointment, releasing its slot. Cancelling twice is a no-op.
    pub async fn cancel(&self, id: Id) -> Result<Appointment, EngineError> {
        let gate = self.write_gate.read().await;
        let mut guard = self.resolve_appointment_write(id).await?;
        let current = guard
            .get(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
        if current.status == AppointmentStatus::Cancelled {
            return Ok(current);
        }

        let event = Event::AppointmentStatusChanged {
            id,
            status: AppointmentStatus::Cancelled,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);
        drop(gate);

        let cancelled = Appointment {
            status: AppointmentStatus::Cancelled,
            ..current
        };
        tracing::info!(appointment_id = id, "appointment cancelled");
        self.notify.send(Notice::Cancelled((&cancelled).into()));
        Ok(cancelled)
    }

    /// Hard delete. No notice is sent.
    pub async fn remove(&self, id: Id) -> Result<(), EngineError> {
        let _gate = self.write_gate.read().await;
        let mut guard = self.resolve_appointment_write(id).await?;
        let event = Event::AppointmentDeleted { id };
        self.persist_and_apply(&mut guard, &event).await?;
        tracing::info!(appointment_id = id, "appointment deleted");
        Ok(())
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    ///
    /// Holds the write gate exclusively, so no write can land between the
    /// snapshot and the swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.write_gate.write().await;

        let mut dates: Vec<_> = self.days.iter().map(|e| (*e.key(), e.value().clone())).collect();
        dates.sort_by_key(|(date, _)| *date);
        let mut guards = Vec::with_capacity(dates.len());
        for (_, day) in &dates {
            guards.push(day.read().await);
        }

        let mut events = vec![self.seq.reservation()];

        let mut services: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        services.sort_by_key(|s| s.id);
        events.extend(services.into_iter().map(|service| Event::ServiceCreated { service }));

        let mut gallery: Vec<GalleryItem> = self.gallery.iter().map(|e| e.value().clone()).collect();
        gallery.sort_by_key(|g| g.id);
        events.extend(gallery.into_iter().map(|item| Event::GalleryItemCreated { item }));

        for guard in &guards {
            for appointment in &guard.appointments {
                events.push(Event::AppointmentBooked {
                    appointment: appointment.clone(),
                });
            }
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Final compaction at shutdown.
    pub async fn close(&self) -> Result<(), EngineError> {
        if self.wal_appends_since_compact().await > 0 {
            self.compact_wal().await?;
        }
        tracing::info!("appointment book closed");
        Ok(())
    }
}

fn warn_if_terminal(appointment: &Appointment) {
    if appointment.status.is_terminal() {
        tracing::warn!(
            appointment_id = appointment.id,
            status = %appointment.status,
            "rescheduling an appointment in a terminal state"
        );
    }
}
