mod availability;
mod catalog;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::available_slots;
pub use error::{EngineError, Entity};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

use crate::model::*;
use crate::notify::NotifyHub;
use crate::slots::{SlotGrid, SlotTime};
use crate::wal::Wal;

pub type SharedDay = Arc<RwLock<DayState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders with the batch result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
    tracing::debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!(error = %e, events = batch.len(), "WAL group commit failed");
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

/// Commit a batch all-or-nothing. On any failure the batch is rolled back
/// off the log, so a caller that sees an error knows the event is not there.
fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let checkpoint = wal.checkpoint()?;
    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if result.is_err() {
        if let Err(e) = wal.rollback(checkpoint) {
            tracing::error!(error = %e, "WAL rollback failed, refusing further appends");
        }
    }
    result
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            if result.is_ok() {
                metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
            }
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

/// Next-id counters. Ids are never handed out twice, including across
/// restarts and compactions.
pub(super) struct Sequences {
    appointments: AtomicU64,
    services: AtomicU64,
    gallery: AtomicU64,
}

impl Sequences {
    fn new() -> Self {
        Self {
            appointments: AtomicU64::new(1),
            services: AtomicU64::new(1),
            gallery: AtomicU64::new(1),
        }
    }

    pub(super) fn next_appointment(&self) -> Id {
        self.appointments.fetch_add(1, Ordering::Relaxed)
    }

    pub(super) fn next_service(&self) -> Id {
        self.services.fetch_add(1, Ordering::Relaxed)
    }

    pub(super) fn next_gallery(&self) -> Id {
        self.gallery.fetch_add(1, Ordering::Relaxed)
    }

    /// Advance counters past any id an event carries.
    fn observe(&self, event: &Event) {
        match event {
            Event::AppointmentBooked { appointment } => {
                self.appointments.fetch_max(appointment.id + 1, Ordering::Relaxed);
            }
            Event::ServiceCreated { service } => {
                self.services.fetch_max(service.id + 1, Ordering::Relaxed);
            }
            Event::GalleryItemCreated { item } => {
                self.gallery.fetch_max(item.id + 1, Ordering::Relaxed);
            }
            Event::SequencesReserved {
                next_appointment_id,
                next_service_id,
                next_gallery_id,
            } => {
                self.appointments.fetch_max(*next_appointment_id, Ordering::Relaxed);
                self.services.fetch_max(*next_service_id, Ordering::Relaxed);
                self.gallery.fetch_max(*next_gallery_id, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub(super) fn reservation(&self) -> Event {
        Event::SequencesReserved {
            next_appointment_id: self.appointments.load(Ordering::Relaxed),
            next_service_id: self.services.load(Ordering::Relaxed),
            next_gallery_id: self.gallery.load(Ordering::Relaxed),
        }
    }
}

/// The appointment book and catalog.
///
/// Appointments are partitioned by calendar date. Every write to a date holds
/// that date's write lock from the conflict check through the WAL append to
/// the in-memory apply, so two bookings can never both claim one slot.
pub struct Engine {
    pub(super) days: DashMap<NaiveDate, SharedDay>,
    /// Reverse lookup: appointment id → the date partition holding it.
    pub(super) appointment_day: DashMap<Id, NaiveDate>,
    pub(super) services: DashMap<Id, Service>,
    pub(super) gallery: DashMap<Id, GalleryItem>,
    /// Serializes catalog writes so the size limit and WAL order hold.
    pub(super) catalog_lock: Mutex<()>,
    /// Held shared by every write and exclusively by compaction, so no event
    /// can reach the old log after the snapshot was taken.
    pub(super) write_gate: RwLock<()>,
    pub(super) seq: Sequences,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub grid: SlotGrid,
    pub notify: Arc<NotifyHub>,
}

/// Apply an appointment event to its date partition (caller holds the lock).
/// Cross-date reschedules go through [`move_appointment`] instead.
fn apply_to_day(day: &mut DayState, event: &Event, index: &DashMap<Id, NaiveDate>) {
    match event {
        Event::AppointmentBooked { appointment } => {
            index.insert(appointment.id, day.date);
            day.insert_appointment(appointment.clone());
        }
        Event::AppointmentStatusChanged { id, status } => {
            if let Some(appt) = day.get_mut(*id) {
                appt.status = *status;
            }
        }
        Event::AppointmentRescheduled { id, date, time } if *date == day.date => {
            if let Some(mut appt) = day.remove_appointment(*id) {
                appt.appointment_time = *time;
                day.insert_appointment(appt);
            }
        }
        Event::AppointmentDeleted { id } => {
            day.remove_appointment(*id);
            index.remove(id);
        }
        _ => {}
    }
}

fn move_appointment(
    from: &mut DayState,
    to: &mut DayState,
    id: Id,
    time: SlotTime,
    index: &DashMap<Id, NaiveDate>,
) {
    if let Some(mut appt) = from.remove_appointment(id) {
        appt.appointment_date = to.date;
        appt.appointment_time = time;
        index.insert(id, to.date);
        to.insert_appointment(appt);
    }
}

fn apply_to_catalog(
    services: &DashMap<Id, Service>,
    gallery: &DashMap<Id, GalleryItem>,
    event: &Event,
) {
    match event {
        Event::ServiceCreated { service } | Event::ServiceUpdated { service } => {
            services.insert(service.id, service.clone());
        }
        Event::ServiceDeleted { id } => {
            services.remove(id);
        }
        Event::GalleryItemCreated { item } | Event::GalleryItemUpdated { item } => {
            gallery.insert(item.id, item.clone());
        }
        Event::GalleryItemDeleted { id } => {
            gallery.remove(id);
        }
        _ => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, grid: SlotGrid, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            days: DashMap::new(),
            appointment_day: DashMap::new(),
            services: DashMap::new(),
            gallery: DashMap::new(),
            catalog_lock: Mutex::new(()),
            write_gate: RwLock::new(()),
            seq: Sequences::new(),
            wal_tx,
            grid,
            notify,
        };

        // Replay into plain maps; nothing else can see these partitions yet.
        let mut days: HashMap<NaiveDate, DayState> = HashMap::new();
        for event in &events {
            engine.seq.observe(event);
            match event {
                Event::AppointmentBooked { appointment } => {
                    let date = appointment.appointment_date;
                    let day = days.entry(date).or_insert_with(|| DayState::new(date));
                    apply_to_day(day, event, &engine.appointment_day);
                }
                Event::AppointmentRescheduled { id, date, time } => {
                    let Some(from) = engine.appointment_date(*id) else { continue };
                    if from == *date {
                        if let Some(day) = days.get_mut(&from) {
                            apply_to_day(day, event, &engine.appointment_day);
                        }
                    } else if let Some(mut source) = days.remove(&from) {
                        let target = days.entry(*date).or_insert_with(|| DayState::new(*date));
                        move_appointment(&mut source, target, *id, *time, &engine.appointment_day);
                        days.insert(from, source);
                    }
                }
                Event::AppointmentStatusChanged { id, .. } | Event::AppointmentDeleted { id } => {
                    if let Some(day) = engine
                        .appointment_date(*id)
                        .and_then(|date| days.get_mut(&date))
                    {
                        apply_to_day(day, event, &engine.appointment_day);
                    }
                }
                other => apply_to_catalog(&engine.services, &engine.gallery, other),
            }
        }
        for (date, day) in days {
            engine.days.insert(date, Arc::new(RwLock::new(day)));
        }

        tracing::info!(
            path = %wal_path.display(),
            events = events.len(),
            appointments = engine.appointment_day.len(),
            services = engine.services.len(),
            gallery = engine.gallery.len(),
            "appointment book loaded"
        );
        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub(super) fn get_day(&self, date: NaiveDate) -> Option<SharedDay> {
        self.days.get(&date).map(|e| e.value().clone())
    }

    pub(super) fn day_or_create(&self, date: NaiveDate) -> SharedDay {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DayState::new(date))))
            .value()
            .clone()
    }

    pub(super) fn appointment_date(&self, id: Id) -> Option<NaiveDate> {
        self.appointment_day.get(&id).map(|e| *e.value())
    }

    /// WAL-append then apply, under the caller's day lock.
    pub(super) async fn persist_and_apply(
        &self,
        day: &mut DayState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_day(day, event, &self.appointment_day);
        Ok(())
    }

    pub(super) async fn persist_and_move(
        &self,
        from: &mut DayState,
        to: &mut DayState,
        id: Id,
        time: SlotTime,
    ) -> Result<(), EngineError> {
        let event = Event::AppointmentRescheduled { id, date: to.date, time };
        self.wal_append(&event).await?;
        move_appointment(from, to, id, time, &self.appointment_day);
        Ok(())
    }

    pub(super) async fn persist_catalog(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_catalog(&self.services, &self.gallery, event);
        Ok(())
    }

    /// Locate an appointment's partition and take its write lock.
    ///
    /// A concurrent reschedule can move the appointment between the index
    /// lookup and the lock, so the result is re-checked under the lock.
    pub(super) async fn resolve_appointment_write(
        &self,
        id: Id,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<DayState>, EngineError> {
        loop {
            let date = self
                .appointment_date(id)
                .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
            let Some(day) = self.get_day(date) else {
                return Err(EngineError::NotFound(Entity::Appointment, id));
            };
            let guard = day.write_owned().await;
            if guard.get(id).is_some() {
                return Ok(guard);
            }
            if self.appointment_date(id) == Some(date) {
                return Err(EngineError::NotFound(Entity::Appointment, id));
            }
        }
    }
}
