use chrono::NaiveDate;

use crate::model::*;
use crate::slots::SlotTime;

use super::availability::available_slots;
use super::conflict::parse_date;
use super::{Engine, EngineError, Entity, SharedDay};

impl Engine {
    pub async fn get_appointment(&self, id: Id) -> Result<Appointment, EngineError> {
        loop {
            let date = self
                .appointment_date(id)
                .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
            let day = self
                .get_day(date)
                .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
            let guard = day.read().await;
            if let Some(appt) = guard.get(id) {
                return Ok(appt.clone());
            }
            // Moved by a concurrent reschedule: retry against the new partition.
            if self.appointment_date(id) == Some(date) {
                return Err(EngineError::NotFound(Entity::Appointment, id));
            }
        }
    }

    /// Every appointment, most recent date and time first.
    pub async fn list_appointments(&self) -> Vec<Appointment> {
        self.collect_appointments(|_| true).await
    }

    /// A customer's appointments by exact email match, most recent first.
    pub async fn appointments_for_customer(&self, email: &str) -> Vec<Appointment> {
        self.collect_appointments(|a| a.email == email).await
    }

    /// Snapshot across all partitions.
    ///
    /// Read locks are taken in ascending date order, the order cross-date
    /// reschedules lock in, and held together, so a moving appointment is
    /// seen exactly once. Partitions are never removed; if one was created
    /// while locking, a reschedule may have moved into it and the snapshot
    /// is retaken.
    async fn collect_appointments(&self, keep: impl Fn(&Appointment) -> bool) -> Vec<Appointment> {
        loop {
            let mut days: Vec<(NaiveDate, SharedDay)> =
                self.days.iter().map(|e| (*e.key(), e.value().clone())).collect();
            days.sort_by_key(|(date, _)| *date);

            let mut guards = Vec::with_capacity(days.len());
            for (_, day) in &days {
                guards.push(day.read().await);
            }
            if self.days.len() != days.len() {
                continue;
            }

            let mut out: Vec<Appointment> = guards
                .iter()
                .flat_map(|g| g.appointments.iter())
                .filter(|a| keep(a))
                .cloned()
                .collect();
            out.sort_by_key(Appointment::recency_key);
            return out;
        }
    }

    /// Times held by non-cancelled appointments on `date`, ascending.
    pub async fn booked_times(&self, date: NaiveDate) -> Vec<SlotTime> {
        match self.get_day(date) {
            Some(day) => day.read().await.booked_times(),
            None => Vec::new(),
        }
    }

    pub async fn available_slots(&self, date: &str) -> Result<SlotAvailability, EngineError> {
        let date = parse_date(date)?;
        let booked = self.booked_times(date).await;
        Ok(available_slots(&self.grid, date, &booked))
    }

    pub fn appointment_count(&self) -> usize {
        self.appointment_day.len()
    }

    // ── Catalog reads ────────────────────────────────────────

    pub fn get_service(&self, id: Id) -> Result<Service, EngineError> {
        self.services
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(Entity::Service, id))
    }

    /// Services in id order.
    pub fn list_services(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        services.sort_by_key(|s| s.id);
        services
    }

    pub fn get_gallery_item(&self, id: Id) -> Result<GalleryItem, EngineError> {
        self.gallery
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(Entity::GalleryItem, id))
    }

    /// Gallery items newest first, optionally restricted to one category.
    pub fn list_gallery(&self, category: Option<&str>) -> Vec<GalleryItem> {
        let mut items: Vec<GalleryItem> = self
            .gallery
            .iter()
            .filter(|e| category.is_none_or(|c| e.value().category == c))
            .map(|e| e.value().clone())
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }
}
