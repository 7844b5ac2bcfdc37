use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::slots::SlotTime;

/// Store-assigned identifier, shared by every table.
pub type Id = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states: no further rescheduling is expected from them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Whether an appointment in this state holds its slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: SlotTime,
    pub service: String,
    pub message: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Sort key for listings: most recent date/time first, newest id breaking ties.
    pub fn recency_key(&self) -> std::cmp::Reverse<(NaiveDate, SlotTime, Id)> {
        std::cmp::Reverse((self.appointment_date, self.appointment_time, self.id))
    }
}

/// Unvalidated booking input. Absent and blank fields are treated alike.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppointmentDraft {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub service: Option<String>,
    pub message: Option<String>,
}

/// Unvalidated reschedule input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleDraft {
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
}

/// All appointments on one calendar date, sorted by `(time, id)`.
#[derive(Debug, Clone)]
pub struct DayState {
    pub date: NaiveDate,
    pub appointments: Vec<Appointment>,
}

impl DayState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            appointments: Vec::new(),
        }
    }

    pub fn insert_appointment(&mut self, appt: Appointment) {
        let key = (appt.appointment_time, appt.id);
        let pos = self
            .appointments
            .binary_search_by_key(&key, |a| (a.appointment_time, a.id))
            .unwrap_or_else(|e| e);
        self.appointments.insert(pos, appt);
    }

    pub fn remove_appointment(&mut self, id: Id) -> Option<Appointment> {
        let pos = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(pos))
    }

    pub fn get(&self, id: Id) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }

    /// The live (non-cancelled) appointment holding `time`, ignoring `exclude`.
    pub fn occupant(&self, time: SlotTime, exclude: Option<Id>) -> Option<&Appointment> {
        let start = self
            .appointments
            .partition_point(|a| a.appointment_time < time);
        self.appointments[start..]
            .iter()
            .take_while(|a| a.appointment_time == time)
            .find(|a| a.status.occupies_slot() && Some(a.id) != exclude)
    }

    /// Occupied times in ascending order, deduplicated.
    pub fn booked_times(&self) -> Vec<SlotTime> {
        let mut times: Vec<SlotTime> = self
            .appointments
            .iter()
            .filter(|a| a.status.occupies_slot())
            .map(|a| a.appointment_time)
            .collect();
        times.dedup();
        times
    }
}

// ── Catalog ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Id,
    pub name: String,
    /// Display price, e.g. `$45` or `$75+`.
    pub price: String,
    /// Display duration, e.g. `60 min`.
    pub duration: String,
    pub description: String,
    pub features: Vec<String>,
    pub image_url: Option<String>,
}

/// Features arrive either as a JSON array or as one comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FeatureList {
    List(Vec<String>),
    Csv(String),
}

impl FeatureList {
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            FeatureList::List(v) => v,
            FeatureList::Csv(s) => s.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceDraft {
    pub name: Option<String>,
    pub price: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub features: Option<FeatureList>,
    pub image_url: Option<String>,
}

pub const DEFAULT_GALLERY_CATEGORY: &str = "nail-art";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GalleryDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

/// The WAL record format. Flat, one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    AppointmentBooked {
        appointment: Appointment,
    },
    AppointmentStatusChanged {
        id: Id,
        status: AppointmentStatus,
    },
    AppointmentRescheduled {
        id: Id,
        date: NaiveDate,
        time: SlotTime,
    },
    AppointmentDeleted {
        id: Id,
    },
    ServiceCreated {
        service: Service,
    },
    ServiceUpdated {
        service: Service,
    },
    ServiceDeleted {
        id: Id,
    },
    GalleryItemCreated {
        item: GalleryItem,
    },
    GalleryItemUpdated {
        item: GalleryItem,
    },
    GalleryItemDeleted {
        id: Id,
    },
    /// Written first by compaction so ids freed by deletes are never reissued.
    SequencesReserved {
        next_appointment_id: Id,
        next_service_id: Id,
        next_gallery_id: Id,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub date: NaiveDate,
    #[serde(rename = "availableSlots")]
    pub available: Vec<SlotTime>,
    #[serde(rename = "bookedSlots")]
    pub booked: Vec<SlotTime>,
}
