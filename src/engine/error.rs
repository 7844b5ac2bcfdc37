use chrono::NaiveDate;

use crate::model::{AppointmentStatus, Id};
use crate::slots::SlotTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Appointment,
    Service,
    GalleryItem,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Appointment => "appointment",
            Entity::Service => "service",
            Entity::GalleryItem => "gallery item",
        })
    }
}

#[derive(Debug)]
pub enum EngineError {
    /// Required input fields absent or blank, in declaration order.
    MissingFields(Vec<&'static str>),
    Invalid {
        field: &'static str,
        reason: String,
    },
    SlotConflict {
        date: NaiveDate,
        time: SlotTime,
    },
    NotFound(Entity, Id),
    InvalidStatus(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MissingFields(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            EngineError::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
            EngineError::SlotConflict { date, time } => write!(
                f,
                "slot {date} {time} is already booked; please choose another time"
            ),
            EngineError::NotFound(entity, id) => write!(f, "{entity} not found: {id}"),
            EngineError::InvalidStatus(s) => {
                let allowed: Vec<&str> = AppointmentStatus::ALL.iter().map(|s| s.as_str()).collect();
                write!(f, "invalid status {s:?}; allowed: {}", allowed.join(", "))
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
