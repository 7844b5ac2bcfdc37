use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A bookable time of day, stored as minutes after midnight.
///
/// The canonical label is 24-hour `HH:MM`. Legacy 12-hour labels such as
/// `1:00 PM` are accepted on input and canonicalized, so only one format is
/// ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(u16);

impl SlotTime {
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self(hour * 60 + minute))
        } else {
            None
        }
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    pub fn hour(&self) -> u16 {
        self.0 / 60
    }

    pub fn minute(&self) -> u16 {
        self.0 % 60
    }

    pub fn to_naive_time(self) -> chrono::NaiveTime {
        chrono::NaiveTime::from_hms_opt(self.hour() as u32, self.minute() as u32, 0)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSlotError(pub String);

impl fmt::Display for ParseSlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time label {:?}: expected HH:MM", self.0)
    }
}

impl std::error::Error for ParseSlotError {}

impl FromStr for SlotTime {
    type Err = ParseSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSlotError(s.to_string());
        let trimmed = s.trim();

        // Legacy 12-hour form: "10:00 AM", "1:00 pm"
        let upper = trimmed.to_ascii_uppercase();
        let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
            (rest.trim_end().to_string(), Some(false))
        } else if let Some(rest) = upper.strip_suffix("PM") {
            (rest.trim_end().to_string(), Some(true))
        } else {
            (upper, None)
        };

        let (h, m) = clock.split_once(':').ok_or_else(err)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(err());
        }
        if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let mut hour: u16 = h.parse().map_err(|_| err())?;
        let minute: u16 = m.parse().map_err(|_| err())?;

        if let Some(pm) = meridiem {
            if hour == 0 || hour > 12 {
                return Err(err());
            }
            hour = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
        }

        Self::from_hm(hour, minute).ok_or_else(err)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl TryFrom<String> for SlotTime {
    type Error = ParseSlotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlotTime> for String {
    fn from(value: SlotTime) -> Self {
        value.to_string()
    }
}

/// The ordered set of bookable times, identical for every date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGrid {
    slots: Vec<SlotTime>,
}

impl Default for SlotGrid {
    /// 09:00 through 17:30 in half-hour steps.
    fn default() -> Self {
        Self::stepped(SlotTime(9 * 60), SlotTime(18 * 60), 30)
            .unwrap_or_else(|| Self { slots: Vec::new() })
    }
}

impl SlotGrid {
    /// Slots starting at `opening`, every `step_minutes`, the last one
    /// starting strictly before `closing`. `None` if that yields no slots.
    pub fn stepped(opening: SlotTime, closing: SlotTime, step_minutes: u16) -> Option<Self> {
        if step_minutes == 0 || opening >= closing {
            return None;
        }
        let slots: Vec<SlotTime> = (opening.minutes()..closing.minutes())
            .step_by(step_minutes as usize)
            .map(SlotTime)
            .collect();
        if slots.is_empty() {
            None
        } else {
            Some(Self { slots })
        }
    }

    pub fn slots(&self) -> &[SlotTime] {
        &self.slots
    }

    pub fn contains(&self, t: SlotTime) -> bool {
        self.slots.binary_search(&t).is_ok()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
