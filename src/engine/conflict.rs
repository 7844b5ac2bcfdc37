use chrono::{Datelike, NaiveDate};

use crate::limits::*;
use crate::model::*;
use crate::slots::{SlotGrid, SlotTime};

use super::EngineError;

/// A booking request that passed validation. Text fields are trimmed.
#[derive(Debug, Clone)]
pub(crate) struct ValidBooking {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub service: String,
    pub message: String,
}

/// Trimmed, non-empty value of an optional input field.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), EngineError> {
    if value.chars().count() > max {
        return Err(EngineError::LimitExceeded(field));
    }
    Ok(())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, EngineError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| EngineError::invalid("appointment_date", format!("{raw:?} is not a YYYY-MM-DD date")))?;
    if !(MIN_APPOINTMENT_YEAR..=MAX_APPOINTMENT_YEAR).contains(&date.year()) {
        return Err(EngineError::invalid(
            "appointment_date",
            format!("year must be between {MIN_APPOINTMENT_YEAR} and {MAX_APPOINTMENT_YEAR}"),
        ));
    }
    Ok(date)
}

/// Parse a time label (24-hour or legacy 12-hour) and require it to be on the grid.
pub fn parse_slot(raw: &str, grid: &SlotGrid) -> Result<SlotTime, EngineError> {
    let time: SlotTime = raw
        .parse()
        .map_err(|e: crate::slots::ParseSlotError| EngineError::invalid("appointment_time", e.to_string()))?;
    if !grid.contains(time) {
        return Err(EngineError::invalid(
            "appointment_time",
            format!("{time} is not a bookable slot"),
        ));
    }
    Ok(time)
}

pub(crate) fn validate_draft(draft: &AppointmentDraft, grid: &SlotGrid) -> Result<ValidBooking, EngineError> {
    let fields = [
        ("name", &draft.name),
        ("email", &draft.email),
        ("phone", &draft.phone),
        ("appointment_date", &draft.appointment_date),
        ("appointment_time", &draft.appointment_time),
        ("service", &draft.service),
    ];
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, v)| present(v).is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::MissingFields(missing));
    }

    // All present from here on.
    let field = |v: &Option<String>| present(v).unwrap_or_default().to_string();
    let name = field(&draft.name);
    let email = field(&draft.email);
    let phone = field(&draft.phone);
    let service = field(&draft.service);
    let message = draft.message.as_deref().map(str::trim).unwrap_or_default().to_string();

    check_len("name too long", &name, MAX_NAME_LEN)?;
    check_len("email too long", &email, MAX_EMAIL_LEN)?;
    check_len("phone too long", &phone, MAX_PHONE_LEN)?;
    check_len("service too long", &service, MAX_SERVICE_LEN)?;
    check_len("message too long", &message, MAX_MESSAGE_LEN)?;

    if !email.contains('@') {
        return Err(EngineError::invalid("email", "must contain '@'"));
    }

    let date = parse_date(&field(&draft.appointment_date))?;
    let time = parse_slot(&field(&draft.appointment_time), grid)?;

    Ok(ValidBooking {
        name,
        email,
        phone,
        date,
        time,
        service,
        message,
    })
}

pub(crate) fn validate_schedule(
    draft: &ScheduleDraft,
    grid: &SlotGrid,
) -> Result<(NaiveDate, SlotTime), EngineError> {
    match (present(&draft.appointment_date), present(&draft.appointment_time)) {
        (Some(date), Some(time)) => Ok((parse_date(date)?, parse_slot(time, grid)?)),
        (date, time) => {
            let mut missing = Vec::new();
            if date.is_none() {
                missing.push("appointment_date");
            }
            if time.is_none() {
                missing.push("appointment_time");
            }
            Err(EngineError::MissingFields(missing))
        }
    }
}

/// Fail if a live appointment other than `exclude` holds `time` on this day.
pub(crate) fn check_slot_free(
    day: &DayState,
    time: SlotTime,
    exclude: Option<Id>,
) -> Result<(), EngineError> {
    match day.occupant(time, exclude) {
        Some(_) => Err(EngineError::SlotConflict { date: day.date, time }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> AppointmentDraft {
        AppointmentDraft {
            name: Some(" Ana Lima ".into()),
            email: Some("ana@example.com".into()),
            phone: Some("555-0100".into()),
            appointment_date: Some("2025-06-01".into()),
            appointment_time: Some("10:00 AM".into()),
            service: Some("Gel Manicure".into()),
            message: None,
        }
    }

    #[test]
    fn valid_draft_is_trimmed_and_canonicalized() {
        let v = validate_draft(&draft(), &SlotGrid::default()).unwrap();
        assert_eq!(v.name, "Ana Lima");
        assert_eq!(v.time.to_string(), "10:00");
        assert_eq!(v.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(v.message, "");
    }

    #[test]
    fn every_missing_field_is_reported() {
        let d = AppointmentDraft {
            name: Some("   ".into()),
            phone: None,
            service: Some(String::new()),
            ..draft()
        };
        match validate_draft(&d, &SlotGrid::default()) {
            Err(EngineError::MissingFields(f)) => assert_eq!(f, vec!["name", "phone", "service"]),
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn malformed_values_are_rejected() {
        let grid = SlotGrid::default();
        let cases = [
            AppointmentDraft { email: Some("no-at-sign".into()), ..draft() },
            AppointmentDraft { appointment_date: Some("06/01/2025".into()), ..draft() },
            AppointmentDraft { appointment_date: Some("2025-02-30".into()), ..draft() },
            AppointmentDraft { appointment_date: Some("1999-12-31".into()), ..draft() },
            AppointmentDraft { appointment_time: Some("09:15".into()), ..draft() },
            AppointmentDraft { appointment_time: Some("18:00".into()), ..draft() },
            AppointmentDraft { appointment_time: Some("noon".into()), ..draft() },
        ];
        for d in cases {
            assert!(
                matches!(validate_draft(&d, &grid), Err(EngineError::Invalid { .. })),
                "{d:?} should be invalid"
            );
        }
    }

    #[test]
    fn oversized_fields_hit_limits() {
        let d = AppointmentDraft { name: Some("x".repeat(MAX_NAME_LEN + 1)), ..draft() };
        assert!(matches!(
            validate_draft(&d, &SlotGrid::default()),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn schedule_requires_both_fields() {
        let grid = SlotGrid::default();
        let empty = ScheduleDraft::default();
        match validate_schedule(&empty, &grid) {
            Err(EngineError::MissingFields(f)) => assert_eq!(f, vec!["appointment_date", "appointment_time"]),
            other => panic!("expected MissingFields, got {other:?}"),
        }
        let ok = ScheduleDraft {
            appointment_date: Some("2025-06-02".into()),
            appointment_time: Some("2:30 PM".into()),
        };
        let (date, time) = validate_schedule(&ok, &grid).unwrap();
        assert_eq!(date.to_string(), "2025-06-02");
        assert_eq!(time.to_string(), "14:30");
    }
}
