//! Event reminders emailed on a chosen day and minute.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use best_wishes_core::{Occasion, ReminderId, UserId};

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    pub user_id: UserId,
    #[serde(rename = "remindermsg")]
    pub reminder_msg: String,
    pub date: NaiveDate,
    pub event: String,
    pub occasion: Occasion,
    pub time: String,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    /// Whether this reminder fires at the given local minute.
    #[must_use]
    pub fn is_due(&self, local: NaiveDateTime) -> bool {
        !self.sent && self.date == local.date() && self.time == minute_label(local)
    }
}

/// A due reminder joined with its owner's contact details.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueReminder {
    #[sqlx(flatten)]
    pub reminder: Reminder,
    pub email: String,
    pub first_name: String,
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub reminder_msg: String,
    pub date: NaiveDate,
    pub event: String,
    pub occasion: Occasion,
    pub time: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReminderEdit {
    pub reminder_msg: Option<String>,
    pub date: Option<NaiveDate>,
    pub event: Option<String>,
    pub occasion: Option<Occasion>,
    pub time: Option<String>,
}

/// Format a local time as the `HH:MM` label reminders are stored with.
#[must_use]
pub fn minute_label(local: NaiveDateTime) -> String {
    local.format("%H:%M").to_string()
}

/// Accept `HH:MM` with a 24-hour clock.
#[must_use]
pub fn is_valid_time(s: &str) -> bool {
    s.len() == 5 && chrono::NaiveTime::parse_from_str(s, "%H:%M").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|e| panic!("{e}"))
    }

    fn reminder(date: &str, time: &str, sent: bool) -> Reminder {
        Reminder {
            id: ReminderId::new(1),
            user_id: UserId::new(1),
            reminder_msg: "Buy flowers".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap_or_else(|e| panic!("{e}")),
            event: "Mum's birthday".to_string(),
            occasion: Occasion::Birthday,
            time: time.to_string(),
            sent,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_due_on_exact_minute() {
        let r = reminder("2025-03-14", "09:30", false);
        assert!(r.is_due(at("2025-03-14", "09:30:45")));
        assert!(!r.is_due(at("2025-03-14", "09:31:00")));
        assert!(!r.is_due(at("2025-03-15", "09:30:00")));
    }

    #[test]
    fn test_sent_reminders_never_due() {
        let r = reminder("2025-03-14", "09:30", true);
        assert!(!r.is_due(at("2025-03-14", "09:30:00")));
    }

    #[test]
    fn test_time_validation() {
        assert!(is_valid_time("00:00"));
        assert!(is_valid_time("23:59"));
        assert!(!is_valid_time("24:00"));
        assert!(!is_valid_time("9:30"));
        assert!(!is_valid_time("09:30:00"));
    }

    #[test]
    fn test_occasion_serialized_as_label() {
        let json = serde_json::to_value(reminder("2025-03-14", "09:30", false))
            .unwrap_or_default();
        assert_eq!(json["occasion"], "birthday");
        assert_eq!(json["remindermsg"], "Buy flowers");
    }
}
