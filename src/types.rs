use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const BOOKING_TOPIC: &str = "booking_updates";

/// Fields are decoded leniently: a booking document with a mistyped field is
/// still a booking, so it must still select the right notification.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingRecord {
    #[serde(deserialize_with = "lenient_text")]
    pub room_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub guest_name: String,
    #[serde(deserialize_with = "lenient_guest_count")]
    pub number_of_guests: Option<GuestCount>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GuestCount {
    Count(i64),
    /// A value that isn't a whole number, kept as written.
    Other(String),
}

impl fmt::Display for GuestCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestCount::Count(n) => write!(f, "{n}"),
            GuestCount::Other(s) => f.write_str(s),
        }
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_bool())
}

fn lenient_guest_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<GuestCount>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Number(n) => Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => GuestCount::Count(i),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                GuestCount::Count(f as i64)
            }
            _ => GuestCount::Other(n.to_string()),
        }),
        Value::String(s) => Some(match s.trim().parse::<i64>() {
            Ok(i) => GuestCount::Count(i),
            Err(_) => GuestCount::Other(s),
        }),
        other => Some(GuestCount::Other(other.to_string())),
    })
}

/// The state of one booking immediately before and after a single write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeEvent {
    pub booking_id: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub before: Option<BookingRecord>,
    pub after: Option<BookingRecord>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    pub topic: String,
}

impl NotificationMessage {
    pub fn new(title: String, body: String) -> Self {
        Self {
            title,
            body,
            topic: BOOKING_TOPIC.to_owned(),
        }
    }
}
