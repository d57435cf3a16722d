use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value, json};

use crate::types::{BookingRecord, ChangeEvent};

/// A document write delivered with plain JSON snapshots.
#[derive(Debug, Deserialize)]
pub struct DocumentWrittenEvent {
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub time: Option<DateTime<Utc>>,
    pub data: Snapshots,
}

#[derive(Debug, Default, Deserialize)]
pub struct Snapshots {
    #[serde(default)]
    pub before: Option<Value>,
    #[serde(default)]
    pub after: Option<Value>,
}

/// A document write delivered as Firestore event data, with typed field values.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEventData {
    pub old_value: Option<Document>,
    pub value: Option<Document>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, FirestoreValue>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub update_time: Option<DateTime<Utc>>,
}

/// See https://firebase.google.com/docs/firestore/reference/rest/v1/Value
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FirestoreValue {
    NullValue(Value),
    BooleanValue(bool),
    IntegerValue(Value),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Deserialize)]
pub struct GeoPoint {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<FirestoreValue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: HashMap<String, FirestoreValue>,
}

/// Any payload shape the trigger accepts. Payloads carrying `data` are plain
/// snapshots; everything else is Firestore event data.
#[derive(Debug)]
pub enum TriggerPayload {
    Written(DocumentWrittenEvent),
    Firestore(DocumentEventData),
}

impl<'de> Deserialize<'de> for TriggerPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let payload = if value.get("data").is_some() {
            serde_json::from_value(value).map(TriggerPayload::Written)
        } else {
            serde_json::from_value(value).map(TriggerPayload::Firestore)
        };
        payload.map_err(serde::de::Error::custom)
    }
}

/// Event times only feed logging, so an unparseable one is dropped rather
/// than failing the event.
fn lenient_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let Some(text) = value.as_str() else {
        return Ok(None);
    };
    match DateTime::parse_from_rfc3339(text) {
        Ok(time) => Ok(Some(time.with_timezone(&Utc))),
        Err(e) => {
            warn!("Ignoring event time {text:?}: {e}");
            Ok(None)
        }
    }
}

impl FirestoreValue {
    pub fn to_json(&self) -> Value {
        match self {
            FirestoreValue::NullValue(_) => Value::Null,
            FirestoreValue::BooleanValue(b) => Value::Bool(*b),
            // Integers are int64 and arrive as decimal strings
            FirestoreValue::IntegerValue(Value::String(s)) => s
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(s.clone())),
            FirestoreValue::IntegerValue(v) => v.clone(),
            FirestoreValue::DoubleValue(d) => json!(d),
            FirestoreValue::TimestampValue(s)
            | FirestoreValue::StringValue(s)
            | FirestoreValue::BytesValue(s)
            | FirestoreValue::ReferenceValue(s) => Value::String(s.clone()),
            FirestoreValue::GeoPointValue(p) => {
                json!({ "latitude": p.latitude, "longitude": p.longitude })
            }
            FirestoreValue::ArrayValue(a) => {
                Value::Array(a.values.iter().map(FirestoreValue::to_json).collect())
            }
            FirestoreValue::MapValue(m) => fields_to_json(&m.fields),
        }
    }
}

fn fields_to_json(fields: &HashMap<String, FirestoreValue>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<Map<String, Value>>(),
    )
}

/// Last path segment of a document name, e.g. `.../documents/bookings/abc` -> `abc`.
fn document_id(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

/// Decodes a snapshot into a booking. Only a missing or null snapshot is
/// absent; a document that isn't an object still exists, with no usable fields.
fn booking(snapshot: Option<Value>, which: &str) -> Option<BookingRecord> {
    match snapshot? {
        Value::Null => None,
        value => Some(serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("Malformed {which} snapshot, using empty booking: {e}");
            BookingRecord::default()
        })),
    }
}

impl From<DocumentWrittenEvent> for ChangeEvent {
    fn from(event: DocumentWrittenEvent) -> Self {
        ChangeEvent {
            booking_id: event.params.get("bookingId").map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            time: event.time,
            before: booking(event.data.before, "before"),
            after: booking(event.data.after, "after"),
        }
    }
}

impl From<DocumentEventData> for ChangeEvent {
    fn from(data: DocumentEventData) -> Self {
        let booking_id = data
            .value
            .as_ref()
            .or(data.old_value.as_ref())
            .and_then(|d| document_id(&d.name))
            .map(str::to_owned);
        let time = data
            .value
            .as_ref()
            .and_then(|d| d.update_time)
            .or_else(|| data.old_value.as_ref().and_then(|d| d.update_time));

        ChangeEvent {
            booking_id,
            time,
            before: booking(data.old_value.map(|d| fields_to_json(&d.fields)), "before"),
            after: booking(data.value.map(|d| fields_to_json(&d.fields)), "after"),
        }
    }
}

impl From<TriggerPayload> for ChangeEvent {
    fn from(payload: TriggerPayload) -> Self {
        match payload {
            TriggerPayload::Written(event) => event.into(),
            TriggerPayload::Firestore(data) => data.into(),
        }
    }
}

pub fn parse_change_event(payload: &str) -> anyhow::Result<ChangeEvent> {
    let payload: TriggerPayload = serde_json::from_str(payload)?;
    Ok(payload.into())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::change::notification;
    use crate::types::GuestCount;

    const CREATED_EVENT: &str = include_str!("../tests/fixtures/created.json");
    const CANCELLED_EVENT: &str = include_str!("../tests/fixtures/cancelled_firestore.json");

    fn lakeview(active: Option<bool>) -> BookingRecord {
        BookingRecord {
            room_name: "Lakeview".to_owned(),
            guest_name: "Ana".to_owned(),
            number_of_guests: Some(GuestCount::Count(2)),
            is_active: active,
        }
    }

    #[test]
    fn test_parse_written_event() -> anyhow::Result<()> {
        let event = parse_change_event(CREATED_EVENT)?;
        assert_eq!(event.booking_id.as_deref(), Some("booking-1"));
        assert!(event.time.is_some());
        assert_eq!(event.before, None);
        assert_eq!(event.after, Some(lakeview(Some(true))));
        Ok(())
    }

    #[test]
    fn test_parse_firestore_event() -> anyhow::Result<()> {
        let event = parse_change_event(CANCELLED_EVENT)?;
        assert_eq!(event.booking_id.as_deref(), Some("booking-7"));
        assert_eq!(event.before, Some(lakeview(Some(true))));
        assert_eq!(event.after, Some(lakeview(Some(false))));
        Ok(())
    }

    #[test]
    fn test_parse_written_event_missing_snapshots() -> anyhow::Result<()> {
        let event = parse_change_event(r#"{"data": {}}"#)?;
        assert_eq!(event.before, None);
        assert_eq!(event.after, None);
        assert_eq!(event.booking_id, None);
        Ok(())
    }

    #[test]
    fn test_parse_written_event_null_snapshot_is_absent() -> anyhow::Result<()> {
        let event = parse_change_event(
            r#"{"data": {"before": {"roomName": "Lakeview", "guestName": "Ana"}, "after": null}}"#,
        )?;
        assert!(event.before.is_some());
        assert_eq!(event.after, None);
        Ok(())
    }

    #[test]
    fn test_parse_written_event_missing_fields_default() -> anyhow::Result<()> {
        let event = parse_change_event(r#"{"data": {"after": {"roomName": "Attic"}}}"#)?;
        assert_eq!(
            event.after,
            Some(BookingRecord {
                room_name: "Attic".to_owned(),
                ..Default::default()
            })
        );
        Ok(())
    }

    #[test]
    fn test_parse_written_event_non_object_snapshot_is_present() -> anyhow::Result<()> {
        let event = parse_change_event(r#"{"data": {"before": null, "after": "not a document"}}"#)?;
        assert_eq!(event.before, None);
        assert_eq!(event.after, Some(BookingRecord::default()));
        Ok(())
    }

    // --- mistyped fields keep the row of the notification table ---

    #[test]
    fn test_update_with_string_guest_count_stays_update() -> anyhow::Result<()> {
        let event = parse_change_event(
            r#"{"data": {
                "before": {"roomName": "Lakeview", "guestName": "Ana", "numberOfGuests": "2", "isActive": true},
                "after": {"roomName": "Lakeview", "guestName": "Ana", "numberOfGuests": 3, "isActive": true}
            }}"#,
        )?;
        let message = notification(&event).unwrap();
        assert_eq!(message.title, "Booking Updated: Lakeview");
        assert_eq!(message.body, "Updates made to Ana's booking.");
        Ok(())
    }

    #[test]
    fn test_update_with_string_is_active_stays_update() -> anyhow::Result<()> {
        let event = parse_change_event(
            r#"{"data": {
                "before": {"roomName": "Lakeview", "guestName": "Ana", "numberOfGuests": 2, "isActive": true},
                "after": {"roomName": "Lakeview", "guestName": "Ana", "numberOfGuests": 2, "isActive": "false"}
            }}"#,
        )?;
        let message = notification(&event).unwrap();
        assert_eq!(message.title, "Booking Updated: Lakeview");
        assert_eq!(message.body, "Updates made to Ana's booking.");
        Ok(())
    }

    #[test]
    fn test_create_with_float_guest_count() -> anyhow::Result<()> {
        let event = parse_change_event(
            r#"{"data": {
                "before": null,
                "after": {"roomName": "Lakeview", "guestName": "Ana", "numberOfGuests": 2.0, "isActive": true}
            }}"#,
        )?;
        let message = notification(&event).unwrap();
        assert_eq!(message.title, "New Booking: Lakeview");
        assert_eq!(message.body, "Ana booked for 2 guest(s).");
        Ok(())
    }

    // --- payload shape ---

    #[test]
    fn test_written_event_with_bad_time_keeps_snapshots() -> anyhow::Result<()> {
        let event = parse_change_event(
            r#"{"time": "yesterday", "data": {"before": null,
                "after": {"roomName": "Lakeview", "guestName": "Ana", "numberOfGuests": 2, "isActive": true}}}"#,
        )?;
        assert_eq!(event.time, None);
        assert_eq!(event.after, Some(lakeview(Some(true))));
        assert_eq!(
            notification(&event).unwrap().title,
            "New Booking: Lakeview"
        );
        Ok(())
    }

    #[test]
    fn test_written_event_with_non_string_booking_id() -> anyhow::Result<()> {
        let event = parse_change_event(
            r#"{"params": {"bookingId": 17}, "data": {"after": {"roomName": "Lakeview"}}}"#,
        )?;
        assert_eq!(event.booking_id.as_deref(), Some("17"));
        assert!(event.after.is_some());
        Ok(())
    }

    #[test]
    fn test_written_event_with_bad_data_is_an_error() {
        assert!(parse_change_event(r#"{"data": "nope"}"#).is_err());
    }

    #[test]
    fn test_firestore_event_with_bad_update_time_keeps_documents() -> anyhow::Result<()> {
        let event = parse_change_event(
            r#"{"value": {"name": "projects/p/databases/(default)/documents/bookings/b1",
                "fields": {"roomName": {"stringValue": "Lakeview"}},
                "updateTime": "soon"}}"#,
        )?;
        assert_eq!(event.booking_id.as_deref(), Some("b1"));
        assert_eq!(event.time, None);
        assert_eq!(event.after.unwrap().room_name, "Lakeview");
        Ok(())
    }

    #[test]
    fn test_parse_firestore_event_empty() -> anyhow::Result<()> {
        let event = parse_change_event("{}")?;
        assert_eq!(event, ChangeEvent::default());
        Ok(())
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(parse_change_event("not json").is_err());
    }

    // --- FirestoreValue ---

    #[test]
    fn test_integer_value_string() {
        let v: FirestoreValue = serde_json::from_str(r#"{"integerValue": "42"}"#).unwrap();
        assert_eq!(v.to_json(), json!(42));
    }

    #[test]
    fn test_integer_value_number() {
        let v: FirestoreValue = serde_json::from_str(r#"{"integerValue": 7}"#).unwrap();
        assert_eq!(v.to_json(), json!(7));
    }

    #[test]
    fn test_null_value() {
        let v: FirestoreValue = serde_json::from_str(r#"{"nullValue": "NULL_VALUE"}"#).unwrap();
        assert_eq!(v.to_json(), Value::Null);
    }

    #[test]
    fn test_nested_map_and_array() {
        let v: FirestoreValue = serde_json::from_str(
            r#"{"mapValue": {"fields": {
                "tags": {"arrayValue": {"values": [{"stringValue": "a"}, {"booleanValue": false}]}},
                "where": {"geoPointValue": {"latitude": 1.5, "longitude": -2.0}}
            }}}"#,
        )
        .unwrap();
        assert_eq!(
            v.to_json(),
            json!({
                "tags": ["a", false],
                "where": { "latitude": 1.5, "longitude": -2.0 }
            })
        );
    }

    #[test]
    fn test_empty_array_value() {
        let v: FirestoreValue = serde_json::from_str(r#"{"arrayValue": {}}"#).unwrap();
        assert_eq!(v.to_json(), json!([]));
    }

    // --- document_id ---

    #[test]
    fn test_document_id() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/bookings/abc"),
            Some("abc")
        );
    }

    #[test]
    fn test_document_id_empty() {
        assert_eq!(document_id(""), None);
    }
}
