use crate::types::{BookingRecord, ChangeEvent, NotificationMessage};

#[derive(Debug, PartialEq)]
pub enum ChangeKind<'a> {
    Created(&'a BookingRecord),
    Deleted(&'a BookingRecord),
    Updated {
        was_active: Option<bool>,
        is_active: Option<bool>,
        after: &'a BookingRecord,
    },
    Noop,
}

impl<'a> From<&'a ChangeEvent> for ChangeKind<'a> {
    fn from(event: &'a ChangeEvent) -> Self {
        match (&event.before, &event.after) {
            (None, Some(after)) => ChangeKind::Created(after),
            (Some(before), None) => ChangeKind::Deleted(before),
            (Some(before), Some(after)) => ChangeKind::Updated {
                was_active: before.is_active,
                is_active: after.is_active,
                after,
            },
            (None, None) => ChangeKind::Noop,
        }
    }
}

impl ChangeKind<'_> {
    pub fn notification(&self) -> Option<NotificationMessage> {
        let (title, body) = match self {
            ChangeKind::Created(after) => (
                format!("New Booking: {}", after.room_name),
                match &after.number_of_guests {
                    Some(count) => format!("{} booked for {count} guest(s).", after.guest_name),
                    None => format!(
                        "{} booked for an unknown number of guest(s).",
                        after.guest_name
                    ),
                },
            ),
            ChangeKind::Deleted(before) => (
                format!("Booking Cancelled: {}", before.room_name),
                format!("{}'s booking was removed.", before.guest_name),
            ),
            // Only an explicit true -> false transition counts as a cancellation
            ChangeKind::Updated {
                was_active: Some(true),
                is_active: Some(false),
                after,
            } => (
                format!("Booking Cancelled: {}", after.room_name),
                format!("{} cancelled their booking.", after.guest_name),
            ),
            ChangeKind::Updated { after, .. } => (
                format!("Booking Updated: {}", after.room_name),
                format!("Updates made to {}'s booking.", after.guest_name),
            ),
            ChangeKind::Noop => return None,
        };

        Some(NotificationMessage::new(title, body))
    }
}

pub fn notification(event: &ChangeEvent) -> Option<NotificationMessage> {
    ChangeKind::from(event).notification()
}
