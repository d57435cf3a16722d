use anyhow::Result;
use log::{debug, error, info};

use crate::messaging::MessagingGateway;
use crate::types::{ChangeEvent, NotificationMessage};

pub mod change;
pub mod firestore;
pub mod messaging;
pub mod types;

pub const APP_NAME: &str = "bookingnotify";

pub fn set_up_logger(caller: &str, verbose: bool) -> Result<()> {
    jluszcz_rust_utils::set_up_logger(APP_NAME, caller, verbose)
}

/// Formats a notification for one booking write and sends it through `gateway`.
///
/// Delivery failures are logged and swallowed, so the write that triggered the
/// event is never affected. Returns the message that was produced, if any.
pub async fn handle<G: MessagingGateway>(
    event: &ChangeEvent,
    gateway: &G,
) -> Option<NotificationMessage> {
    let booking_id = event.booking_id.as_deref().unwrap_or("<unknown>");
    if let Some(time) = event.time {
        debug!("Booking {booking_id} written at {}", time.to_rfc3339());
    }

    let Some(message) = change::notification(event) else {
        debug!("No notification for booking {booking_id}");
        return None;
    };

    info!("Sending notification to topic {}: {message:?}", message.topic);
    match gateway.send(&message).await {
        Ok(()) => info!("Notification sent successfully for booking {booking_id}"),
        Err(e) => error!("Error sending notification for booking {booking_id}: {e:#}"),
    }

    Some(message)
}
