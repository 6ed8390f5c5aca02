//! Booking emails. The customer gets a confirmation with a calendar invite and
//! a note on every status change; the business inbox gets a copy of each new
//! booking.

use crate::{
    catalog,
    slots::SLOT_MINUTES,
    types::{Booking, BookingStatus},
};
use chrono::{Duration, Utc};
use icalendar::{Alarm, Calendar, Component, Event, EventLike, EventStatus, Property};
use lettre::{
    address::AddressError,
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::{fmt::Write, sync::Arc, time::Duration as Timeout};
use thiserror::Error;
use tracing::{error, info, warn};

const INVITE_CONTENT_TYPE: &str = "text/calendar; method=REQUEST";
const UID_DOMAIN: &str = "earnedshine.com";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Sends booking emails. Failures are reported to the caller, which decides
/// whether they matter.
pub trait Notifier: Send + Sync {
    fn booking_created(&self, booking: &Booking) -> Result<(), NotifyError>;
    fn status_changed(&self, booking: &Booking, previous: BookingStatus) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Sender of every email and recipient of the new-booking copies.
    pub mail_from: String,
}

/// SMTP notifier when mail is configured, otherwise one that only logs.
pub fn notifier_for(settings: Option<MailSettings>) -> Arc<dyn Notifier> {
    let Some(settings) = settings else {
        warn!("No SMTP server configured, booking emails are not sent");
        return Arc::new(LogNotifier);
    };
    match SmtpNotifier::new(&settings) {
        Ok(notifier) => {
            info!(host = %settings.smtp_host, port = settings.smtp_port, "Sending booking emails over SMTP");
            Arc::new(notifier)
        }
        Err(err) => {
            error!(%err, "Invalid mail settings, booking emails are not sent");
            Arc::new(LogNotifier)
        }
    }
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn booking_created(&self, booking: &Booking) -> Result<(), NotifyError> {
        info!(booking_id = %booking.booking_id, "Skipping booking confirmation email");
        Ok(())
    }

    fn status_changed(&self, booking: &Booking, previous: BookingStatus) -> Result<(), NotifyError> {
        info!(
            booking_id = %booking.booking_id,
            previous = previous.as_str(),
            status = booking.status.as_str(),
            "Skipping status update email"
        );
        Ok(())
    }
}

pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &MailSettings) -> Result<Self, NotifyError> {
        let mut transport = SmtpTransport::starttls_relay(&settings.smtp_host)?
            .port(settings.smtp_port)
            .timeout(Some(Timeout::from_secs(10)));
        if let (Some(username), Some(password)) = (&settings.smtp_username, &settings.smtp_password) {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: transport.build(),
            from: settings.mail_from.parse()?,
        })
    }

    fn message(&self, to: Mailbox, subject: String) -> lettre::message::MessageBuilder {
        Message::builder().from(self.from.clone()).to(to).subject(subject)
    }

    fn with_invite(&self, booking: &Booking, text: String) -> Result<MultiPart, NotifyError> {
        let content_type =
            ContentType::parse(INVITE_CONTENT_TYPE).map_err(|err| NotifyError::Invalid(err.to_string()))?;
        Ok(MultiPart::mixed()
            .singlepart(SinglePart::plain(text))
            .singlepart(Attachment::new("invite.ics".into()).body(calendar_invite(booking), content_type)))
    }
}

impl Notifier for SmtpNotifier {
    fn booking_created(&self, booking: &Booking) -> Result<(), NotifyError> {
        let confirmation = self
            .message(
                booking.email.parse()?,
                format!("Booking Confirmation - {}", booking.booking_id),
            )
            .multipart(self.with_invite(booking, confirmation_text(booking))?)?;
        self.transport.send(&confirmation)?;

        let copy = self
            .message(
                self.from.clone(),
                format!("New Booking Received - {}", booking.booking_id),
            )
            .multipart(self.with_invite(booking, admin_text(booking))?)?;
        self.transport.send(&copy)?;

        info!(booking_id = %booking.booking_id, "Confirmation sent to customer and admin");
        Ok(())
    }

    fn status_changed(&self, booking: &Booking, previous: BookingStatus) -> Result<(), NotifyError> {
        let update = self
            .message(
                booking.email.parse()?,
                format!("Booking Status Update - {}", booking.booking_id),
            )
            .body(status_text(booking, previous))?;
        self.transport.send(&update)?;

        info!(booking_id = %booking.booking_id, "Status update sent");
        Ok(())
    }
}

fn service_name(booking: &Booking) -> &str {
    catalog::service(&booking.service_type).map_or(booking.service_type.as_str(), |service| service.name)
}

fn addon_names(booking: &Booking) -> String {
    booking
        .addons
        .iter()
        .map(|id| catalog::addon(id).map_or(id.as_str(), |addon| addon.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn details_text(booking: &Booking) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Booking ID: {}", booking.booking_id);
    let _ = writeln!(text, "Name: {}", booking.name);
    let _ = writeln!(text, "Email: {}", booking.email);
    let _ = writeln!(text, "Phone: {}", booking.phone);
    let _ = writeln!(text, "Service Address: {}", booking.address);
    let _ = writeln!(
        text,
        "Vehicle Type: {}",
        catalog::vehicle_label(&booking.vehicle_type).unwrap_or(booking.vehicle_type.as_str())
    );
    let _ = writeln!(text, "Service Type: {}", service_name(booking));
    if !booking.addons.is_empty() {
        let _ = writeln!(text, "Add-ons: {}", addon_names(booking));
    }
    let _ = writeln!(
        text,
        "Appointment Time: {}",
        booking.appointment_time.format("%A, %B %-d, %Y at %-I:%M %p")
    );
    let _ = writeln!(text, "Payment Method: {}", booking.payment_method.as_str());
    let _ = writeln!(text, "Status: {}", booking.status.as_str());
    text
}

pub fn confirmation_text(booking: &Booking) -> String {
    format!(
        "Thank you for booking with Earned Shine Detailing!\n\n{}\nWe'll see you soon!\n\nEarned Shine Detailing Team",
        details_text(booking)
    )
}

pub fn admin_text(booking: &Booking) -> String {
    format!(
        "A new booking has been received through the website.\n\n{}\nPlease review and confirm this booking in the admin panel.",
        details_text(booking)
    )
}

pub fn status_text(booking: &Booking, previous: BookingStatus) -> String {
    format!(
        "Your booking status has been updated from {} to {}.\n\n{}",
        previous.as_str(),
        booking.status.as_str(),
        details_text(booking)
    )
}

/// `.ics` request for the appointment, lasting as long as the booked service
/// and reminding one hour ahead.
pub fn calendar_invite(booking: &Booking) -> String {
    let minutes = catalog::service_duration(&booking.service_type).unwrap_or(SLOT_MINUTES);
    let start = booking.appointment_time;
    let end = start + Duration::minutes(i64::from(minutes));

    let mut description = format!(
        "Car detailing appointment with Earned Shine Detailing\nService: {}\nVehicle: {}\nLocation: {}\nBooking ID: {}",
        service_name(booking),
        catalog::vehicle_label(&booking.vehicle_type).unwrap_or(booking.vehicle_type.as_str()),
        booking.address,
        booking.booking_id
    );
    if !booking.addons.is_empty() {
        let _ = write!(description, "\nAdd-ons: {}", addon_names(booking));
    }

    let event = Event::new()
        .uid(&format!("{}@{UID_DOMAIN}", booking.booking_id))
        .timestamp(Utc::now())
        .starts(start)
        .ends(end)
        .summary(&format!("Car Detailing Appointment - {}", service_name(booking)))
        .description(&description)
        .location(&booking.address)
        .status(EventStatus::Confirmed)
        .alarm(Alarm::display(
            "Car detailing appointment in 1 hour",
            -Duration::hours(1),
        ))
        .done();

    let mut calendar = Calendar::new();
    calendar
        .append_property(Property::new("METHOD", "REQUEST"))
        .push(event);
    calendar.to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutils::example_booking;
    use chrono::NaiveDate;

    fn at(hour: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2032, 4, 20)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_invite_describes_the_appointment() {
        let booking = example_booking(at(10));
        let invite = calendar_invite(&booking);

        assert!(invite.starts_with("BEGIN:VCALENDAR"));
        assert!(invite.contains("METHOD:REQUEST"));
        assert!(invite.contains(&format!("UID:{}@earnedshine.com", booking.booking_id)));
        assert!(invite.contains("DTSTART:20320420T100000"));
        // full_interior lasts two hours
        assert!(invite.contains("DTEND:20320420T120000"));
        assert!(invite.contains("SUMMARY:Car Detailing Appointment - Full Interior Shine"));
        assert!(invite.contains("LOCATION:12 Harbor Lane"));
        assert!(invite.contains("STATUS:CONFIRMED"));
        assert!(invite.contains("BEGIN:VALARM"));
    }

    #[test]
    fn test_email_texts_use_display_names() {
        let booking = example_booking(at(10));

        let confirmation = confirmation_text(&booking);
        assert!(confirmation.contains("Service Type: Full Interior Shine"));
        assert!(confirmation.contains("Vehicle Type: Sedan/Coupe"));
        assert!(confirmation.contains("Add-ons: Pet Hair Removal"));
        assert!(confirmation.contains(&booking.booking_id.to_string()));

        assert!(admin_text(&booking).contains("admin panel"));

        let update = status_text(&booking, BookingStatus::PendingPayment);
        assert!(update.contains("from PENDING_PAYMENT to CONFIRMED"));
    }

    #[test]
    fn test_invalid_sender_is_rejected() {
        let settings = MailSettings {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            mail_from: "not an address".into(),
        };
        assert!(matches!(
            SmtpNotifier::new(&settings),
            Err(NotifyError::Address(_))
        ));
    }
}
