use crate::{
    catalog,
    slots::{end_time, Slot, SlotError, SlotKey, SLOT_MINUTES},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9 ()\-.]{7,20}$").unwrap();
}

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Available,
    Blocked,
    Booked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "AVAILABLE",
            SlotStatus::Blocked => "BLOCKED",
            SlotStatus::Booked => "BOOKED",
        }
    }
}

impl FromStr for SlotStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SlotStatus::Available),
            "BLOCKED" => Ok(SlotStatus::Blocked),
            "BOOKED" => Ok(SlotStatus::Booked),
            other => Err(UnknownVariant {
                kind: "slot status",
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Completed,
    CanceledByUser,
    CanceledByAdmin,
}

impl BookingStatus {
    /// Bookings in these states own their slots.
    pub fn holds_slots(&self) -> bool {
        matches!(self, BookingStatus::PendingPayment | BookingStatus::Confirmed)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(
            self,
            BookingStatus::CanceledByUser | BookingStatus::CanceledByAdmin
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "PENDING_PAYMENT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::CanceledByUser => "CANCELED_BY_USER",
            BookingStatus::CanceledByAdmin => "CANCELED_BY_ADMIN",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(BookingStatus::PendingPayment),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELED_BY_USER" => Ok(BookingStatus::CanceledByUser),
            "CANCELED_BY_ADMIN" => Ok(BookingStatus::CanceledByAdmin),
            other => Err(UnknownVariant {
                kind: "booking status",
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Online,
    InPerson,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "ONLINE",
            PaymentMethod::InPerson => "IN_PERSON",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(PaymentMethod::Online),
            "IN_PERSON" => Ok(PaymentMethod::InPerson),
            other => Err(UnknownVariant {
                kind: "payment method",
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub date: NaiveDate,
    pub slot: SlotKey,
    pub status: SlotStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
}

impl Availability {
    pub const BOOKING_REASON: &'static str = "customer_booking";

    pub fn booked(date: NaiveDate, slot: Slot, booking_id: Uuid) -> Self {
        Self {
            date,
            slot: SlotKey::At(slot),
            status: SlotStatus::Booked,
            reason: Some(Self::BOOKING_REASON.into()),
            booking_id: Some(booking_id),
        }
    }

    pub fn blocked(date: NaiveDate, slot: SlotKey, reason: Option<String>) -> Self {
        Self {
            date,
            slot,
            status: SlotStatus::Blocked,
            reason,
            booking_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub vehicle_type: String,
    pub service_type: String,
    pub addons: Vec<String>,
    pub appointment_time: NaiveDateTime,
    pub payment_method: PaymentMethod,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub hidden: bool,
}

impl Booking {
    pub fn date(&self) -> NaiveDate {
        self.appointment_time.date()
    }

    pub fn start_slot(&self) -> Result<Slot, SlotError> {
        Slot::from_time(self.appointment_time.time())
    }

    pub fn total_price_cents(&self) -> u32 {
        catalog::total_price_cents(&self.service_type, &self.addons)
    }

    pub fn details(&self) -> BookingDetails {
        let (service_name, duration_minutes) = match catalog::service(&self.service_type) {
            Some(service) => (service.name.to_string(), service.duration_minutes),
            None => (self.service_type.clone(), SLOT_MINUTES),
        };
        let start = self.appointment_time.time();
        let end = match self.start_slot() {
            Ok(slot) => end_time(slot, duration_minutes),
            Err(_) => start,
        };

        BookingDetails {
            booking_id: self.booking_id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            vehicle_type: self.vehicle_type.clone(),
            service_type: self.service_type.clone(),
            service_name,
            addons: self.addons.clone(),
            appointment_time: self.appointment_time,
            payment_method: self.payment_method,
            status: self.status,
            start_time: start.format("%H:%M").to_string(),
            end_time: end.format("%H:%M").to_string(),
            duration_minutes,
            duration_hours: duration_minutes.div_ceil(SLOT_MINUTES),
        }
    }
}

/// What the calendar shows for a booked slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub booking_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub vehicle_type: String,
    pub service_type: String,
    pub service_name: String,
    pub addons: Vec<String>,
    pub appointment_time: NaiveDateTime,
    pub payment_method: PaymentMethod,
    pub status: BookingStatus,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub duration_hours: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStats {
    pub total_bookings: usize,
    pub pending_bookings: usize,
    pub confirmed_bookings: usize,
    pub completed_bookings: usize,
    pub canceled_by_user: usize,
    pub canceled_by_admin: usize,
    pub total_revenue_cents: u64,
    /// Same revenue in dollars, as the admin dashboard displays it.
    pub total_revenue: f64,
}

/// Booking request submitted from the public booking form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(regex(path = *PHONE_REGEX))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(custom(function = "validate_vehicle_type"))]
    pub vehicle_type: String,
    #[validate(custom(function = "validate_service_type"))]
    pub service_type: String,
    #[serde(default)]
    #[validate(custom(function = "validate_addons"))]
    pub addons: Vec<String>,
    pub appointment_time: NaiveDateTime,
    pub payment_method: PaymentMethod,
}

impl NewBooking {
    pub fn into_booking(self, booking_id: Uuid, created_at: DateTime<Utc>) -> Booking {
        Booking {
            booking_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            vehicle_type: self.vehicle_type,
            service_type: self.service_type,
            addons: self.addons,
            appointment_time: self.appointment_time,
            payment_method: self.payment_method,
            status: BookingStatus::PendingPayment,
            created_at,
            hidden: false,
        }
    }
}

/// Admin edit of an existing booking. The customer's email is not editable.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(regex(path = *PHONE_REGEX))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(custom(function = "validate_vehicle_type"))]
    pub vehicle_type: String,
    #[validate(custom(function = "validate_service_type"))]
    pub service_type: String,
    #[serde(default)]
    #[validate(custom(function = "validate_addons"))]
    pub addons: Vec<String>,
    pub appointment_time: NaiveDateTime,
    pub payment_method: PaymentMethod,
    pub status: BookingStatus,
    #[serde(default)]
    pub hidden: bool,
}

impl BookingUpdate {
    pub fn apply_to(self, booking: &mut Booking) {
        booking.name = self.name;
        booking.phone = self.phone;
        booking.address = self.address;
        booking.vehicle_type = self.vehicle_type;
        booking.service_type = self.service_type;
        booking.addons = self.addons;
        booking.appointment_time = self.appointment_time;
        booking.payment_method = self.payment_method;
        booking.status = self.status;
        booking.hidden = self.hidden;
    }
}

fn validate_vehicle_type(vehicle_type: &str) -> Result<(), ValidationError> {
    match catalog::vehicle_label(vehicle_type) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("unknown_vehicle_type")),
    }
}

fn validate_service_type(service_type: &str) -> Result<(), ValidationError> {
    match catalog::service(service_type) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("unknown_service")),
    }
}

fn validate_addons(addons: &[String]) -> Result<(), ValidationError> {
    if addons.iter().all(|addon| catalog::addon(addon).is_some()) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_addon"))
    }
}
