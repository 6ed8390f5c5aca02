use crate::{
    slots::{Slot, SlotKey},
    types::{Availability, Booking},
};
use chrono::NaiveDate;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("booking {0} does not exist")]
    BookingNotFound(Uuid),
    #[error("booking {0} already exists")]
    DuplicateBooking(Uuid),
    #[error("slot {slot} on {date} is not free")]
    SlotTaken { date: NaiveDate, slot: SlotKey },
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Storage for availability entries and bookings.
pub trait BookingBackend: Clone + Send + Sync + 'static {
    fn day_availability(&self, date: NaiveDate) -> Result<Vec<Availability>, BackendError>;
    /// Entries currently booked by `booking_id`.
    fn booking_slots(&self, booking_id: Uuid) -> Result<Vec<Availability>, BackendError>;
    /// Fails with `SlotTaken` when a single slot is already booked.
    fn block(&self, date: NaiveDate, key: SlotKey, reason: Option<String>)
        -> Result<(), BackendError>;
    /// Removes a block. Booked slots are left alone and reported as taken.
    fn unblock(&self, date: NaiveDate, key: SlotKey) -> Result<(), BackendError>;
    /// Replaces everything `booking_id` holds with `slots` on `date`. Nothing
    /// changes when any of `slots` is not free for this booking.
    fn hold_slots(&self, booking_id: Uuid, date: NaiveDate, slots: &[Slot])
        -> Result<(), BackendError>;
    fn release_slots(&self, booking_id: Uuid) -> Result<(), BackendError>;
    fn insert_booking(&self, booking: &Booking) -> Result<(), BackendError>;
    fn booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BackendError>;
    fn bookings(&self) -> Result<Vec<Booking>, BackendError>;
    fn save_booking(&self, booking: &Booking) -> Result<(), BackendError>;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
