use std::{
    collections::HashMap,
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::{
    backend::{BackendError, BookingBackend},
    configuration::Configuration,
    local_storage::LocalStorage,
    notifier::{MailSettings, Notifier, NotifyError},
    slots::{Slot, SlotKey},
    types::{Availability, Booking, BookingStatus, NewBooking, PaymentMethod},
};

pub const ADMIN_PASSWORD: &str = "123";
pub const FRONTEND_CONTENT: &str = "<!DOCTYPE html><title>Earned Shine</title>";

pub struct MockBackendInner {
    pub success: AtomicBool,
    pub calls_to_day_availability: AtomicU64,
    pub calls_to_booking_slots: AtomicU64,
    pub calls_to_block: AtomicU64,
    pub calls_to_unblock: AtomicU64,
    pub calls_to_hold_slots: AtomicU64,
    pub calls_to_release_slots: AtomicU64,
    pub calls_to_insert_booking: AtomicU64,
    pub calls_to_booking: AtomicU64,
    pub calls_to_bookings: AtomicU64,
    pub calls_to_save_booking: AtomicU64,
    pub bookings: Mutex<HashMap<Uuid, Booking>>,
}

/// Counts calls and answers from a fixed set of bookings. Every operation fails
/// once `success` is cleared.
#[derive(Clone)]
pub struct MockBackend(pub Arc<MockBackendInner>);

impl MockBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_day_availability: AtomicU64::default(),
            calls_to_booking_slots: AtomicU64::default(),
            calls_to_block: AtomicU64::default(),
            calls_to_unblock: AtomicU64::default(),
            calls_to_hold_slots: AtomicU64::default(),
            calls_to_release_slots: AtomicU64::default(),
            calls_to_insert_booking: AtomicU64::default(),
            calls_to_booking: AtomicU64::default(),
            calls_to_bookings: AtomicU64::default(),
            calls_to_save_booking: AtomicU64::default(),
            bookings: Mutex::default(),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockBackendInner::new()))
    }

    fn result(&self) -> Result<(), BackendError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(BackendError::Corrupt("Supposed to fail".into())),
        }
    }
}

impl BookingBackend for MockBackend {
    fn day_availability(&self, _date: NaiveDate) -> Result<Vec<Availability>, BackendError> {
        self.0
            .calls_to_day_availability
            .fetch_add(1, Ordering::SeqCst);
        self.result().map(|_| vec![])
    }

    fn booking_slots(&self, _booking_id: Uuid) -> Result<Vec<Availability>, BackendError> {
        self.0.calls_to_booking_slots.fetch_add(1, Ordering::SeqCst);
        self.result().map(|_| vec![])
    }

    fn block(
        &self,
        _date: NaiveDate,
        _key: SlotKey,
        _reason: Option<String>,
    ) -> Result<(), BackendError> {
        self.0.calls_to_block.fetch_add(1, Ordering::SeqCst);
        self.result()
    }

    fn unblock(&self, _date: NaiveDate, _key: SlotKey) -> Result<(), BackendError> {
        self.0.calls_to_unblock.fetch_add(1, Ordering::SeqCst);
        self.result()
    }

    fn hold_slots(
        &self,
        _booking_id: Uuid,
        _date: NaiveDate,
        _slots: &[Slot],
    ) -> Result<(), BackendError> {
        self.0.calls_to_hold_slots.fetch_add(1, Ordering::SeqCst);
        self.result()
    }

    fn release_slots(&self, _booking_id: Uuid) -> Result<(), BackendError> {
        self.0.calls_to_release_slots.fetch_add(1, Ordering::SeqCst);
        self.result()
    }

    fn insert_booking(&self, booking: &Booking) -> Result<(), BackendError> {
        self.0.calls_to_insert_booking.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0
            .bookings
            .lock()
            .unwrap()
            .insert(booking.booking_id, booking.clone());
        Ok(())
    }

    fn booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BackendError> {
        self.0.calls_to_booking.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.bookings.lock().unwrap().get(&booking_id).cloned())
    }

    fn bookings(&self) -> Result<Vec<Booking>, BackendError> {
        self.0.calls_to_bookings.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.bookings.lock().unwrap().values().cloned().collect())
    }

    fn save_booking(&self, booking: &Booking) -> Result<(), BackendError> {
        self.0.calls_to_save_booking.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0
            .bookings
            .lock()
            .unwrap()
            .insert(booking.booking_id, booking.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct TestConfiguration {
    frontend: Arc<NamedTempFile>,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        let mut frontend = NamedTempFile::new().unwrap();
        frontend.write_all(FRONTEND_CONTENT.as_bytes()).unwrap();
        Self {
            frontend: Arc::new(frontend),
        }
    }
}

impl Configuration for TestConfiguration {
    fn admin_password(&self) -> String {
        ADMIN_PASSWORD.into()
    }

    fn frontend_path(&self) -> PathBuf {
        self.frontend.path().to_path_buf()
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn port(&self) -> u16 {
        0
    }

    fn cors_origin(&self) -> Option<String> {
        None
    }

    fn mail_settings(&self) -> Option<MailSettings> {
        None
    }
}

pub struct MockNotifierInner {
    pub success: AtomicBool,
    pub calls_to_booking_created: AtomicU64,
    pub calls_to_status_changed: AtomicU64,
    pub previous_statuses: Mutex<Vec<BookingStatus>>,
}

/// Counts notifications. Every send fails once `success` is cleared.
#[derive(Clone)]
pub struct MockNotifier(pub Arc<MockNotifierInner>);

impl MockNotifier {
    pub fn new() -> Self {
        Self(Arc::new(MockNotifierInner {
            success: AtomicBool::new(true),
            calls_to_booking_created: AtomicU64::default(),
            calls_to_status_changed: AtomicU64::default(),
            previous_statuses: Mutex::default(),
        }))
    }

    fn result(&self) -> Result<(), NotifyError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(NotifyError::Invalid("Supposed to fail".into())),
        }
    }
}

impl Notifier for MockNotifier {
    fn booking_created(&self, _booking: &Booking) -> Result<(), NotifyError> {
        self.0.calls_to_booking_created.fetch_add(1, Ordering::SeqCst);
        self.result()
    }

    fn status_changed(&self, _booking: &Booking, previous: BookingStatus) -> Result<(), NotifyError> {
        self.0.calls_to_status_changed.fetch_add(1, Ordering::SeqCst);
        self.0.previous_statuses.lock().unwrap().push(previous);
        self.result()
    }
}

/// In-memory backend whose writes can be made to fail one kind at a time.
#[derive(Clone, Default)]
pub struct FlakyStorage {
    pub storage: LocalStorage,
    pub fail_inserts: Arc<AtomicBool>,
    pub fail_releases: Arc<AtomicBool>,
    pub fail_saves: Arc<AtomicBool>,
}

fn flaky(fail: &AtomicBool, operation: &str) -> Result<(), BackendError> {
    match fail.load(Ordering::SeqCst) {
        true => Err(BackendError::Corrupt(format!("{operation} supposed to fail"))),
        false => Ok(()),
    }
}

impl BookingBackend for FlakyStorage {
    fn day_availability(&self, date: NaiveDate) -> Result<Vec<Availability>, BackendError> {
        self.storage.day_availability(date)
    }

    fn booking_slots(&self, booking_id: Uuid) -> Result<Vec<Availability>, BackendError> {
        self.storage.booking_slots(booking_id)
    }

    fn block(&self, date: NaiveDate, key: SlotKey, reason: Option<String>) -> Result<(), BackendError> {
        self.storage.block(date, key, reason)
    }

    fn unblock(&self, date: NaiveDate, key: SlotKey) -> Result<(), BackendError> {
        self.storage.unblock(date, key)
    }

    fn hold_slots(&self, booking_id: Uuid, date: NaiveDate, slots: &[Slot]) -> Result<(), BackendError> {
        self.storage.hold_slots(booking_id, date, slots)
    }

    fn release_slots(&self, booking_id: Uuid) -> Result<(), BackendError> {
        flaky(&self.fail_releases, "Release")?;
        self.storage.release_slots(booking_id)
    }

    fn insert_booking(&self, booking: &Booking) -> Result<(), BackendError> {
        flaky(&self.fail_inserts, "Insert")?;
        self.storage.insert_booking(booking)
    }

    fn booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BackendError> {
        self.storage.booking(booking_id)
    }

    fn bookings(&self) -> Result<Vec<Booking>, BackendError> {
        self.storage.bookings()
    }

    fn save_booking(&self, booking: &Booking) -> Result<(), BackendError> {
        flaky(&self.fail_saves, "Save")?;
        self.storage.save_booking(booking)
    }
}

pub fn new_booking_request(service_type: &str, appointment_time: NaiveDateTime) -> NewBooking {
    NewBooking {
        name: "Jordan Reyes".into(),
        email: "jordan@example.com".into(),
        phone: "+1 555 010 2030".into(),
        address: "12 Harbor Lane".into(),
        vehicle_type: "sedan".into(),
        service_type: service_type.into(),
        addons: vec!["pet_hair_removal".into()],
        appointment_time,
        payment_method: PaymentMethod::Online,
    }
}

pub fn example_booking(appointment_time: NaiveDateTime) -> Booking {
    Booking {
        status: BookingStatus::Confirmed,
        ..new_booking_request("full_interior", appointment_time).into_booking(Uuid::new_v4(), Utc::now())
    }
}
