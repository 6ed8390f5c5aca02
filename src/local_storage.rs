use crate::{
    backend::{lock, BackendError, BookingBackend},
    slots::{DaySchedule, Slot, SlotKey},
    types::{Availability, Booking, SlotStatus},
};
use chrono::NaiveDate;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};
use tracing::{debug, error};
use uuid::Uuid;

/// Keeps availability and bookings in memory. Everything is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    availability: Arc<Mutex<BTreeMap<(NaiveDate, SlotKey), Availability>>>,
    bookings: Arc<Mutex<HashMap<Uuid, Booking>>>,
}

fn day_entries(
    availability: &BTreeMap<(NaiveDate, SlotKey), Availability>,
    date: NaiveDate,
) -> Vec<Availability> {
    availability
        .range((date, SlotKey::AllDay)..)
        .take_while(|((entry_date, _), _)| *entry_date == date)
        .map(|(_, entry)| entry.clone())
        .collect()
}

impl BookingBackend for LocalStorage {
    fn day_availability(&self, date: NaiveDate) -> Result<Vec<Availability>, BackendError> {
        Ok(day_entries(&lock(&self.availability), date))
    }

    fn booking_slots(&self, booking_id: Uuid) -> Result<Vec<Availability>, BackendError> {
        Ok(lock(&self.availability)
            .values()
            .filter(|entry| {
                entry.status == SlotStatus::Booked && entry.booking_id == Some(booking_id)
            })
            .cloned()
            .collect())
    }

    fn block(
        &self,
        date: NaiveDate,
        key: SlotKey,
        reason: Option<String>,
    ) -> Result<(), BackendError> {
        let mut availability = lock(&self.availability);
        if let Some(existing) = availability.get(&(date, key)) {
            if key != SlotKey::AllDay && existing.status == SlotStatus::Booked {
                let err = BackendError::SlotTaken { date, slot: key };
                error!(%err, "Refusing to block a booked slot");
                return Err(err);
            }
        }
        availability.insert((date, key), Availability::blocked(date, key, reason));
        Ok(())
    }

    fn unblock(&self, date: NaiveDate, key: SlotKey) -> Result<(), BackendError> {
        let mut availability = lock(&self.availability);
        match availability.get(&(date, key)) {
            Some(existing) if existing.status == SlotStatus::Booked => {
                Err(BackendError::SlotTaken { date, slot: key })
            }
            Some(_) => {
                availability.remove(&(date, key));
                Ok(())
            }
            None => {
                debug!(%date, %key, "Nothing to unblock");
                Ok(())
            }
        }
    }

    fn hold_slots(
        &self,
        booking_id: Uuid,
        date: NaiveDate,
        slots: &[Slot],
    ) -> Result<(), BackendError> {
        let mut availability = lock(&self.availability);

        let schedule = DaySchedule::new(day_entries(&availability, date));
        if let Some(slot) = schedule.first_conflict(slots, Some(booking_id)) {
            return Err(BackendError::SlotTaken { date, slot });
        }

        availability.retain(|_, entry| {
            !(entry.status == SlotStatus::Booked && entry.booking_id == Some(booking_id))
        });
        for slot in slots {
            availability.insert(
                (date, SlotKey::At(*slot)),
                Availability::booked(date, *slot, booking_id),
            );
        }
        Ok(())
    }

    fn release_slots(&self, booking_id: Uuid) -> Result<(), BackendError> {
        lock(&self.availability).retain(|_, entry| {
            !(entry.status == SlotStatus::Booked && entry.booking_id == Some(booking_id))
        });
        Ok(())
    }

    fn insert_booking(&self, booking: &Booking) -> Result<(), BackendError> {
        let mut bookings = lock(&self.bookings);
        if bookings.contains_key(&booking.booking_id) {
            return Err(BackendError::DuplicateBooking(booking.booking_id));
        }
        bookings.insert(booking.booking_id, booking.clone());
        Ok(())
    }

    fn booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BackendError> {
        Ok(lock(&self.bookings).get(&booking_id).cloned())
    }

    fn bookings(&self) -> Result<Vec<Booking>, BackendError> {
        let mut bookings: Vec<Booking> = lock(&self.bookings).values().cloned().collect();
        bookings.sort_unstable_by(|a, b| a.appointment_time.cmp(&b.appointment_time));
        Ok(bookings)
    }

    fn save_booking(&self, booking: &Booking) -> Result<(), BackendError> {
        match lock(&self.bookings).get_mut(&booking.booking_id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(BackendError::BookingNotFound(booking.booking_id)),
        }
    }
}
