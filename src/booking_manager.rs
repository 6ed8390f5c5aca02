use crate::{
    backend::BookingBackend,
    catalog,
    error::AppError,
    notifier::Notifier,
    slots::{edit_slot_options, required_slots, DaySchedule, Slot, SlotKey, SlotOption, SLOT_MINUTES},
    types::{Availability, Booking, BookingDetails, BookingStats, BookingStatus, BookingUpdate, NewBooking},
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Booking workflows on top of a storage backend. Every change to a booking's
/// time, service or status goes through here so its held slots stay in sync.
#[derive(Clone)]
pub struct BookingManager<T: BookingBackend> {
    backend: T,
    notifier: Arc<dyn Notifier>,
}

fn service_duration(service_type: &str) -> Result<u32, AppError> {
    catalog::service_duration(service_type).ok_or_else(|| AppError::UnknownService(service_type.into()))
}

impl<T: BookingBackend> BookingManager<T> {
    pub fn new(backend: T, notifier: Arc<dyn Notifier>) -> Self {
        Self { backend, notifier }
    }

    fn schedule(&self, date: NaiveDate) -> Result<DaySchedule, AppError> {
        Ok(DaySchedule::new(self.backend.day_availability(date)?))
    }

    fn find(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        self.backend
            .booking(booking_id)?
            .ok_or(AppError::BookingNotFound(booking_id))
    }

    /// Start slots on `date` for `service_type` (one slot when no service is
    /// given). Slots held by `exclude_booking` count as free.
    pub fn start_slots(
        &self,
        date: NaiveDate,
        service_type: Option<&str>,
        exclude_booking: Option<Uuid>,
    ) -> Result<Vec<Slot>, AppError> {
        let duration = match service_type.filter(|service| !service.is_empty()) {
            Some(service) => service_duration(service)?,
            None => SLOT_MINUTES,
        };

        let schedule = self.schedule(date)?;
        if schedule.is_day_blocked() {
            info!(%date, "Day is blocked entirely");
            return Ok(vec![]);
        }
        Ok(schedule.start_slots(duration, exclude_booking)?)
    }

    pub fn create_booking(&self, request: NewBooking, now: NaiveDateTime) -> Result<Booking, AppError> {
        let duration = service_duration(&request.service_type)?;
        if request.appointment_time <= now {
            warn!(appointment_time = %request.appointment_time, "Booking requested in the past");
            return Err(AppError::AppointmentInPast);
        }

        let booking = request.into_booking(Uuid::new_v4(), Utc::now());
        let slots = required_slots(booking.start_slot()?, duration)?;

        self.backend
            .hold_slots(booking.booking_id, booking.date(), &slots)?;
        if let Err(err) = self.backend.insert_booking(&booking) {
            if let Err(release_err) = self.backend.release_slots(booking.booking_id) {
                error!(booking_id = %booking.booking_id, %release_err, "Failed to release slots of unsaved booking");
            }
            return Err(err.into());
        }

        info!(booking_id = %booking.booking_id, appointment_time = %booking.appointment_time, service = %booking.service_type, "Booking created");
        if let Err(err) = self.notifier.booking_created(&booking) {
            warn!(booking_id = %booking.booking_id, %err, "Failed to send booking confirmation");
        }
        Ok(booking)
    }

    pub fn booking(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        self.find(booking_id)
    }

    pub fn bookings(&self, include_hidden: bool, now: NaiveDateTime) -> Result<Vec<Booking>, AppError> {
        self.complete_past_appointments(now)?;
        Ok(self
            .backend
            .bookings()?
            .into_iter()
            .filter(|booking| include_hidden || !booking.hidden)
            .collect())
    }

    /// Active bookings whose appointment has started are marked completed and
    /// give their slots back.
    pub fn complete_past_appointments(&self, now: NaiveDateTime) -> Result<usize, AppError> {
        let mut completed = 0;
        for mut booking in self.backend.bookings()? {
            if booking.status.holds_slots() && booking.appointment_time < now {
                self.backend.release_slots(booking.booking_id)?;
                booking.status = BookingStatus::Completed;
                self.backend.save_booking(&booking)?;
                completed += 1;
            }
        }
        if completed > 0 {
            info!(completed, "Marked past appointments as completed");
        }
        Ok(completed)
    }

    pub fn cancel_by_customer(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        let mut booking = self.find(booking_id)?;
        match booking.status {
            BookingStatus::Completed => {
                Err(AppError::InvalidTransition("Completed bookings can't be canceled"))
            }
            status if status.is_canceled() => Ok(booking),
            _ => {
                self.backend.release_slots(booking_id)?;
                booking.status = BookingStatus::CanceledByUser;
                self.backend.save_booking(&booking)?;
                info!(%booking_id, "Booking canceled by customer");
                Ok(booking)
            }
        }
    }

    pub fn cancel_by_admin(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        let mut booking = self.find(booking_id)?;
        if booking.status.holds_slots() {
            self.backend.release_slots(booking_id)?;
        }
        booking.status = BookingStatus::CanceledByAdmin;
        self.backend.save_booking(&booking)?;
        info!(%booking_id, "Booking canceled by admin");
        Ok(booking)
    }

    /// Applies an admin edit. When the edited booking ends up holding slots and
    /// its time, service or activity changed, the new span is derived again and
    /// held in one step; the booking's own current slots don't count as taken.
    pub fn update_booking(&self, booking_id: Uuid, update: BookingUpdate) -> Result<Booking, AppError> {
        let existing = self.find(booking_id)?;
        let duration = service_duration(&update.service_type)?;

        let mut updated = existing.clone();
        update.apply_to(&mut updated);

        let rescheduled = existing.appointment_time != updated.appointment_time
            || existing.service_type != updated.service_type;
        let held_before = existing.status.holds_slots();
        let previous_slots = match held_before {
            true => self.current_slots(booking_id)?,
            false => vec![],
        };

        let slots_changed = match (held_before, updated.status.holds_slots()) {
            (_, true) if rescheduled || !held_before => {
                let slots = required_slots(updated.start_slot()?, duration)?;
                if let Err(err) = self.backend.hold_slots(booking_id, updated.date(), &slots) {
                    warn!(%booking_id, %err, "Rejected booking edit");
                    return Err(err.into());
                }
                true
            }
            (true, false) => {
                self.backend.release_slots(booking_id)?;
                true
            }
            _ => false,
        };

        if let Err(err) = self.backend.save_booking(&updated) {
            if slots_changed {
                self.restore_slots(&existing, &previous_slots);
            }
            return Err(err.into());
        }
        info!(%booking_id, status = updated.status.as_str(), appointment_time = %updated.appointment_time, "Booking updated");

        if existing.status != updated.status {
            if let Err(err) = self.notifier.status_changed(&updated, existing.status) {
                warn!(%booking_id, %err, "Failed to send status update");
            }
        }
        Ok(updated)
    }

    /// Puts back the slots `booking` held before an edit that could not be saved.
    fn restore_slots(&self, booking: &Booking, slots: &[Slot]) {
        let restored = match slots.is_empty() {
            true => self.backend.release_slots(booking.booking_id),
            false => self
                .backend
                .hold_slots(booking.booking_id, booking.date(), slots),
        };
        if let Err(err) = restored {
            error!(booking_id = %booking.booking_id, %err, "Failed to restore slots after a failed save");
        }
    }

    pub fn hide_booking(&self, booking_id: Uuid) -> Result<(), AppError> {
        let mut booking = self.find(booking_id)?;
        booking.hidden = true;
        self.backend.save_booking(&booking)?;
        Ok(())
    }

    /// Hides every completed or canceled booking, returning how many were hidden.
    pub fn cleanup_bookings(&self) -> Result<usize, AppError> {
        let mut hidden = 0;
        for mut booking in self.backend.bookings()? {
            let finished =
                booking.status == BookingStatus::Completed || booking.status.is_canceled();
            if finished && !booking.hidden {
                booking.hidden = true;
                self.backend.save_booking(&booking)?;
                hidden += 1;
            }
        }
        info!(hidden, "Hid finished bookings");
        Ok(hidden)
    }

    pub fn stats(&self, now: NaiveDateTime) -> Result<BookingStats, AppError> {
        self.complete_past_appointments(now)?;

        let mut stats = BookingStats::default();
        for booking in self.backend.bookings()? {
            stats.total_bookings += 1;
            match booking.status {
                BookingStatus::PendingPayment => stats.pending_bookings += 1,
                BookingStatus::Confirmed => stats.confirmed_bookings += 1,
                BookingStatus::Completed => stats.completed_bookings += 1,
                BookingStatus::CanceledByUser => stats.canceled_by_user += 1,
                BookingStatus::CanceledByAdmin => stats.canceled_by_admin += 1,
            }
            if matches!(booking.status, BookingStatus::Confirmed | BookingStatus::Completed) {
                stats.total_revenue_cents += u64::from(booking.total_price_cents());
            }
        }
        stats.total_revenue = stats.total_revenue_cents as f64 / 100.0;
        Ok(stats)
    }

    pub fn quote(&self, service_type: &str, addons: &[String]) -> Result<u32, AppError> {
        service_duration(service_type)?;
        if let Some(unknown) = addons.iter().find(|addon| catalog::addon(addon).is_none()) {
            return Err(AppError::UnknownAddon(unknown.clone()));
        }
        Ok(catalog::total_price_cents(service_type, addons))
    }

    pub fn day_availability(&self, date: NaiveDate) -> Result<Vec<Availability>, AppError> {
        let mut entries = self.backend.day_availability(date)?;
        entries.sort_unstable_by_key(|entry| entry.slot);
        Ok(entries)
    }

    pub fn block_day(&self, date: NaiveDate, reason: Option<String>) -> Result<(), AppError> {
        self.backend.block(date, SlotKey::AllDay, reason)?;
        info!(%date, "Day blocked");
        Ok(())
    }

    pub fn unblock_day(&self, date: NaiveDate) -> Result<(), AppError> {
        self.backend.unblock(date, SlotKey::AllDay)?;
        info!(%date, "Day unblocked");
        Ok(())
    }

    pub fn block_slot(&self, date: NaiveDate, slot: Slot, reason: Option<String>) -> Result<(), AppError> {
        self.backend.block(date, SlotKey::At(slot), reason)?;
        info!(%date, %slot, "Slot blocked");
        Ok(())
    }

    pub fn unblock_slot(&self, date: NaiveDate, slot: Slot) -> Result<(), AppError> {
        self.backend.unblock(date, SlotKey::At(slot))?;
        info!(%date, %slot, "Slot unblocked");
        Ok(())
    }

    pub fn current_slots(&self, booking_id: Uuid) -> Result<Vec<Slot>, AppError> {
        let mut slots: Vec<Slot> = self
            .backend
            .booking_slots(booking_id)?
            .into_iter()
            .filter_map(|entry| match entry.slot {
                SlotKey::At(slot) => Some(slot),
                SlotKey::AllDay => None,
            })
            .collect();
        slots.sort_unstable();
        Ok(slots)
    }

    /// Time choices for moving a booking to `date`, possibly with another service.
    pub fn edit_slot_options(
        &self,
        booking_id: Uuid,
        date: NaiveDate,
        service_type: Option<&str>,
    ) -> Result<Vec<SlotOption>, AppError> {
        let booking = self.find(booking_id)?;
        let service_type = service_type
            .filter(|service| !service.is_empty())
            .unwrap_or(&booking.service_type);
        let available = self.start_slots(date, Some(service_type), Some(booking_id))?;

        let (held, held_start) = if booking.date() == date && booking.status.holds_slots() {
            (self.current_slots(booking_id)?, booking.start_slot().ok())
        } else {
            (vec![], None)
        };
        Ok(edit_slot_options(&available, &held, held_start))
    }

    /// The booking occupying `slot` on `date`, if any.
    pub fn booking_details(&self, date: NaiveDate, slot: Slot) -> Result<Option<BookingDetails>, AppError> {
        let schedule = self.schedule(date)?;
        let Some(booking_id) = schedule
            .entry(SlotKey::At(slot))
            .and_then(|entry| entry.booking_id)
        else {
            return Ok(None);
        };
        Ok(self.backend.booking(booking_id)?.map(|booking| booking.details()))
    }
}
