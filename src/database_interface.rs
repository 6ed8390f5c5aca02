use crate::{
    backend::{lock, BackendError, BookingBackend},
    schema::{availability, bookings},
    slots::{DaySchedule, Slot, SlotKey},
    types::{Availability, Booking, BookingStatus, PaymentMethod, SlotStatus, UnknownVariant},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::{
    pg::Pg,
    result::{DatabaseErrorKind, Error as DieselError},
    AsChangeset, Connection, ConnectionError, ExpressionMethods, Insertable, OptionalExtension, PgConnection,
    QueryDsl, Queryable, RunQueryDsl, Selectable, SelectableHelper,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = availability)]
#[diesel(primary_key(date, slot))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(Pg))]
struct AvailabilityRow {
    date: NaiveDate,
    slot: String,
    status: String,
    reason: Option<String>,
    booking_id: Option<Uuid>,
}

impl From<&Availability> for AvailabilityRow {
    fn from(entry: &Availability) -> Self {
        Self {
            date: entry.date,
            slot: entry.slot.to_string(),
            status: entry.status.as_str().into(),
            reason: entry.reason.clone(),
            booking_id: entry.booking_id,
        }
    }
}

impl TryFrom<AvailabilityRow> for Availability {
    type Error = BackendError;

    fn try_from(row: AvailabilityRow) -> Result<Self, Self::Error> {
        Ok(Self {
            date: row.date,
            slot: row
                .slot
                .parse::<SlotKey>()
                .map_err(|err| BackendError::Corrupt(format!("availability slot: {err}")))?,
            status: row
                .status
                .parse::<SlotStatus>()
                .map_err(|err| BackendError::Corrupt(format!("availability: {err}")))?,
            reason: row.reason,
            booking_id: row.booking_id,
        })
    }
}

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = bookings)]
#[diesel(primary_key(booking_id))]
#[diesel(check_for_backend(Pg))]
struct BookingRow {
    booking_id: Uuid,
    name: String,
    email: String,
    phone: String,
    address: String,
    vehicle_type: String,
    service_type: String,
    addons: Vec<String>,
    appointment_time: NaiveDateTime,
    payment_method: String,
    status: String,
    created_at: DateTime<Utc>,
    hidden: bool,
}

impl From<&Booking> for BookingRow {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.booking_id,
            name: booking.name.clone(),
            email: booking.email.clone(),
            phone: booking.phone.clone(),
            address: booking.address.clone(),
            vehicle_type: booking.vehicle_type.clone(),
            service_type: booking.service_type.clone(),
            addons: booking.addons.clone(),
            appointment_time: booking.appointment_time,
            payment_method: booking.payment_method.as_str().into(),
            status: booking.status.as_str().into(),
            created_at: booking.created_at,
            hidden: booking.hidden,
        }
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = BackendError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let booking_id = row.booking_id;
        let corrupt =
            |err: UnknownVariant| BackendError::Corrupt(format!("booking {booking_id}: {err}"));
        Ok(Self {
            payment_method: row.payment_method.parse::<PaymentMethod>().map_err(corrupt)?,
            status: row.status.parse::<BookingStatus>().map_err(corrupt)?,
            booking_id: row.booking_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            vehicle_type: row.vehicle_type,
            service_type: row.service_type,
            addons: row.addons,
            appointment_time: row.appointment_time,
            created_at: row.created_at,
            hidden: row.hidden,
        })
    }
}

fn load_day(connection: &mut PgConnection, date: NaiveDate) -> Result<Vec<Availability>, BackendError> {
    availability::table
        .filter(availability::date.eq(date))
        .select(AvailabilityRow::as_select())
        .load(connection)?
        .into_iter()
        .map(Availability::try_from)
        .collect()
}

fn load_entry(
    connection: &mut PgConnection,
    date: NaiveDate,
    key: SlotKey,
) -> Result<Option<Availability>, BackendError> {
    availability::table
        .find((date, key.to_string()))
        .select(AvailabilityRow::as_select())
        .first(connection)
        .optional()?
        .map(Availability::try_from)
        .transpose()
}

fn upsert(connection: &mut PgConnection, entry: &Availability) -> Result<(), BackendError> {
    let row = AvailabilityRow::from(entry);
    diesel::insert_into(availability::table)
        .values(&row)
        .on_conflict((availability::date, availability::slot))
        .do_update()
        .set(&row)
        .execute(connection)?;
    Ok(())
}

fn delete_holds(connection: &mut PgConnection, booking_id: Uuid) -> Result<usize, BackendError> {
    Ok(diesel::delete(
        availability::table
            .filter(availability::booking_id.eq(booking_id))
            .filter(availability::status.eq(SlotStatus::Booked.as_str())),
    )
    .execute(connection)?)
}

/// PostgreSQL storage. Tables are created by the migrations in `migrations/`.
#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, ConnectionError> {
        let connection = Self::establish_connection(database_url)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, ConnectionError> {
        PgConnection::establish(database_url)
    }

    #[cfg(test)]
    fn clear(&self) {
        let mut connection = lock(&self.connection);
        diesel::delete(availability::table)
            .execute(&mut *connection)
            .unwrap();
        diesel::delete(bookings::table)
            .execute(&mut *connection)
            .unwrap();
    }
}

impl BookingBackend for DatabaseInterface {
    fn day_availability(&self, date: NaiveDate) -> Result<Vec<Availability>, BackendError> {
        load_day(&mut lock(&self.connection), date)
    }

    fn booking_slots(&self, booking_id: Uuid) -> Result<Vec<Availability>, BackendError> {
        let mut connection = lock(&self.connection);
        availability::table
            .filter(availability::booking_id.eq(booking_id))
            .filter(availability::status.eq(SlotStatus::Booked.as_str()))
            .order((availability::date, availability::slot))
            .select(AvailabilityRow::as_select())
            .load(&mut *connection)?
            .into_iter()
            .map(Availability::try_from)
            .collect()
    }

    fn block(
        &self,
        date: NaiveDate,
        key: SlotKey,
        reason: Option<String>,
    ) -> Result<(), BackendError> {
        let mut connection = lock(&self.connection);
        connection.transaction(|connection| {
            if let Some(existing) = load_entry(connection, date, key)? {
                if key != SlotKey::AllDay && existing.status == SlotStatus::Booked {
                    let err = BackendError::SlotTaken { date, slot: key };
                    error!(%err, "Refusing to block a booked slot");
                    return Err(err);
                }
            }
            upsert(connection, &Availability::blocked(date, key, reason))
        })
    }

    fn unblock(&self, date: NaiveDate, key: SlotKey) -> Result<(), BackendError> {
        let mut connection = lock(&self.connection);
        connection.transaction(|connection| match load_entry(connection, date, key)? {
            Some(existing) if existing.status == SlotStatus::Booked => {
                Err(BackendError::SlotTaken { date, slot: key })
            }
            Some(_) => {
                diesel::delete(availability::table.find((date, key.to_string())))
                    .execute(connection)?;
                Ok(())
            }
            None => {
                debug!(%date, %key, "Nothing to unblock");
                Ok(())
            }
        })
    }

    fn hold_slots(
        &self,
        booking_id: Uuid,
        date: NaiveDate,
        slots: &[Slot],
    ) -> Result<(), BackendError> {
        let mut connection = lock(&self.connection);
        connection.transaction(|connection| {
            let schedule = DaySchedule::new(load_day(connection, date)?);
            if let Some(slot) = schedule.first_conflict(slots, Some(booking_id)) {
                return Err(BackendError::SlotTaken { date, slot });
            }

            delete_holds(connection, booking_id)?;
            for slot in slots {
                upsert(connection, &Availability::booked(date, *slot, booking_id))?;
            }
            Ok(())
        })
    }

    fn release_slots(&self, booking_id: Uuid) -> Result<(), BackendError> {
        let released = delete_holds(&mut lock(&self.connection), booking_id)?;
        debug!(%booking_id, released, "Released slots");
        Ok(())
    }

    fn insert_booking(&self, booking: &Booking) -> Result<(), BackendError> {
        let mut connection = lock(&self.connection);
        let result = diesel::insert_into(bookings::table)
            .values(BookingRow::from(booking))
            .execute(&mut *connection);

        match result {
            Ok(_) => Ok(()),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(BackendError::DuplicateBooking(booking.booking_id))
            }
            Err(err) => {
                error!(%err, booking_id = %booking.booking_id, "Booking can't be stored");
                Err(err.into())
            }
        }
    }

    fn booking(&self, booking_id: Uuid) -> Result<Option<Booking>, BackendError> {
        let mut connection = lock(&self.connection);
        bookings::table
            .find(booking_id)
            .select(BookingRow::as_select())
            .first(&mut *connection)
            .optional()?
            .map(Booking::try_from)
            .transpose()
    }

    fn bookings(&self) -> Result<Vec<Booking>, BackendError> {
        let mut connection = lock(&self.connection);
        bookings::table
            .order(bookings::appointment_time.asc())
            .select(BookingRow::as_select())
            .load(&mut *connection)?
            .into_iter()
            .map(Booking::try_from)
            .collect()
    }

    fn save_booking(&self, booking: &Booking) -> Result<(), BackendError> {
        let mut connection = lock(&self.connection);
        let updated = diesel::update(bookings::table.find(booking.booking_id))
            .set(&BookingRow::from(booking))
            .execute(&mut *connection)?;

        match updated {
            0 => Err(BackendError::BookingNotFound(booking.booking_id)),
            _ => Ok(()),
        }
    }
}
