//! Slot derivation.
//!
//! Appointments start on one of the working-hour slots and occupy as many
//! contiguous one-hour slots as their service duration needs. Everything in
//! here is pure: callers hand in a day's availability entries and get back the
//! slots a booking would occupy, whether they are free, or which start slots
//! can be offered.

use crate::types::{Availability, SlotStatus};
use chrono::{Duration, NaiveTime, Timelike};
use lazy_static::lazy_static;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::HashMap, fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

pub const SLOT_MINUTES: u32 = 60;
const FIRST_SLOT_HOUR: u32 = 8;
const LAST_SLOT_HOUR: u32 = 18;
const ALL_DAY: &str = "ALL_DAY";
const SLOT_FORMAT: &str = "%H:%M";

lazy_static! {
    /// Start times of all bookable slots, in order.
    pub static ref WORKING_HOURS: Vec<Slot> = (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .map(Slot)
        .collect();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("{0} is not a bookable slot")]
    NotASlot(String),
    #[error("service duration must be at least one minute")]
    InvalidDuration,
    #[error("an appointment of {duration_minutes} minutes starting at {start} runs past the working day")]
    ExceedsWorkingDay { start: Slot, duration_minutes: u32 },
}

/// A working-hour slot, identified by its start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(NaiveTime);

impl Slot {
    pub fn from_time(time: NaiveTime) -> Result<Self, SlotError> {
        let slot = Slot(time);
        if time.second() != 0 || time.nanosecond() != 0 || !WORKING_HOURS.contains(&slot) {
            return Err(SlotError::NotASlot(time.format("%H:%M:%S").to_string()));
        }
        Ok(slot)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    fn index(&self) -> usize {
        WORKING_HOURS
            .iter()
            .position(|slot| slot == self)
            .unwrap_or_default()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(SLOT_FORMAT))
    }
}

impl FromStr for Slot {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let time = NaiveTime::parse_from_str(s, SLOT_FORMAT)
            .map_err(|_| SlotError::NotASlot(s.to_string()))?;
        Slot::from_time(time)
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Slot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Key of an availability entry: a single slot or the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotKey {
    AllDay,
    At(Slot),
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::AllDay => f.write_str(ALL_DAY),
            SlotKey::At(slot) => slot.fmt(f),
        }
    }
}

impl FromStr for SlotKey {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ALL_DAY => Ok(SlotKey::AllDay),
            other => other.parse().map(SlotKey::At),
        }
    }
}

impl Serialize for SlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

pub fn slots_needed(duration_minutes: u32) -> Result<usize, SlotError> {
    if duration_minutes == 0 {
        return Err(SlotError::InvalidDuration);
    }
    Ok(duration_minutes.div_ceil(SLOT_MINUTES) as usize)
}

/// Contiguous slots occupied by an appointment of `duration_minutes` starting at `start`.
pub fn required_slots(start: Slot, duration_minutes: u32) -> Result<Vec<Slot>, SlotError> {
    let needed = slots_needed(duration_minutes)?;
    let first = start.index();
    WORKING_HOURS
        .get(first..first + needed)
        .map(<[Slot]>::to_vec)
        .ok_or(SlotError::ExceedsWorkingDay {
            start,
            duration_minutes,
        })
}

pub fn end_time(start: Slot, duration_minutes: u32) -> NaiveTime {
    start.time() + Duration::minutes(i64::from(duration_minutes))
}

/// One day's availability entries.
#[derive(Debug, Clone, Default)]
pub struct DaySchedule {
    entries: HashMap<SlotKey, Availability>,
}

impl DaySchedule {
    pub fn new(entries: impl IntoIterator<Item = Availability>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.slot, entry))
                .collect(),
        }
    }

    pub fn entry(&self, key: SlotKey) -> Option<&Availability> {
        self.entries.get(&key)
    }

    pub fn is_day_blocked(&self) -> bool {
        self.entries
            .get(&SlotKey::AllDay)
            .is_some_and(|entry| entry.status != SlotStatus::Available)
    }

    /// A slot booked by `exclude_booking` counts as free, so an edited booking
    /// never collides with itself.
    pub fn is_free(&self, slot: Slot, exclude_booking: Option<Uuid>) -> bool {
        if self.is_day_blocked() {
            return false;
        }
        match self.entries.get(&SlotKey::At(slot)) {
            None => true,
            Some(entry) => match entry.status {
                SlotStatus::Available => true,
                SlotStatus::Booked => {
                    exclude_booking.is_some() && entry.booking_id == exclude_booking
                }
                SlotStatus::Blocked => false,
            },
        }
    }

    /// First entry standing in the way of `slots`, if any.
    pub fn first_conflict(&self, slots: &[Slot], exclude_booking: Option<Uuid>) -> Option<SlotKey> {
        if self.is_day_blocked() {
            return Some(SlotKey::AllDay);
        }
        slots
            .iter()
            .find(|slot| !self.is_free(**slot, exclude_booking))
            .map(|slot| SlotKey::At(*slot))
    }

    pub fn is_span_free(&self, slots: &[Slot], exclude_booking: Option<Uuid>) -> bool {
        self.first_conflict(slots, exclude_booking).is_none()
    }

    /// Every start slot whose whole span fits into the working day and is free.
    pub fn start_slots(
        &self,
        duration_minutes: u32,
        exclude_booking: Option<Uuid>,
    ) -> Result<Vec<Slot>, SlotError> {
        let needed = slots_needed(duration_minutes)?;
        if self.is_day_blocked() {
            return Ok(vec![]);
        }
        Ok(WORKING_HOURS
            .windows(needed)
            .filter(|span| self.is_span_free(span, exclude_booking))
            .map(|span| span[0])
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Holding {
    Start,
    Inside,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotOption {
    pub slot: Slot,
    pub held: Option<Holding>,
    pub selectable: bool,
}

/// Time options for editing a booking: the free start slots merged with the
/// slots the booking already holds, in working-hour order.
pub fn edit_slot_options(
    available_starts: &[Slot],
    held_slots: &[Slot],
    held_start: Option<Slot>,
) -> Vec<SlotOption> {
    let mut merged: Vec<Slot> = available_starts.iter().chain(held_slots).copied().collect();
    merged.sort_unstable();
    merged.dedup();

    merged
        .into_iter()
        .map(|slot| {
            let held = if held_start == Some(slot) {
                Some(Holding::Start)
            } else if held_slots.contains(&slot) {
                Some(Holding::Inside)
            } else {
                None
            };
            SlotOption {
                slot,
                held,
                selectable: available_starts.contains(&slot),
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn slot(s: &str) -> Slot {
        s.parse().unwrap()
    }

    fn slots(list: &[&str]) -> Vec<Slot> {
        list.iter().map(|s| slot(s)).collect()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, 17).unwrap()
    }

    fn booked(at: &str, booking_id: Uuid) -> Availability {
        Availability::booked(date(), slot(at), booking_id)
    }

    fn blocked(key: SlotKey) -> Availability {
        Availability::blocked(date(), key, Some("maintenance".into()))
    }

    #[test]
    fn working_hours_cover_eight_to_eighteen() {
        assert_eq!(WORKING_HOURS.len(), 11);
        assert_eq!(WORKING_HOURS[0].to_string(), "08:00");
        assert_eq!(WORKING_HOURS[10].to_string(), "18:00");
    }

    #[test_case::test_case("08:00", 60, &["08:00"])]
    #[test_case::test_case("09:00", 120, &["09:00", "10:00"])]
    #[test_case::test_case("14:00", 180, &["14:00", "15:00", "16:00"])]
    #[test_case::test_case("10:00", 90, &["10:00", "11:00"])]
    #[test_case::test_case("16:00", 180, &["16:00", "17:00", "18:00"])]
    fn test_required_slots(start: &str, duration: u32, expected: &[&str]) {
        assert_eq!(required_slots(slot(start), duration).unwrap(), slots(expected));
    }

    #[test]
    fn required_slots_past_end_of_day() {
        let err = required_slots(slot("17:00"), 180).unwrap_err();
        assert_eq!(
            err,
            SlotError::ExceedsWorkingDay {
                start: slot("17:00"),
                duration_minutes: 180
            }
        );
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert_eq!(slots_needed(0).unwrap_err(), SlotError::InvalidDuration);
        assert_eq!(
            required_slots(slot("08:00"), 0).unwrap_err(),
            SlotError::InvalidDuration
        );
    }

    #[test_case::test_case("07:00")]
    #[test_case::test_case("19:00")]
    #[test_case::test_case("09:30")]
    #[test_case::test_case("nine")]
    fn not_a_slot(raw: &str) {
        assert!(matches!(raw.parse::<Slot>(), Err(SlotError::NotASlot(_))));
    }

    #[test]
    fn slot_key_text_form() {
        assert_eq!("ALL_DAY".parse::<SlotKey>().unwrap(), SlotKey::AllDay);
        assert_eq!("11:00".parse::<SlotKey>().unwrap(), SlotKey::At(slot("11:00")));
        assert_eq!(
            serde_json::to_string(&SlotKey::At(slot("09:00"))).unwrap(),
            "\"09:00\""
        );
    }

    #[test]
    fn end_time_adds_duration() {
        let end = end_time(slot("14:00"), 120);
        assert_eq!(end, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    }

    #[test]
    fn empty_day_offers_every_fitting_start() {
        let schedule = DaySchedule::default();
        assert_eq!(schedule.start_slots(60, None).unwrap().len(), 11);

        let starts = schedule.start_slots(180, None).unwrap();
        assert_eq!(starts.first(), Some(&slot("08:00")));
        assert_eq!(starts.last(), Some(&slot("16:00")));
        assert_eq!(starts.len(), 9);
    }

    #[test]
    fn booked_and_blocked_slots_are_not_free() {
        let booking = Uuid::new_v4();
        let schedule = DaySchedule::new(vec![
            booked("10:00", booking),
            blocked(SlotKey::At(slot("13:00"))),
            Availability {
                status: SlotStatus::Available,
                ..blocked(SlotKey::At(slot("15:00")))
            },
        ]);

        assert!(schedule.is_free(slot("09:00"), None));
        assert!(!schedule.is_free(slot("10:00"), None));
        assert!(!schedule.is_free(slot("10:00"), Some(Uuid::new_v4())));
        assert!(schedule.is_free(slot("10:00"), Some(booking)));
        assert!(!schedule.is_free(slot("13:00"), Some(booking)));
        assert!(schedule.is_free(slot("15:00"), None));
    }

    #[test]
    fn start_slots_skip_spans_touching_taken_slots() {
        let schedule = DaySchedule::new(vec![
            booked("10:00", Uuid::new_v4()),
            blocked(SlotKey::At(slot("13:00"))),
        ]);

        let starts = schedule.start_slots(120, None).unwrap();
        assert_eq!(
            starts,
            slots(&["08:00", "11:00", "14:00", "15:00", "16:00", "17:00"])
        );
    }

    #[test]
    fn own_slots_stay_available_when_editing() {
        let booking = Uuid::new_v4();
        let schedule = DaySchedule::new(vec![
            booked("09:00", booking),
            booked("10:00", booking),
            booked("12:00", Uuid::new_v4()),
        ]);

        let without_exclusion = schedule.start_slots(120, None).unwrap();
        assert!(!without_exclusion.contains(&slot("10:00")));

        let for_edit = schedule.start_slots(120, Some(booking)).unwrap();
        assert!(for_edit.contains(&slot("08:00")));
        assert!(for_edit.contains(&slot("09:00")));
        assert!(for_edit.contains(&slot("10:00")));
        assert!(!for_edit.contains(&slot("11:00")));
        assert!(!for_edit.contains(&slot("12:00")));
    }

    #[test]
    fn blocked_day_has_no_start_slots() {
        let booking = Uuid::new_v4();
        let schedule = DaySchedule::new(vec![blocked(SlotKey::AllDay), booked("09:00", booking)]);

        assert!(schedule.is_day_blocked());
        assert!(schedule.start_slots(60, Some(booking)).unwrap().is_empty());
        assert_eq!(
            schedule.first_conflict(&slots(&["11:00"]), None),
            Some(SlotKey::AllDay)
        );
    }

    #[test]
    fn first_conflict_names_the_taken_slot() {
        let schedule = DaySchedule::new(vec![booked("11:00", Uuid::new_v4())]);
        assert_eq!(
            schedule.first_conflict(&slots(&["10:00", "11:00", "12:00"]), None),
            Some(SlotKey::At(slot("11:00")))
        );
        assert!(schedule.is_span_free(&slots(&["08:00", "09:00"]), None));
    }

    #[test]
    fn edit_options_merge_held_slots_in_order() {
        let available = slots(&["08:00", "09:00", "15:00"]);
        let held = slots(&["09:00", "10:00", "11:00"]);

        let options = edit_slot_options(&available, &held, Some(slot("09:00")));

        let order: Vec<String> = options.iter().map(|o| o.slot.to_string()).collect();
        assert_eq!(order, vec!["08:00", "09:00", "10:00", "11:00", "15:00"]);
        assert_eq!(options[0].held, None);
        assert_eq!(options[1].held, Some(Holding::Start));
        assert_eq!(options[2].held, Some(Holding::Inside));
        assert!(options[1].selectable);
        assert!(!options[3].selectable);
        assert!(options[4].selectable);
    }
}
