use std::collections::{BTreeSet, HashSet};

use chrono::{Duration, NaiveTime};

/// Returns the slots of `b` that are also present in `a`, in the order of `b`
pub fn intersect_slots(a: &[usize], b: &[usize]) -> Vec<usize> {
    let members: HashSet<usize> = a.iter().copied().collect();
    b.iter().copied().filter(|slot| members.contains(slot)).collect()
}

/// Sorts the slots and removes duplicates
pub fn unique_slots(slots: &[usize]) -> Vec<usize> {
    let set: BTreeSet<usize> = slots.iter().copied().collect();
    set.into_iter().collect()
}

/// Start and end of a slot on a clock that begins at `start` with fixed-length games
pub fn slot_span(start: NaiveTime, duration_minutes: u32, slot: usize) -> (NaiveTime, NaiveTime) {
    let from = start + Duration::minutes(duration_minutes as i64 * slot as i64);
    let to = start + Duration::minutes(duration_minutes as i64 * (slot as i64 + 1));
    (from, to)
}

/// Number of whole games of `duration_minutes` that fit between `from` and `to`
pub fn slots_in_window(from: NaiveTime, to: NaiveTime, duration_minutes: u32) -> i64 {
    if duration_minutes == 0 {
        return 0;
    }
    let window = (to - from).num_minutes();
    window.div_euclid(duration_minutes as i64)
}

/// Parses a time string (HH:MM) to minutes since midnight
pub fn parse_time_to_minutes(time_str: &str) -> Option<u32> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Parses `H:MM` or `HH:MM` into a time of day
pub fn parse_hm(time_str: &str) -> Option<NaiveTime> {
    let minutes = parse_time_to_minutes(time_str)?;
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// Formats a time of day as HH:MM
pub fn format_hm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Serde adapter for `HH:MM` times
pub mod hm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hm(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
    }
}

/// Serde adapter for optional `HH:MM` times, an empty string meaning unbounded
pub mod hm_opt {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_str(&super::format_hm(*t)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse_hm(s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid time '{}', expected HH:MM", s))),
        }
    }
}
