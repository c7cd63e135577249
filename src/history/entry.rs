//! A saved scan and its identifier.

use crate::record::BusinessCardRecord;
use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of a history entry.
///
/// Ids are generated from the save time in epoch milliseconds and bumped
/// past the newest existing id when two saves land in the same millisecond,
/// so they are unique and strictly increase in save order. On the wire they
/// are decimal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Id for an entry saved at `now`, given the newest id already in use.
    ///
    /// `None` when `newest` is `u64::MAX` and no larger id exists.
    pub fn next(now: DateTime<Utc>, newest: Option<EntryId>) -> Option<Self> {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match newest {
            Some(EntryId(prev)) if prev >= millis => prev.checked_add(1).map(EntryId),
            _ => Some(EntryId(millis)),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(EntryId)
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryIdVisitor;

        impl Visitor<'_> for EntryIdVisitor {
            type Value = EntryId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal id string or an unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntryId, E> {
                Ok(EntryId(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<EntryId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(EntryIdVisitor)
    }
}

/// One saved scan. Immutable once created by
/// [`super::HistoryStore::save`].
///
/// The serialised field names (`timestamp`, `imageUrl`, `data`) and the
/// millisecond timestamp match the history format used by the browser
/// version of the scanner, so existing exports load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: EntryId,
    /// When the entry was saved (not when the card was scanned).
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
    /// The data URI shown when the entry was saved.
    #[serde(rename = "imageUrl")]
    pub image_snapshot: String,
    #[serde(rename = "data")]
    pub record: BusinessCardRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_uses_clock_when_ahead() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(EntryId::next(now, None).unwrap().value(), 1_700_000_000_000);
        assert_eq!(
            EntryId::next(now, Some(EntryId::new(1_600_000_000_000)))
                .unwrap()
                .value(),
            1_700_000_000_000
        );
    }

    #[test]
    fn next_bumps_on_collision_or_skew() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let same = EntryId::next(now, Some(EntryId::new(1_700_000_000_000))).unwrap();
        assert_eq!(same.value(), 1_700_000_000_001);
        // Clock went backwards: still strictly increasing.
        let ahead = EntryId::next(now, Some(EntryId::new(1_800_000_000_000))).unwrap();
        assert_eq!(ahead.value(), 1_800_000_000_001);
    }

    #[test]
    fn next_is_none_past_the_largest_id() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(EntryId::next(now, Some(EntryId::new(u64::MAX))), None);
        assert_eq!(
            EntryId::next(now, Some(EntryId::new(u64::MAX - 1))),
            Some(EntryId::new(u64::MAX))
        );
    }

    #[test]
    fn id_round_trips_as_string_and_accepts_numbers() {
        let id = EntryId::new(1_700_000_000_123);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"1700000000123\"");
        let from_str: EntryId = serde_json::from_str("\"1700000000123\"").unwrap();
        let from_num: EntryId = serde_json::from_str("1700000000123").unwrap();
        assert_eq!(from_str, id);
        assert_eq!(from_num, id);
        assert!(serde_json::from_str::<EntryId>("\"abc\"").is_err());
    }

    #[test]
    fn entry_uses_legacy_field_names() {
        let json = r#"{
            "id": "1700000000000",
            "timestamp": 1700000000000,
            "imageUrl": "data:image/jpeg;base64,QUJD",
            "data": {"name": "Jane Doe", "companyName": "Acme", "email": "", "phone": "",
                     "jobTitle": "", "address": "", "website": "", "description": ""}
        }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, EntryId::new(1_700_000_000_000));
        assert_eq!(entry.captured_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(entry.record.company_name, "Acme");

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["imageUrl"], "data:image/jpeg;base64,QUJD");
        assert_eq!(back["timestamp"], 1_700_000_000_000_i64);
    }
}
