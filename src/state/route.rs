use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use twilight_model::id::marker::UserMarker;
use twilight_model::id::Id;

/// The number of milliseconds within a day.
const DAY_MILLIS: i128 = 86_400_000;

/// A time-boxed route window for a family.
///
/// Entries are only ever appended and pruned, never edited in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTimeEntry {
    /// When the window opens.
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    /// When the window closes.
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    /// The member that added the entry.
    pub added_by: Id<UserMarker>,
    /// When the entry was added.
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
    /// The route password, if one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl RouteTimeEntry {
    /// Creates an entry spanning the given number of days from `now`.
    #[must_use]
    pub fn lasting(now: OffsetDateTime, days: u16, added_by: Id<UserMarker>, password: Option<String>) -> Self {
        let end_time = now.saturating_add(Duration::days(i64::from(days)));

        Self { start_time: now, end_time, added_by, added_at: now, password }
    }

    /// Creates a password-only entry that expires on the next sweep.
    #[must_use]
    pub const fn instant(now: OffsetDateTime, added_by: Id<UserMarker>, password: String) -> Self {
        Self { start_time: now, end_time: now, added_by, added_at: now, password: Some(password) }
    }

    /// Returns whether this entry has ended at the given time.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.end_time <= now
    }

    /// Returns the number of days left until this entry ends, rounded up.
    #[must_use]
    pub fn days_remaining(&self, now: OffsetDateTime) -> i64 {
        let millis = (self.end_time - now).whole_milliseconds();
        let days = -(-millis).div_euclid(DAY_MILLIS);

        i64::try_from(days).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2024-03-01 12:00:00 UTC);

    fn entry_ending(end_time: OffsetDateTime) -> RouteTimeEntry {
        RouteTimeEntry { start_time: NOW, end_time, added_by: Id::new(1), added_at: NOW, password: None }
    }

    #[test]
    fn days_remaining_rounds_up() {
        assert_eq!(entry_ending(NOW + Duration::days(3)).days_remaining(NOW), 3);
        assert_eq!(entry_ending(NOW + Duration::hours(49)).days_remaining(NOW), 3);
        assert_eq!(entry_ending(NOW + Duration::milliseconds(1)).days_remaining(NOW), 1);
        assert_eq!(entry_ending(NOW).days_remaining(NOW), 0);
    }

    #[test]
    fn expiry_includes_the_end_instant() {
        assert!(entry_ending(NOW).is_expired(NOW));
        assert!(entry_ending(NOW - Duration::seconds(1)).is_expired(NOW));
        assert!(!entry_ending(NOW + Duration::seconds(1)).is_expired(NOW));
    }

    #[test]
    fn constructors_set_bounds() {
        let lasting = RouteTimeEntry::lasting(NOW, 7, Id::new(2), Some("alpha".to_string()));

        assert_eq!(lasting.end_time - lasting.start_time, Duration::days(7));
        assert_eq!(lasting.days_remaining(NOW), 7);

        let instant = RouteTimeEntry::instant(NOW, Id::new(2), "beta".to_string());

        assert!(instant.is_expired(NOW));
        assert_eq!(instant.password.as_deref(), Some("beta"));
    }

    #[test]
    fn serializes_camel_case_rfc3339() {
        let json = serde_json::to_value(entry_ending(NOW)).unwrap();

        assert_eq!(json["startTime"], "2024-03-01T12:00:00Z");
        assert_eq!(json["addedBy"], "1");
        assert!(json.get("password").is_none());
    }
}
