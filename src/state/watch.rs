use time::OffsetDateTime;
use twilight_model::id::marker::UserMarker;
use twilight_model::id::Id;

/// An active route watch, kept in memory only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchSession {
    /// When the watch started.
    pub start_time: OffsetDateTime,
    /// The names of the controller's partners.
    pub partners: Vec<String>,
    /// The member that started the watch.
    pub controller: Id<UserMarker>,
}

impl WatchSession {
    /// Starts a new watch at the given time.
    #[must_use]
    pub const fn new(start_time: OffsetDateTime, partners: Vec<String>, controller: Id<UserMarker>) -> Self {
        Self { start_time, partners, controller }
    }

    /// Returns the number of whole minutes since the watch started.
    #[must_use]
    pub fn elapsed_minutes(&self, now: OffsetDateTime) -> i64 {
        (now - self.start_time).whole_minutes().max(0)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::*;

    #[test]
    fn elapsed_minutes_truncates() {
        let start = datetime!(2024-03-01 20:00:00 UTC);
        let session = WatchSession::new(start, vec!["Anna".to_string()], Id::new(5));

        assert_eq!(session.elapsed_minutes(start + Duration::seconds(150)), 2);
        assert_eq!(session.elapsed_minutes(start - Duration::minutes(1)), 0);
    }
}
