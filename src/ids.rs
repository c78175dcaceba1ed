use chrono::{DateTime, Utc};

/// Source of the current time for record ids and timestamps
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hands out record ids derived from millisecond timestamps.
///
/// Ids are strictly increasing: two records created within the same
/// millisecond get consecutive ids instead of colliding.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    /// Start above every id in `ids`
    pub fn seeded(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut generator = Self::default();
        for id in ids {
            generator.observe(id);
        }
        generator
    }

    /// Next id, or `None` once every id above the last one is used up
    pub fn next_id(&mut self, now: DateTime<Utc>) -> Option<i64> {
        let floor = self.last.checked_add(1)?;
        let id = now.timestamp_millis().max(floor);
        self.last = id;
        Some(id)
    }

    /// Record an id assigned elsewhere (loaded or imported)
    pub fn observe(&mut self, id: i64) {
        self.last = self.last.max(id);
    }

    /// Whether an id taken from outside can be kept without using up the id space
    pub fn can_adopt(id: i64) -> bool {
        id < i64::MAX
    }
}
