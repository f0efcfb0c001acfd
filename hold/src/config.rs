use std::time::Duration;

#[derive(Clone, Debug)]
pub struct HoldConfig {
    /// How long a claim (or renewal) keeps the car exclusive.
    pub hold_duration: Duration,

    /// How long released/expired records stay visible to `inspect`
    /// before the sweeper forgets them.
    pub tombstone_retention: Duration,
}

impl HoldConfig {
    pub fn hold_duration_ms(&self) -> u64 {
        self.hold_duration.as_millis() as u64
    }

    pub fn tombstone_retention_ms(&self) -> u64 {
        self.tombstone_retention.as_millis() as u64
    }
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            hold_duration: Duration::from_secs(10 * 60),
            tombstone_retention: Duration::from_secs(5 * 60),
        }
    }
}
