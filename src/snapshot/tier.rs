use chrono::Duration;
use derive_more::Display;

/// Backup frequency classes, ordered from shortest to longest interval.
///
/// Tier intervals are fixed durations, not calendar-aware: a month is always
/// thirty days. `Minutely` exists for exercising a configuration without
/// waiting an hour and is not intended for real use.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Tier {
    #[display("minutely")]
    Minutely,
    #[display("hourly")]
    Hourly,
    #[display("daily")]
    Daily,
    #[display("weekly")]
    Weekly,
    #[display("monthly")]
    Monthly,
}

impl Tier {
    /// Declared evaluation order. Rules iterate this array rather than a map
    /// so that logs and pruning happen in a deterministic sequence.
    pub const ALL: [Tier; 5] = [
        Tier::Minutely,
        Tier::Hourly,
        Tier::Daily,
        Tier::Weekly,
        Tier::Monthly,
    ];

    /// Minimum elapsed time since the most recent snapshot of this tier
    /// before another one is due.
    pub fn interval(self) -> Duration {
        match self {
            Tier::Minutely => Duration::minutes(1),
            Tier::Hourly => Duration::hours(1),
            Tier::Daily => Duration::days(1),
            Tier::Weekly => Duration::days(7),
            Tier::Monthly => Duration::days(30),
        }
    }
}
