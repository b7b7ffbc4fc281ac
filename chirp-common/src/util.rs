use thiserror::Error;
use time::Duration;

/// A duration strictly greater than zero, used for token lifetimes.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PositiveDuration(Duration);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    pub fn from_seconds(seconds: i64) -> Result<Self, NonPositiveDurationError> {
        Duration::seconds(seconds).try_into()
    }

    #[must_use]
    pub fn get(self) -> Duration {
        self.0
    }

    #[must_use]
    pub fn whole_seconds(self) -> i64 {
        self.0.whole_seconds()
    }
}

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}
