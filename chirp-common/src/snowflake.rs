//! Module for working with snowflake IDs.
//!
//! A snowflake packs the milliseconds since an [`Epoch`], a worker id, a
//! process id and a per-generator increment into a `u64`, so comparing two
//! snowflakes compares their creation times first.
//!
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;

pub const WORKER_ID_OFFSET: u32 = 17;
pub const WORKER_ID_LENGTH: u32 = 5;

pub const PROCESS_ID_OFFSET: u32 = 12;
pub const PROCESS_ID_LENGTH: u32 = 5;

pub const INCREMENT_OFFSET: u32 = 0;
pub const INCREMENT_LENGTH: u32 = 12;

const fn max_value(length: u32) -> u64 {
    (1 << length) - 1
}

fn extract(raw: u64, offset: u32, length: u32) -> u64 {
    (raw >> offset) & max_value(length)
}

pub trait Epoch {
    const EPOCH_TIME: OffsetDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("{part} {value} does not fit into {length} bits")]
pub struct SnowflakePartOutOfRangeError {
    part: &'static str,
    value: u64,
    length: u32,
}

fn check_part(
    part: &'static str,
    value: u64,
    length: u32,
) -> Result<u64, SnowflakePartOutOfRangeError> {
    if value <= max_value(length) {
        Ok(value)
    } else {
        Err(SnowflakePartOutOfRangeError {
            part,
            value,
            length,
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct WorkerId(u8);

impl WorkerId {
    pub fn new(id: u8) -> Result<Self, SnowflakePartOutOfRangeError> {
        check_part("worker id", id.into(), WORKER_ID_LENGTH)?;
        Ok(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ProcessId(u8);

impl ProcessId {
    pub fn new(id: u8) -> Result<Self, SnowflakePartOutOfRangeError> {
        check_part("process id", id.into(), PROCESS_ID_LENGTH)?;
        Ok(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

/// Milliseconds elapsed between `SnowflakeEpoch` and a point in time.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct SnowflakeTimestamp<SnowflakeEpoch>(u64, PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> SnowflakeTimestamp<SnowflakeEpoch> {
    #[must_use]
    pub fn from_millis(millis: u64) -> Option<Self> {
        (millis <= max_value(TIMESTAMP_LENGTH)).then_some(Self(millis, PhantomData))
    }

    #[must_use]
    pub fn millis(self) -> u64 {
        self.0
    }
}

impl<SnowflakeEpoch: Epoch> SnowflakeTimestamp<SnowflakeEpoch> {
    #[must_use]
    pub fn to_datetime(self) -> OffsetDateTime {
        // 42 bits always fit into an i64.
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(self.0.cast_signed())
    }
}

impl<SnowflakeEpoch: Epoch> TryFrom<OffsetDateTime> for SnowflakeTimestamp<SnowflakeEpoch> {
    type Error = SnowflakeTimeError;

    fn try_from(value: OffsetDateTime) -> Result<Self, Self::Error> {
        let millis = (value - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
        if millis < 0 {
            return Err(Self::Error::TimeBeforeEpoch);
        }

        let millis = u64::try_from(millis).map_err(|_| Self::Error::TimestampTooLarge)?;
        Self::from_millis(millis).ok_or(Self::Error::TimestampTooLarge)
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Snowflake<SnowflakeEpoch>(u64, PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn from_parts(
        timestamp: SnowflakeTimestamp<SnowflakeEpoch>,
        worker_id: WorkerId,
        process_id: ProcessId,
        increment: u16,
    ) -> Self {
        let increment = u64::from(increment) & max_value(INCREMENT_LENGTH);
        let raw = timestamp.millis() << TIMESTAMP_OFFSET
            | u64::from(worker_id.get()) << WORKER_ID_OFFSET
            | u64::from(process_id.get()) << PROCESS_ID_OFFSET
            | increment << INCREMENT_OFFSET;

        Self::new(raw)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp(self) -> SnowflakeTimestamp<SnowflakeEpoch> {
        SnowflakeTimestamp(
            extract(self.0, TIMESTAMP_OFFSET, TIMESTAMP_LENGTH),
            PhantomData,
        )
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn worker_id(self) -> WorkerId {
        WorkerId(extract(self.0, WORKER_ID_OFFSET, WORKER_ID_LENGTH) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn process_id(self) -> ProcessId {
        ProcessId(extract(self.0, PROCESS_ID_OFFSET, PROCESS_ID_LENGTH) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn increment(self) -> u16 {
        extract(self.0, INCREMENT_OFFSET, INCREMENT_LENGTH) as u16
    }

    /// The instant encoded in the snowflake, at millisecond precision.
    #[must_use]
    pub fn created_at(self) -> OffsetDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        self.timestamp().to_datetime()
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

/// Issues strictly increasing snowflakes.
///
/// If the clock goes backwards, or all increments of the current millisecond
/// are used up, the generator keeps counting from the next millisecond
/// instead of reusing an earlier timestamp.
#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    last: Option<(u64, u16)>,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            last: None,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    #[must_use]
    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }
}

impl<SnowflakeEpoch: Epoch> SnowflakeGenerator<SnowflakeEpoch> {
    pub fn generate_at(
        &mut self,
        time: OffsetDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError> {
        let requested = SnowflakeTimestamp::<SnowflakeEpoch>::try_from(time)?.millis();

        let (millis, increment) = match self.last {
            Some((last_millis, last_increment)) if requested <= last_millis => {
                if u64::from(last_increment) < max_value(INCREMENT_LENGTH) {
                    (last_millis, last_increment + 1)
                } else {
                    (last_millis + 1, 0)
                }
            }
            _ => (requested, 0),
        };

        let timestamp = SnowflakeTimestamp::from_millis(millis)
            .ok_or(SnowflakeTimeError::TimestampTooLarge)?;
        self.last = Some((millis, increment));

        Ok(Snowflake::from_parts(
            timestamp,
            self.worker_id,
            self.process_id,
            increment,
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError> {
        self.generate_at(OffsetDateTime::now_utc())
    }
}
