pub mod auth;
pub mod like;
pub mod timeline;
pub mod tweet;
pub mod user;

use crate::{
    model::{
        auth::InvalidAuthTokenHashError,
        timeline::InvalidTimelineLimitError,
        tweet::InvalidTweetTextError,
        user::InvalidUserNameError,
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error, Unexpected},
};
use std::{fmt::Display, marker::PhantomData, num::ParseIntError, str::FromStr};
use thiserror::Error;
use time::{OffsetDateTime, macros::datetime};

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserName(#[from] InvalidUserNameError),
    #[error(transparent)]
    TweetText(#[from] InvalidTweetTextError),
    #[error(transparent)]
    TimelineLimit(#[from] InvalidTimelineLimitError),
    #[error(transparent)]
    Id(#[from] InvalidIdError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ChirpEpoch;
impl Epoch for ChirpEpoch {
    const EPOCH_TIME: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);
}

pub type ChirpSnowflake = Snowflake<ChirpEpoch>;
pub type ChirpSnowflakeGenerator = SnowflakeGenerator<ChirpEpoch>;

/// A snowflake tagged with the kind of record it identifies.
///
/// On the wire an id is an opaque decimal string.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Id<Marker>(ChirpSnowflake, PhantomData<Marker>);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Invalid id {id:?}: {source}")]
pub struct InvalidIdError {
    id: String,
    source: ParseIntError,
}

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: ChirpSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> ChirpSnowflake {
        self.0
    }

    #[must_use]
    pub fn created_at(self) -> OffsetDateTime {
        self.0.created_at()
    }

    /// The id as stored in a signed `BIGINT` column.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s).map(Self::from).map_err(|source| InvalidIdError {
            id: s.to_owned(),
            source,
        })
    }
}

impl<Marker> From<ChirpSnowflake> for Id<Marker> {
    fn from(value: ChirpSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for ChirpSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(ChirpSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

impl<Marker> Serialize for Id<Marker> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, Marker> Deserialize<'de> for Id<Marker> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        inner
            .parse()
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"a decimal id string"))
    }
}

/// Body of every error reply sent by the api.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}
