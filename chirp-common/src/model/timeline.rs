use crate::model::{
    Id,
    tweet::{Tweet, TweetMarker},
    user::{User, UserMarker},
};
use serde::{Deserialize, Deserializer, Serialize, de::Error};
use thiserror::Error;

pub const TIMELINE_LIMIT_MIN: u8 = 1;
pub const TIMELINE_LIMIT_MAX: u8 = 100;
pub const TIMELINE_LIMIT_DEFAULT: u8 = 10;

/// Page size of a timeline request, within
/// `TIMELINE_LIMIT_MIN..=TIMELINE_LIMIT_MAX`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct TimelineLimit(u8);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("The timeline limit must be between {TIMELINE_LIMIT_MIN} and {TIMELINE_LIMIT_MAX}, got {0}")]
pub struct InvalidTimelineLimitError(u64);

impl TimelineLimit {
    pub fn new(limit: u64) -> Result<Self, InvalidTimelineLimitError> {
        u8::try_from(limit)
            .ok()
            .filter(|limit| (TIMELINE_LIMIT_MIN..=TIMELINE_LIMIT_MAX).contains(limit))
            .map(TimelineLimit)
            .ok_or(InvalidTimelineLimitError(limit))
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0.into()
    }
}

impl Default for TimelineLimit {
    fn default() -> Self {
        TimelineLimit(TIMELINE_LIMIT_DEFAULT)
    }
}

impl<'de> Deserialize<'de> for TimelineLimit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u64::deserialize(deserializer)?;
        TimelineLimit::new(inner).map_err(Error::custom)
    }
}

/// Restricts a timeline to one author. Both fields apply independently.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct AuthorFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id<UserMarker>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AuthorFilter {
    #[must_use]
    pub fn matches(&self, author: &User) -> bool {
        self.id.is_none_or(|id| id == author.id)
            && self
                .name
                .as_deref()
                .is_none_or(|name| name == author.name.get())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct TimelineFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorFilter>,
}

impl TimelineFilter {
    #[must_use]
    pub fn by_author_id(id: Id<UserMarker>) -> Self {
        Self {
            author: Some(AuthorFilter {
                id: Some(id),
                name: None,
            }),
        }
    }

    #[must_use]
    pub fn by_author_name(name: impl Into<String>) -> Self {
        Self {
            author: Some(AuthorFilter {
                id: None,
                name: Some(name.into()),
            }),
        }
    }

    #[must_use]
    pub fn matches(&self, author: &User) -> bool {
        self.author
            .as_ref()
            .is_none_or(|filter| filter.matches(author))
    }
}

/// Input of the `timeline` procedure.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct TimelineQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Id<TweetMarker>>,
    #[serde(default)]
    pub limit: TimelineLimit,
    #[serde(default, rename = "where")]
    pub filter: TimelineFilter,
}

impl TimelineQuery {
    #[must_use]
    pub fn first_page(key: &TimelineKey) -> Self {
        Self {
            cursor: None,
            limit: key.limit,
            filter: key.filter.clone(),
        }
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: Option<Id<TweetMarker>>) -> Self {
        self.cursor = cursor;
        self
    }

    /// The query parameters that identify a cached page set.
    #[must_use]
    pub fn key(&self) -> TimelineKey {
        TimelineKey {
            filter: self.filter.clone(),
            limit: self.limit,
        }
    }
}

/// A timeline query without its cursor.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct TimelineKey {
    pub filter: TimelineFilter,
    pub limit: TimelineLimit,
}

/// Output of the `timeline` procedure.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePage {
    pub tweets: Vec<Tweet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Id<TweetMarker>>,
}

impl TimelinePage {
    /// Builds a page from up to `limit + 1` rows in timeline order.
    ///
    /// A row beyond `limit` is only a look-ahead: it is dropped from the page
    /// and its id becomes the cursor the next page starts at.
    #[must_use]
    pub fn from_lookahead(mut tweets: Vec<Tweet>, limit: TimelineLimit) -> Self {
        let mut next_cursor = None;
        if tweets.len() > limit.get() {
            tweets.truncate(limit.get() + 1);
            next_cursor = tweets.pop().map(|tweet| tweet.id);
        }

        Self {
            tweets,
            next_cursor,
        }
    }
}
