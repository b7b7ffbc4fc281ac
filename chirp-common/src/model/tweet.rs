use crate::model::{
    Id,
    user::{User, UserMarker},
};
use serde::{Deserialize, Deserializer, Serialize, de::Error};
use thiserror::Error;
use time::OffsetDateTime;

pub const TWEET_TEXT_MIN_LEN: usize = 10;
pub const TWEET_TEXT_MAX_LEN: usize = 280;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct TweetMarker;

/// A tweet as seen by one viewer.
///
/// `like_count` counts every like, `viewer_likes` holds the viewer's own id if
/// they liked it and is empty otherwise.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: Id<TweetMarker>,
    pub text: TweetText,
    pub author: User,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub like_count: u64,
    pub viewer_likes: Vec<Id<UserMarker>>,
}

impl Tweet {
    #[must_use]
    pub fn has_liked(&self) -> bool {
        !self.viewer_likes.is_empty()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateTweet {
    pub author: Id<UserMarker>,
    pub text: TweetText,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreateTweetInput {
    pub text: TweetText,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct TweetText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error(
    "A tweet must be {TWEET_TEXT_MIN_LEN} to {TWEET_TEXT_MAX_LEN} characters long, got {0} characters"
)]
pub struct InvalidTweetTextError(usize);

impl TweetText {
    pub fn new(text: String) -> Result<Self, InvalidTweetTextError> {
        let len = text.chars().count();
        if (TWEET_TEXT_MIN_LEN..=TWEET_TEXT_MAX_LEN).contains(&len) {
            Ok(TweetText(text))
        } else {
            Err(InvalidTweetTextError(len))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for TweetText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        TweetText::new(inner).map_err(Error::custom)
    }
}
