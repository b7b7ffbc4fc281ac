use chirp_common::{
    model::{
        Id, ModelValidationError,
        auth::Authentication,
        like::Like,
        tweet::{Tweet, TweetText},
        user::{User, UserMarker, UserName},
    },
    util::PositiveDuration,
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub name: String,
    pub image: Option<String>,
}

/// A tweet joined with its author and like aggregates.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct TweetRecord {
    pub tweet_snowflake: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub name: String,
    pub image: Option<String>,
    pub like_count: i64,
    pub viewer_liked: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct LikeRecord {
    pub like_snowflake: i64,
    pub tweet_snowflake: i64,
    pub user_snowflake: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            name: UserName::new(value.name)?,
            image: value.image,
        })
    }
}

impl TweetRecord {
    pub fn into_tweet(
        self,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Tweet, ModelValidationError> {
        let viewer_likes = viewer.filter(|_| self.viewer_liked).into_iter().collect();

        Ok(Tweet {
            id: Id::from_db(self.tweet_snowflake),
            text: TweetText::new(self.text)?,
            author: User {
                id: Id::from_db(self.user_snowflake),
                name: UserName::new(self.name)?,
                image: self.image,
            },
            created_at: self.created_at,
            like_count: self.like_count.cast_unsigned(),
            viewer_likes,
        })
    }
}

impl From<LikeRecord> for Like {
    fn from(value: LikeRecord) -> Self {
        Self {
            id: Id::from_db(value.like_snowflake),
            tweet_id: Id::from_db(value.tweet_snowflake),
            user_id: Id::from_db(value.user_snowflake),
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(PositiveDuration::from_seconds)
                .transpose()?,
        })
    }
}
