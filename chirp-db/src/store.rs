use async_trait::async_trait;
use chirp_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication, NewCredentials},
        like::Like,
        timeline::{TimelinePage, TimelineQuery},
        tweet::{CreateTweet, Tweet, TweetMarker},
        user::{CreateUser, User, UserMarker},
    },
    snowflake::SnowflakeTimeError,
};
use sqlx::error::ErrorKind;
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeTimeError),
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),
    #[error(transparent)]
    Sqlx(sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// A write the store refused because of its own integrity rules.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ConstraintViolation {
    #[error("Unique constraint violated: {0}")]
    Unique(String),
    #[error("Foreign key constraint violated: {0}")]
    ForeignKey(String),
    #[error("Record to delete does not exist: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for DbError {
    fn from(value: sqlx::Error) -> Self {
        let violation = match &value {
            sqlx::Error::Database(database_error) => {
                let constraint = database_error
                    .constraint()
                    .unwrap_or_else(|| database_error.message())
                    .to_owned();

                match database_error.kind() {
                    ErrorKind::UniqueViolation => Some(ConstraintViolation::Unique(constraint)),
                    ErrorKind::ForeignKeyViolation => {
                        Some(ConstraintViolation::ForeignKey(constraint))
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        violation.map_or(DbError::Sqlx(value), DbError::Constraint)
    }
}

/// Durable storage for users, credentials, tweets and likes.
///
/// Implementations enforce at most one like per `(tweet, user)` and reject
/// rows referencing missing users or tweets, reporting both as
/// [`DbError::Constraint`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    /// Creates `user` together with its first credentials. Either both are
    /// stored or neither is.
    async fn create_account(
        &self,
        user: &CreateUser,
        credentials: &NewCredentials,
    ) -> Result<User>;

    async fn create_tweet(&self, tweet: &CreateTweet) -> Result<Tweet>;

    /// One page of tweets matching `query`, newest first, with like data
    /// derived for `viewer`.
    async fn fetch_timeline(
        &self,
        query: &TimelineQuery,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<TimelinePage>;

    async fn create_like(
        &self,
        tweet_id: Id<TweetMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Like>;

    /// Removes the like of `(tweet_id, user_id)` and returns it.
    async fn delete_like(
        &self,
        tweet_id: Id<TweetMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Like>;
}
