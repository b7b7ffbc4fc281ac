use crate::{
    record::{AuthenticationRecord, LikeRecord, TweetRecord, UserRecord},
    store::{ConstraintViolation, RecordStore, Result},
};
use async_trait::async_trait;
use chirp_common::{
    model::{
        ChirpSnowflake, ChirpSnowflakeGenerator, Id,
        auth::{AuthTokenHash, Authentication, NewCredentials},
        like::Like,
        timeline::{TimelinePage, TimelineQuery},
        tweet::{CreateTweet, Tweet, TweetMarker},
        user::{CreateUser, User, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use sqlx::{PgExecutor, PgPool, migrate::Migrator, query, query_as};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

static MIGRATOR: Migrator = sqlx::migrate!();

/// One timeline page plus a look-ahead row.
///
/// `$1` viewer, `$2` author id, `$3` author name, `$4` cursor, `$5` row limit.
/// The page starts at the cursor row itself: it is the look-ahead row of the
/// previous page and was never returned.
const TIMELINE_QUERY: &str = "
    SELECT
        tweets.tweet_snowflake,
        tweets.text,
        tweets.created_at,
        users.user_snowflake,
        users.name,
        users.image,
        (
            SELECT COUNT(*) FROM tweets.likes
            WHERE likes.tweet_snowflake = tweets.tweet_snowflake
        ) AS like_count,
        EXISTS (
            SELECT 1 FROM tweets.likes
            WHERE likes.tweet_snowflake = tweets.tweet_snowflake
                AND likes.user_snowflake = $1
        ) AS viewer_liked
    FROM
        tweets.tweets JOIN users.users USING (user_snowflake)
    WHERE
        ($2::BIGINT IS NULL OR users.user_snowflake = $2)
        AND ($3::TEXT IS NULL OR users.name = $3)
        AND (
            $4::BIGINT IS NULL
            OR (tweets.created_at, tweets.tweet_snowflake) <= (
                SELECT anchor.created_at, anchor.tweet_snowflake
                FROM tweets.tweets AS anchor
                WHERE anchor.tweet_snowflake = $4
            )
        )
    ORDER BY tweets.created_at DESC, tweets.tweet_snowflake DESC
    LIMIT $5
";

/// Postgres-backed [`RecordStore`].
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<ChirpSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(ChirpSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn connect(
        database_url: &str,
        worker_id: WorkerId,
        process_id: ProcessId,
    ) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool, worker_id, process_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    fn generate_snowflake(&self) -> Result<ChirpSnowflake> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;
        Ok(snowflake)
    }
}

async fn insert_user<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Id<UserMarker>,
    user: &CreateUser,
) -> Result<User> {
    let record = query_as::<_, UserRecord>(
        "
        INSERT INTO users.users (user_snowflake, name, image)
        VALUES ($1, $2, $3)
        RETURNING users.user_snowflake, users.name, users.image
        ",
    )
    .bind(user_id.to_db())
    .bind(user.name.get())
    .bind(user.image.as_deref())
    .fetch_one(executor)
    .await?;

    Ok(User::try_from(record)?)
}

async fn insert_auth<'e>(
    executor: impl PgExecutor<'e>,
    authentication: &Authentication,
) -> Result<()> {
    query(
        "
        INSERT INTO users.authentications
            (token_hash, user_snowflake, created_at, expires_after_seconds)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(authentication.token_hash.0.as_slice())
    .bind(authentication.user.to_db())
    .bind(authentication.created_at)
    .bind(
        authentication
            .expires_after
            .map(|lifetime| lifetime.whole_seconds()),
    )
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl RecordStore for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.name,
                users.image
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = Id::new(self.generate_snowflake()?);
        insert_user(&self.pool, user_id, user).await
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_snowflake,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        insert_auth(&self.pool, authentication).await
    }

    async fn create_account(
        &self,
        user: &CreateUser,
        credentials: &NewCredentials,
    ) -> Result<User> {
        let user_id = Id::new(self.generate_snowflake()?);

        let mut transaction = self.pool.begin().await?;
        let user = insert_user(&mut *transaction, user_id, user).await?;
        insert_auth(&mut *transaction, &credentials.clone().for_user(user.id)).await?;
        transaction.commit().await?;

        Ok(user)
    }

    async fn create_tweet(&self, tweet: &CreateTweet) -> Result<Tweet> {
        let tweet_id = Id::<TweetMarker>::new(self.generate_snowflake()?);

        let record = query_as::<_, TweetRecord>(
            "
            WITH inserted AS (
                INSERT INTO tweets.tweets (tweet_snowflake, text, user_snowflake, created_at)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT
                inserted.tweet_snowflake,
                inserted.text,
                inserted.created_at,
                users.user_snowflake,
                users.name,
                users.image,
                0::BIGINT AS like_count,
                FALSE AS viewer_liked
            FROM
                inserted JOIN users.users USING (user_snowflake)
            ",
        )
        .bind(tweet_id.to_db())
        .bind(tweet.text.get())
        .bind(tweet.author.to_db())
        .bind(tweet_id.created_at())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into_tweet(Some(tweet.author))?)
    }

    async fn fetch_timeline(
        &self,
        query: &TimelineQuery,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<TimelinePage> {
        let author = query.filter.author.as_ref();
        // One extra row tells whether another page follows.
        let fetch_limit = i64::try_from(query.limit.get() + 1).unwrap_or(i64::MAX);

        debug!(?query, ?viewer, "Fetching timeline page");

        let records = query_as::<_, TweetRecord>(TIMELINE_QUERY)
            .bind(viewer.map(Id::to_db))
            .bind(author.and_then(|author| author.id).map(Id::to_db))
            .bind(author.and_then(|author| author.name.as_deref()))
            .bind(query.cursor.map(Id::to_db))
            .bind(fetch_limit)
            .fetch_all(&self.pool)
            .await?;

        let tweets = records
            .into_iter()
            .map(|record| record.into_tweet(viewer))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TimelinePage::from_lookahead(tweets, query.limit))
    }

    async fn create_like(
        &self,
        tweet_id: Id<TweetMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Like> {
        let like_snowflake = self.generate_snowflake()?;

        let record = query_as::<_, LikeRecord>(
            "
            INSERT INTO tweets.likes (like_snowflake, tweet_snowflake, user_snowflake)
            VALUES ($1, $2, $3)
            RETURNING likes.like_snowflake, likes.tweet_snowflake, likes.user_snowflake
            ",
        )
        .bind(like_snowflake.get().cast_signed())
        .bind(tweet_id.to_db())
        .bind(user_id.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    async fn delete_like(
        &self,
        tweet_id: Id<TweetMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Like> {
        let record = query_as::<_, LikeRecord>(
            "
            DELETE FROM tweets.likes
            WHERE likes.tweet_snowflake = $1 AND likes.user_snowflake = $2
            RETURNING likes.like_snowflake, likes.tweet_snowflake, likes.user_snowflake
            ",
        )
        .bind(tweet_id.to_db())
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ConstraintViolation::NotFound(format!("like of tweet {tweet_id} by user {user_id}"))
        })?;

        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        client::DbClient,
        store::{ConstraintViolation, DbError, RecordStore},
    };
    use chirp_common::{
        model::{
            Id,
            auth::{AuthToken, NewCredentials},
            timeline::{TimelineFilter, TimelineLimit, TimelineQuery},
            tweet::{CreateTweet, Tweet, TweetText},
            user::{CreateUser, User, UserName},
        },
        snowflake::{ProcessId, WorkerId},
    };
    use sqlx::PgPool;
    use time::OffsetDateTime;

    fn client(pool: PgPool) -> DbClient {
        DbClient::new(pool, WorkerId::default(), ProcessId::default())
    }

    fn create_user(name: &str) -> CreateUser {
        CreateUser {
            name: UserName::new(name.to_owned()).unwrap(),
            image: None,
        }
    }

    async fn tweets(client: &DbClient, author: &User, count: usize) -> Vec<Tweet> {
        let mut tweets = Vec::with_capacity(count);
        for n in 0..count {
            let tweet = client
                .create_tweet(&CreateTweet {
                    author: author.id,
                    text: TweetText::new(format!("database tweet #{n}")).unwrap(),
                })
                .await
                .unwrap();
            tweets.push(tweet);
        }
        tweets
    }

    fn constraint(err: DbError) -> ConstraintViolation {
        match err {
            DbError::Constraint(violation) => violation,
            other => panic!("expected a constraint violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn timeline_pages_without_gaps(pool: PgPool) {
        let client = client(pool);
        let ferris = client.create_user(&create_user("ferris")).await.unwrap();
        let mut expected: Vec<_> = tweets(&client, &ferris, 25)
            .await
            .into_iter()
            .map(|tweet| tweet.id)
            .collect();
        expected.reverse();

        let mut query = TimelineQuery {
            limit: TimelineLimit::new(10).unwrap(),
            ..TimelineQuery::default()
        };
        let mut seen = Vec::new();
        let mut sizes = Vec::new();
        loop {
            let page = client.fetch_timeline(&query, None).await.unwrap();
            sizes.push(page.tweets.len());
            seen.extend(page.tweets.iter().map(|tweet| tweet.id));
            match page.next_cursor {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }

        assert_eq!(sizes, [10, 10, 5]);
        assert_eq!(seen, expected);
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn unknown_cursor_is_an_empty_page(pool: PgPool) {
        let client = client(pool);
        let ferris = client.create_user(&create_user("ferris")).await.unwrap();
        tweets(&client, &ferris, 3).await;

        let query = TimelineQuery {
            cursor: Some(Id::from(12345)),
            ..TimelineQuery::default()
        };
        let page = client.fetch_timeline(&query, None).await.unwrap();

        assert!(page.tweets.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn likes_depend_on_the_viewer(pool: PgPool) {
        let client = client(pool);
        let ferris = client.create_user(&create_user("ferris")).await.unwrap();
        let corro = client.create_user(&create_user("corro")).await.unwrap();
        let tweet = tweets(&client, &ferris, 1).await.remove(0);
        tweets(&client, &corro, 1).await;

        let like = client.create_like(tweet.id, corro.id).await.unwrap();
        assert_eq!((like.tweet_id, like.user_id), (tweet.id, corro.id));

        let query = TimelineQuery {
            filter: TimelineFilter::by_author_name("ferris"),
            ..TimelineQuery::default()
        };
        let seen_by_corro = client.fetch_timeline(&query, Some(corro.id)).await.unwrap();
        assert_eq!(seen_by_corro.tweets.len(), 1);
        assert_eq!(seen_by_corro.tweets[0].like_count, 1);
        assert_eq!(seen_by_corro.tweets[0].viewer_likes, [corro.id]);

        let anonymous = client.fetch_timeline(&query, None).await.unwrap();
        assert_eq!(anonymous.tweets[0].like_count, 1);
        assert!(anonymous.tweets[0].viewer_likes.is_empty());

        let seen_by_ferris = client.fetch_timeline(&query, Some(ferris.id)).await.unwrap();
        assert!(seen_by_ferris.tweets[0].viewer_likes.is_empty());
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn like_constraints(pool: PgPool) {
        let client = client(pool);
        let ferris = client.create_user(&create_user("ferris")).await.unwrap();
        let tweet = tweets(&client, &ferris, 1).await.remove(0);

        client.create_like(tweet.id, ferris.id).await.unwrap();
        let err = client.create_like(tweet.id, ferris.id).await.unwrap_err();
        assert!(matches!(constraint(err), ConstraintViolation::Unique(_)));

        let err = client
            .create_like(Id::from(12345), ferris.id)
            .await
            .unwrap_err();
        assert!(matches!(constraint(err), ConstraintViolation::ForeignKey(_)));

        client.delete_like(tweet.id, ferris.id).await.unwrap();
        let err = client.delete_like(tweet.id, ferris.id).await.unwrap_err();
        assert!(matches!(constraint(err), ConstraintViolation::NotFound(_)));
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn failed_account_is_rolled_back(pool: PgPool) {
        let client = client(pool);
        let credentials = NewCredentials {
            token_hash: AuthToken::generate_random(Id::from(0)).hash().unwrap(),
            created_at: OffsetDateTime::now_utc(),
            expires_after: None,
        };

        let ferris = client
            .create_account(&create_user("ferris"), &credentials)
            .await
            .unwrap();
        let authentication = client
            .fetch_auth(&credentials.token_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(authentication.user, ferris.id);

        let err = client
            .create_account(&create_user("corro"), &credentials)
            .await
            .unwrap_err();
        assert!(matches!(constraint(err), ConstraintViolation::Unique(_)));

        client.create_user(&create_user("corro")).await.unwrap();
    }
}
