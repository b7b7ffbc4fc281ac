use crate::store::{ConstraintViolation, RecordStore, Result};
use async_trait::async_trait;
use chirp_common::{
    model::{
        ChirpSnowflake, ChirpSnowflakeGenerator, Id,
        auth::{AuthTokenHash, Authentication, NewCredentials},
        like::Like,
        timeline::{TimelinePage, TimelineQuery},
        tweet::{CreateTweet, Tweet, TweetMarker, TweetText},
        user::{CreateUser, User, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

/// Sorts newest first, ties broken by the larger id.
type TimelineKey = Reverse<(OffsetDateTime, Id<TweetMarker>)>;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
struct TweetRow {
    text: TweetText,
    author: Id<UserMarker>,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Id<UserMarker>, User>,
    authentications: HashMap<AuthTokenHash, Authentication>,
    tweets: BTreeMap<Id<TweetMarker>, TweetRow>,
    likes: BTreeMap<(Id<TweetMarker>, Id<UserMarker>), Like>,
}

#[derive(Debug)]
struct State {
    tables: Tables,
    snowflake_generator: ChirpSnowflakeGenerator,
}

/// In-process [`RecordStore`] with the same constraints as the Postgres
/// schema. Every operation holds one lock for its whole duration.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            state: Mutex::new(State {
                tables: Tables::default(),
                snowflake_generator: ChirpSnowflakeGenerator::new(worker_id, process_id),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(WorkerId::default(), ProcessId::default())
    }
}

impl State {
    fn generate_snowflake(&mut self) -> Result<ChirpSnowflake> {
        Ok(self.snowflake_generator.generate()?)
    }
}

impl Tables {
    fn tweet(&self, id: Id<TweetMarker>, viewer: Option<Id<UserMarker>>) -> Option<Tweet> {
        let row = self.tweets.get(&id)?;
        let author = self.users.get(&row.author)?;

        let likes = self.likes.range(
            (id, Id::<UserMarker>::from(u64::MIN))..=(id, Id::<UserMarker>::from(u64::MAX)),
        );
        let mut like_count = 0;
        let mut viewer_likes = Vec::new();
        for (&(_, user_id), _) in likes {
            like_count += 1;
            if Some(user_id) == viewer {
                viewer_likes.push(user_id);
            }
        }

        Some(Tweet {
            id,
            text: row.text.clone(),
            author: author.clone(),
            created_at: row.created_at,
            like_count,
            viewer_likes,
        })
    }

    fn timeline_key(&self, id: Id<TweetMarker>) -> Option<TimelineKey> {
        self.tweets.get(&id).map(|row| Reverse((row.created_at, id)))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.tables.users.get(&user_id).cloned())
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut state = self.state.lock().await;

        if state
            .tables
            .users
            .values()
            .any(|existing| existing.name == user.name)
        {
            return Err(ConstraintViolation::Unique("users_name_key".to_owned()).into());
        }

        let user = User {
            id: state.generate_snowflake()?.into(),
            name: user.name.clone(),
            image: user.image.clone(),
        };
        state.tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let state = self.state.lock().await;
        Ok(state.tables.authentications.get(token_hash).cloned())
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;

        if !tables.users.contains_key(&authentication.user) {
            return Err(
                ConstraintViolation::ForeignKey("authentications_user_snowflake_fkey".to_owned())
                    .into(),
            );
        }
        if tables
            .authentications
            .contains_key(&authentication.token_hash)
        {
            return Err(ConstraintViolation::Unique("authentications_pkey".to_owned()).into());
        }

        tables
            .authentications
            .insert(authentication.token_hash.clone(), authentication.clone());
        Ok(())
    }

    async fn create_account(
        &self,
        user: &CreateUser,
        credentials: &NewCredentials,
    ) -> Result<User> {
        let mut state = self.state.lock().await;

        if state
            .tables
            .users
            .values()
            .any(|existing| existing.name == user.name)
        {
            return Err(ConstraintViolation::Unique("users_name_key".to_owned()).into());
        }
        if state
            .tables
            .authentications
            .contains_key(&credentials.token_hash)
        {
            return Err(ConstraintViolation::Unique("authentications_pkey".to_owned()).into());
        }

        let user = User {
            id: state.generate_snowflake()?.into(),
            name: user.name.clone(),
            image: user.image.clone(),
        };
        let authentication = credentials.clone().for_user(user.id);
        state.tables.users.insert(user.id, user.clone());
        state
            .tables
            .authentications
            .insert(authentication.token_hash.clone(), authentication);

        Ok(user)
    }

    async fn create_tweet(&self, tweet: &CreateTweet) -> Result<Tweet> {
        let mut state = self.state.lock().await;

        if !state.tables.users.contains_key(&tweet.author) {
            return Err(
                ConstraintViolation::ForeignKey("tweets_user_snowflake_fkey".to_owned()).into(),
            );
        }

        let snowflake = state.generate_snowflake()?;
        let id = Id::new(snowflake);
        state.tables.tweets.insert(
            id,
            TweetRow {
                text: tweet.text.clone(),
                author: tweet.author,
                created_at: snowflake.created_at(),
            },
        );

        let created = state
            .tables
            .tweet(id, Some(tweet.author))
            .ok_or_else(|| ConstraintViolation::NotFound(format!("tweet {id}")))?;
        Ok(created)
    }

    async fn fetch_timeline(
        &self,
        query: &TimelineQuery,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<TimelinePage> {
        let state = self.state.lock().await;
        let tables = &state.tables;

        debug!(?query, ?viewer, "Fetching timeline page");

        let start = match query.cursor {
            Some(cursor) => match tables.timeline_key(cursor) {
                Some(key) => Some(key),
                None => return Ok(TimelinePage::default()),
            },
            None => None,
        };

        let mut matching: Vec<_> = tables
            .tweets
            .iter()
            .filter(|(_, row)| {
                tables
                    .users
                    .get(&row.author)
                    .is_some_and(|author| query.filter.matches(author))
            })
            .map(|(&id, row)| Reverse((row.created_at, id)))
            .filter(|key| start.is_none_or(|start| *key >= start))
            .collect();
        matching.sort_unstable();

        let tweets = matching
            .into_iter()
            .take(query.limit.get() + 1)
            .filter_map(|Reverse((_, id))| tables.tweet(id, viewer))
            .collect();

        Ok(TimelinePage::from_lookahead(tweets, query.limit))
    }

    async fn create_like(
        &self,
        tweet_id: Id<TweetMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Like> {
        let mut state = self.state.lock().await;

        if !state.tables.tweets.contains_key(&tweet_id) {
            return Err(
                ConstraintViolation::ForeignKey("likes_tweet_snowflake_fkey".to_owned()).into(),
            );
        }
        if !state.tables.users.contains_key(&user_id) {
            return Err(
                ConstraintViolation::ForeignKey("likes_user_snowflake_fkey".to_owned()).into(),
            );
        }
        if state.tables.likes.contains_key(&(tweet_id, user_id)) {
            return Err(ConstraintViolation::Unique(
                "likes_tweet_snowflake_user_snowflake_key".to_owned(),
            )
            .into());
        }

        let like = Like {
            id: state.generate_snowflake()?.into(),
            tweet_id,
            user_id,
        };
        state.tables.likes.insert((tweet_id, user_id), like);

        Ok(like)
    }

    async fn delete_like(
        &self,
        tweet_id: Id<TweetMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Like> {
        let mut state = self.state.lock().await;

        let like = state
            .tables
            .likes
            .remove(&(tweet_id, user_id))
            .ok_or_else(|| {
                ConstraintViolation::NotFound(format!(
                    "like of tweet {tweet_id} by user {user_id}"
                ))
            })?;

        Ok(like)
    }
}
