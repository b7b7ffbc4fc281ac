use crate::client::{ClientError, Result, TweetApi};
use async_trait::async_trait;
use chirp_common::model::{
    Id,
    like::Like,
    timeline::{TimelinePage, TimelineQuery},
    tweet::{Tweet, TweetMarker, TweetText},
    user::{User, UserName},
};
use std::sync::Mutex;
use time::macros::datetime;

pub fn tweet(id: u64, like_count: u64, viewer_likes: &[u64]) -> Tweet {
    Tweet {
        id: id.into(),
        text: TweetText::new(format!("tweet number {id}")).unwrap(),
        author: User {
            id: 1.into(),
            name: UserName::new("ferris".to_owned()).unwrap(),
            image: None,
        },
        created_at: datetime!(2025-06-01 12:00 UTC),
        like_count,
        viewer_likes: viewer_likes.iter().copied().map(Id::from).collect(),
    }
}

/// Answers every call with a canned result and records what was called.
#[derive(Debug, Default)]
pub struct FakeApi {
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            Err(ClientError::Server {
                status: 500,
                message: "boom".to_owned(),
            })
        } else {
            Ok(())
        }
    }

    fn like_of(tweet_id: Id<TweetMarker>) -> Like {
        Like {
            id: 77.into(),
            tweet_id,
            user_id: 9.into(),
        }
    }
}

#[async_trait]
impl TweetApi for FakeApi {
    async fn timeline(&self, query: &TimelineQuery) -> Result<TimelinePage> {
        self.record(format!("timeline {:?}", query.cursor))?;
        Ok(TimelinePage::default())
    }

    async fn create_tweet(&self, text: &TweetText) -> Result<Tweet> {
        self.record(format!("create {}", text.get()))?;
        Ok(Tweet {
            text: text.clone(),
            ..tweet(100, 0, &[])
        })
    }

    async fn like(&self, tweet_id: Id<TweetMarker>) -> Result<Like> {
        self.record(format!("like {tweet_id}"))?;
        Ok(Self::like_of(tweet_id))
    }

    async fn unlike(&self, tweet_id: Id<TweetMarker>) -> Result<Like> {
        self.record(format!("unlike {tweet_id}"))?;
        Ok(Self::like_of(tweet_id))
    }
}
