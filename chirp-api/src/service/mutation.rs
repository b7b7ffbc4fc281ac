use crate::session::AuthenticatedUser;
use chirp_common::model::{
    Id,
    like::Like,
    tweet::{CreateTweet, Tweet, TweetMarker, TweetText},
};
use chirp_db::store::{RecordStore, Result};
use tracing::info;

/// Publishes `text` as a tweet by `author`.
pub async fn create(
    store: &dyn RecordStore,
    author: AuthenticatedUser,
    text: TweetText,
) -> Result<Tweet> {
    let tweet = store
        .create_tweet(&CreateTweet {
            author: author.user_id(),
            text,
        })
        .await?;

    info!(tweet_id = %tweet.id, author_id = %author.user_id(), "Created tweet");
    Ok(tweet)
}

/// Records that `user` likes the tweet. Liking twice is a unique violation.
pub async fn like(
    store: &dyn RecordStore,
    user: AuthenticatedUser,
    tweet_id: Id<TweetMarker>,
) -> Result<Like> {
    let like = store.create_like(tweet_id, user.user_id()).await?;

    info!(%tweet_id, user_id = %user.user_id(), "Liked tweet");
    Ok(like)
}

pub async fn unlike(
    store: &dyn RecordStore,
    user: AuthenticatedUser,
    tweet_id: Id<TweetMarker>,
) -> Result<Like> {
    let like = store.delete_like(tweet_id, user.user_id()).await?;

    info!(%tweet_id, user_id = %user.user_id(), "Unliked tweet");
    Ok(like)
}
