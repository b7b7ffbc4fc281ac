use crate::model::{
    Id,
    tweet::{Tweet, TweetMarker},
    user::UserMarker,
};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LikeMarker;

/// A user's like of a tweet. At most one exists per `(tweet_id, user_id)`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: Id<LikeMarker>,
    pub tweet_id: Id<TweetMarker>,
    pub user_id: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeInput {
    pub tweet_id: Id<TweetMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LikeAction {
    Like,
    Unlike,
}

impl LikeAction {
    /// The action a viewer triggers by toggling the like button of `tweet`.
    #[must_use]
    pub fn toggle(tweet: &Tweet) -> Self {
        if tweet.has_liked() {
            LikeAction::Unlike
        } else {
            LikeAction::Like
        }
    }

    /// Restates on a snapshot what the store derives after this action by
    /// `viewer` succeeded: the like count and the viewer's likes.
    #[must_use]
    pub fn apply(self, tweet: &Tweet, viewer: Id<UserMarker>) -> Tweet {
        let mut tweet = tweet.clone();
        match self {
            LikeAction::Like => {
                tweet.viewer_likes.push(viewer);
                tweet.like_count += 1;
            }
            LikeAction::Unlike => {
                tweet.viewer_likes.clear();
                tweet.like_count = tweet.like_count.saturating_sub(1);
            }
        }
        tweet
    }
}
