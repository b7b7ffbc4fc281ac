use chirp_common::model::{
    Id,
    like::LikeAction,
    timeline::{TimelineKey, TimelinePage},
    tweet::{Tweet, TweetMarker},
    user::UserMarker,
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// One fetched page as the cache holds it.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CachedPage {
    pub tweets: Vec<Arc<Tweet>>,
    pub next_cursor: Option<Id<TweetMarker>>,
}

impl From<TimelinePage> for CachedPage {
    fn from(value: TimelinePage) -> Self {
        Self {
            tweets: value.tweets.into_iter().map(Arc::new).collect(),
            next_cursor: value.next_cursor,
        }
    }
}

/// Pages fetched so far, per timeline query.
///
/// Tweets are shared behind [`Arc`] so a renderer can skip every tweet whose
/// pointer did not change after a [`patch`](Self::patch).
#[derive(Clone, Debug, Default)]
pub struct TimelineCache {
    entries: HashMap<TimelineKey, Vec<CachedPage>>,
    generation: u64,
}

impl TimelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&mut self, key: &TimelineKey, page: TimelinePage) {
        let pages = self.entries.entry(key.clone()).or_default();
        pages.push(page.into());
        debug!(pages = pages.len(), "Cached timeline page");
    }

    #[must_use]
    pub fn contains(&self, key: &TimelineKey) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn pages(&self, key: &TimelineKey) -> &[CachedPage] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every cached tweet of `key` in page order.
    pub fn tweets(&self, key: &TimelineKey) -> impl Iterator<Item = &Arc<Tweet>> {
        self.pages(key).iter().flat_map(|page| &page.tweets)
    }

    #[must_use]
    pub fn next_cursor(&self, key: &TimelineKey) -> Option<Id<TweetMarker>> {
        self.pages(key).last().and_then(|page| page.next_cursor)
    }

    #[must_use]
    pub fn has_next_page(&self, key: &TimelineKey) -> bool {
        self.next_cursor(key).is_some()
    }

    /// Bumped by every invalidation. Replies to requests issued under an
    /// older generation must not be cached.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn invalidate(&mut self, key: &TimelineKey) {
        self.entries.remove(key);
        self.generation += 1;
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }

    /// Applies a like mutation that the server already acknowledged.
    ///
    /// Every page of `key` is rebuilt. Tweets other than `tweet_id` keep their
    /// [`Arc`]. Returns `false` if nothing is cached for `key`.
    pub fn patch(
        &mut self,
        key: &TimelineKey,
        tweet_id: Id<TweetMarker>,
        viewer: Id<UserMarker>,
        action: LikeAction,
    ) -> bool {
        let Some(pages) = self.entries.get_mut(key) else {
            return false;
        };

        *pages = pages
            .iter()
            .map(|page| CachedPage {
                tweets: page
                    .tweets
                    .iter()
                    .map(|tweet| {
                        if tweet.id == tweet_id {
                            Arc::new(action.apply(tweet, viewer))
                        } else {
                            Arc::clone(tweet)
                        }
                    })
                    .collect(),
                next_cursor: page.next_cursor,
            })
            .collect();

        debug!(%tweet_id, ?action, "Patched cached timeline");
        true
    }
}
