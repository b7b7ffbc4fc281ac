use crate::{
    cache::TimelineCache,
    client::{Result, TweetApi},
};
use chirp_common::model::{
    like::LikeAction,
    timeline::{TimelineKey, TimelinePage, TimelineQuery},
    tweet::Tweet,
};
use tracing::{debug, warn};

/// How far down the timeline the viewport is, in percent.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default)]
pub struct ScrollPosition(f64);

impl ScrollPosition {
    /// Past this percentage the next page is loaded.
    pub const NEXT_PAGE_THRESHOLD: f64 = 90.0;

    /// A document that fits the viewport counts as scrolled to the bottom.
    #[must_use]
    pub fn from_metrics(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        let scrollable = scroll_height - client_height;
        if scrollable <= 0.0 {
            return Self(100.0);
        }

        Self((scroll_top / scrollable * 100.0).clamp(0.0, 100.0))
    }

    #[must_use]
    pub fn percent(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn wants_next_page(self) -> bool {
        self.0 > Self::NEXT_PAGE_THRESHOLD
    }
}

/// Infinite scroll over one timeline.
///
/// At most one page request is in flight. A failed request is not retried
/// automatically. Its message stays in [`error`](Self::error) until the cache
/// is invalidated or [`retry`](Self::retry) is called.
#[derive(Clone, Debug, Default)]
pub struct TimelineFeed {
    key: TimelineKey,
    /// The request in flight and the cache generation it was issued under.
    pending: Option<(TimelineQuery, u64)>,
    error: Option<FeedError>,
}

#[derive(Clone, Debug)]
struct FeedError {
    message: String,
    generation: u64,
}

impl TimelineFeed {
    #[must_use]
    pub fn new(key: TimelineKey) -> Self {
        Self {
            key,
            pending: None,
            error: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> &TimelineKey {
        &self.key
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.message.as_str())
    }

    /// Forgets the last failure so the next call to
    /// [`next_request`](Self::next_request) asks again.
    pub fn retry(&mut self) {
        self.error = None;
    }

    /// Every page was loaded: "No more items to load".
    #[must_use]
    pub fn is_exhausted(&self, cache: &TimelineCache) -> bool {
        cache.contains(&self.key) && !cache.has_next_page(&self.key)
    }

    /// The page to request now, if any. Returning a query marks the feed as
    /// fetching until [`receive_page`](Self::receive_page).
    pub fn next_request(
        &mut self,
        cache: &TimelineCache,
        scroll: ScrollPosition,
    ) -> Option<TimelineQuery> {
        if self.is_fetching() {
            return None;
        }
        if let Some(error) = &self.error {
            if error.generation == cache.generation() {
                return None;
            }
            debug!("Cache was invalidated since the last failure");
            self.error = None;
        }

        let first_page = TimelineQuery::first_page(&self.key);
        let query = if !cache.contains(&self.key) {
            first_page
        } else if scroll.wants_next_page() && cache.has_next_page(&self.key) {
            first_page.with_cursor(cache.next_cursor(&self.key))
        } else {
            return None;
        };

        debug!(cursor = ?query.cursor, "Requesting timeline page");
        self.pending = Some((query.clone(), cache.generation()));
        Some(query)
    }

    pub fn receive_page(&mut self, cache: &mut TimelineCache, result: Result<TimelinePage>) {
        let Some((query, generation)) = self.pending.take() else {
            debug!("Dropping timeline page nobody asked for");
            return;
        };

        if generation != cache.generation() {
            debug!(cursor = ?query.cursor, "Dropping reply issued before an invalidation");
            return;
        }

        match result {
            Ok(page) => cache.push_page(&self.key, page),
            Err(err) => {
                warn!(%err, "Loading timeline page failed");
                self.error = Some(FeedError {
                    message: err.to_string(),
                    generation,
                });
            }
        }
    }

    /// Requests the next page if one is due and stores the reply.
    pub async fn load_more(
        &mut self,
        api: &dyn TweetApi,
        cache: &mut TimelineCache,
        scroll: ScrollPosition,
    ) -> bool {
        let Some(query) = self.next_request(cache, scroll) else {
            return false;
        };

        let result = api.timeline(&query).await;
        self.receive_page(cache, result);
        true
    }

    /// Likes or unlikes `tweet` depending on whether the viewer already
    /// likes it. The cache is only patched once the server acknowledged.
    pub async fn toggle_like(
        &self,
        api: &dyn TweetApi,
        cache: &mut TimelineCache,
        tweet: &Tweet,
    ) -> Result<LikeAction> {
        let action = LikeAction::toggle(tweet);
        let like = match action {
            LikeAction::Like => api.like(tweet.id).await?,
            LikeAction::Unlike => api.unlike(tweet.id).await?,
        };

        cache.patch(&self.key, like.tweet_id, like.user_id, action);
        Ok(action)
    }
}
