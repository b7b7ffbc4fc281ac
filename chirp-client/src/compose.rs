use crate::{
    cache::TimelineCache,
    client::{ClientError, Result, TweetApi},
};
use chirp_common::model::{
    ModelValidationError,
    tweet::{Tweet, TweetText},
};
use tracing::info;

/// Draft of a new tweet.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Composer {
    draft: String,
    error: Option<String>,
}

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Message of the last failed submission.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validates and publishes the draft. On success the draft is cleared and
    /// every cached timeline is dropped so the new tweet shows up on refetch.
    pub async fn submit(&mut self, api: &dyn TweetApi, cache: &mut TimelineCache) -> Result<Tweet> {
        let text = match TweetText::new(self.draft.clone()) {
            Ok(text) => text,
            Err(err) => {
                self.error = Some(err.to_string());
                return Err(ClientError::Validation(ModelValidationError::from(err)));
            }
        };

        let tweet = api
            .create_tweet(&text)
            .await
            .inspect_err(|err| self.error = Some(err.to_string()))?;

        self.draft.clear();
        self.error = None;
        cache.invalidate_all();

        info!(tweet_id = %tweet.id, "Posted tweet");
        Ok(tweet)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        cache::TimelineCache,
        client::ClientError,
        compose::Composer,
        fake::FakeApi,
    };
    use chirp_common::model::timeline::{TimelineKey, TimelinePage};

    #[tokio::test]
    async fn short_draft_never_reaches_the_server() {
        let api = FakeApi::default();
        let mut cache = TimelineCache::new();
        let mut composer = Composer::new();
        composer.set_draft("too short");

        let result = composer.submit(&api, &mut cache).await;

        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert!(composer.error().unwrap().contains("10 to 280 characters"));
        assert_eq!(composer.draft(), "too short");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn success_clears_draft_and_cache() {
        let api = FakeApi::default();
        let mut cache = TimelineCache::new();
        cache.push_page(&TimelineKey::default(), TimelinePage::default());
        let mut composer = Composer::new();
        composer.set_draft("too short");
        composer.submit(&api, &mut cache).await.unwrap_err();
        composer.set_draft("long enough to be a tweet");

        let tweet = composer.submit(&api, &mut cache).await.unwrap();

        assert_eq!(tweet.text.get(), "long enough to be a tweet");
        assert_eq!(composer.draft(), "");
        assert_eq!(composer.error(), None);
        assert!(!cache.contains(&TimelineKey::default()));
        assert_eq!(api.calls(), ["create long enough to be a tweet"]);
    }

    #[tokio::test]
    async fn server_failure_keeps_draft_and_cache() {
        let api = FakeApi::failing();
        let mut cache = TimelineCache::new();
        cache.push_page(&TimelineKey::default(), TimelinePage::default());
        let mut composer = Composer::new();
        composer.set_draft("long enough to be a tweet");

        assert!(composer.submit(&api, &mut cache).await.is_err());

        assert_eq!(composer.draft(), "long enough to be a tweet");
        assert!(composer.error().is_some());
        assert!(cache.contains(&TimelineKey::default()));
    }
}
