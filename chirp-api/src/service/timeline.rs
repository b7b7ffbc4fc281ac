use crate::session::Viewer;
use chirp_common::model::timeline::{TimelinePage, TimelineQuery};
use chirp_db::store::{RecordStore, Result};
use tracing::debug;

/// Serves one page of the timeline described by `query`.
///
/// Like data is derived for `viewer`; an anonymous viewer sees every tweet
/// with empty `viewer_likes`.
pub async fn timeline(
    store: &dyn RecordStore,
    viewer: Viewer,
    query: &TimelineQuery,
) -> Result<TimelinePage> {
    let page = store.fetch_timeline(query, viewer.user_id()).await?;

    debug!(
        tweets = page.tweets.len(),
        next_cursor = ?page.next_cursor,
        "Served timeline page"
    );

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::timeline;
    use crate::{
        service::{fixture, mutation},
        session::{AuthenticatedUser, Viewer},
    };
    use chirp_common::model::{
        Id,
        timeline::{TimelineFilter, TimelineLimit, TimelineQuery},
        tweet::TweetMarker,
    };
    use chirp_db::memory::MemoryStore;
    use std::collections::HashSet;

    fn query(limit: u64) -> TimelineQuery {
        TimelineQuery {
            limit: TimelineLimit::new(limit).unwrap(),
            ..TimelineQuery::default()
        }
    }

    #[tokio::test]
    async fn pages_cover_every_tweet_once() {
        let store = MemoryStore::default();
        let ferris = fixture::user(&store, "ferris").await;
        let created = fixture::tweets(&store, &ferris, 25).await;

        let mut seen = Vec::new();
        let mut page_sizes = Vec::new();
        let mut cursor = None;
        loop {
            let page = timeline(&store, Viewer::anonymous(), &query(10).with_cursor(cursor))
                .await
                .unwrap();
            page_sizes.push(page.tweets.len());
            seen.extend(page.tweets.iter().map(|tweet| tweet.id));
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        assert_eq!(page_sizes, [10, 10, 5]);
        let expected: Vec<Id<TweetMarker>> = created.iter().rev().map(|tweet| tweet.id).collect();
        assert_eq!(seen, expected);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 25);
    }

    #[tokio::test]
    async fn page_of_exactly_limit_has_no_cursor() {
        let store = MemoryStore::default();
        let ferris = fixture::user(&store, "ferris").await;
        fixture::tweets(&store, &ferris, 10).await;

        let page = timeline(&store, Viewer::anonymous(), &query(10))
            .await
            .unwrap();

        assert_eq!(page.tweets.len(), 10);
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn empty_store_gives_empty_page() {
        let store = MemoryStore::default();

        let page = timeline(&store, Viewer::anonymous(), &TimelineQuery::default())
            .await
            .unwrap();

        assert!(page.tweets.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn filters_by_author() {
        let store = MemoryStore::default();
        let ferris = fixture::user(&store, "ferris").await;
        let corro = fixture::user(&store, "corro").await;
        fixture::tweets(&store, &ferris, 3).await;
        fixture::tweets(&store, &corro, 2).await;

        let by_id = TimelineQuery {
            filter: TimelineFilter::by_author_id(corro.id),
            ..TimelineQuery::default()
        };
        let page = timeline(&store, Viewer::anonymous(), &by_id).await.unwrap();
        assert_eq!(page.tweets.len(), 2);
        assert!(page.tweets.iter().all(|tweet| tweet.author == corro));

        let by_name = TimelineQuery {
            filter: TimelineFilter::by_author_name("ferris"),
            ..TimelineQuery::default()
        };
        let page = timeline(&store, Viewer::anonymous(), &by_name).await.unwrap();
        assert_eq!(page.tweets.len(), 3);
        assert!(page.tweets.iter().all(|tweet| tweet.author == ferris));

        let nobody = TimelineQuery {
            filter: TimelineFilter::by_author_name("nobody"),
            ..TimelineQuery::default()
        };
        let page = timeline(&store, Viewer::anonymous(), &nobody).await.unwrap();
        assert!(page.tweets.is_empty());
    }

    #[tokio::test]
    async fn like_data_depends_on_viewer() {
        let store = MemoryStore::default();
        let ferris = fixture::user(&store, "ferris").await;
        let corro = fixture::user(&store, "corro").await;
        let tweet = fixture::tweets(&store, &ferris, 1).await.remove(0);

        mutation::like(&store, AuthenticatedUser::new(corro.id), tweet.id)
            .await
            .unwrap();

        let anonymous = timeline(&store, Viewer::anonymous(), &TimelineQuery::default())
            .await
            .unwrap();
        assert_eq!(anonymous.tweets[0].like_count, 1);
        assert!(anonymous.tweets[0].viewer_likes.is_empty());

        let as_corro = Viewer::from(AuthenticatedUser::new(corro.id));
        let page = timeline(&store, as_corro, &TimelineQuery::default())
            .await
            .unwrap();
        assert_eq!(page.tweets[0].viewer_likes, [corro.id]);

        let as_ferris = Viewer::from(AuthenticatedUser::new(ferris.id));
        let page = timeline(&store, as_ferris, &TimelineQuery::default())
            .await
            .unwrap();
        assert_eq!(page.tweets[0].like_count, 1);
        assert!(page.tweets[0].viewer_likes.is_empty());
    }
}
