use crate::{
    server::{Result, ServerError, ServerRouter, json::Json},
    service::{mutation, timeline},
    session::{AuthenticatedUser, Viewer},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use chirp_common::model::{
    like::{Like, LikeInput},
    timeline::{TimelinePage, TimelineQuery},
    tweet::{CreateTweetInput, Tweet},
};
use chirp_db::store::RecordStore;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(get_timeline)
        .typed_post(create_tweet)
        .typed_post(like_tweet)
        .typed_post(unlike_tweet)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tweets/timeline", rejection(ServerError))]
struct TimelinePath();

async fn get_timeline(
    TimelinePath(): TimelinePath,
    State(store): State<Arc<dyn RecordStore>>,
    viewer: Viewer,
    Json(query): Json<TimelineQuery>,
) -> Result<Json<TimelinePage>> {
    let page = timeline::timeline(store.as_ref(), viewer, &query).await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tweets/create", rejection(ServerError))]
struct CreateTweetPath();

async fn create_tweet(
    CreateTweetPath(): CreateTweetPath,
    State(store): State<Arc<dyn RecordStore>>,
    user: AuthenticatedUser,
    Json(input): Json<CreateTweetInput>,
) -> Result<Json<Tweet>> {
    let tweet = mutation::create(store.as_ref(), user, input.text).await?;

    Ok(Json(tweet))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tweets/like", rejection(ServerError))]
struct LikeTweetPath();

async fn like_tweet(
    LikeTweetPath(): LikeTweetPath,
    State(store): State<Arc<dyn RecordStore>>,
    user: AuthenticatedUser,
    Json(input): Json<LikeInput>,
) -> Result<Json<Like>> {
    let like = mutation::like(store.as_ref(), user, input.tweet_id).await?;

    Ok(Json(like))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tweets/unlike", rejection(ServerError))]
struct UnlikeTweetPath();

async fn unlike_tweet(
    UnlikeTweetPath(): UnlikeTweetPath,
    State(store): State<Arc<dyn RecordStore>>,
    user: AuthenticatedUser,
    Json(input): Json<LikeInput>,
) -> Result<Json<Like>> {
    let like = mutation::unlike(store.as_ref(), user, input.tweet_id).await?;

    Ok(Json(like))
}

#[cfg(test)]
mod tests {
    use crate::{
        server::test_util::{app, app_with_store, post, send},
        service::fixture,
    };
    use axum::http::StatusCode;
    use chirp_common::{
        model::{
            ErrorBody,
            auth::{AuthToken, Authentication, NewAccount},
            like::Like,
            timeline::TimelinePage,
            tweet::Tweet,
        },
        util::PositiveDuration,
    };
    use chirp_db::{memory::MemoryStore, store::RecordStore};
    use serde_json::json;
    use std::sync::Arc;
    use time::{Duration, OffsetDateTime};

    async fn sign_up(app: &axum::Router, name: &str) -> NewAccount {
        let (status, account) = send(app, post("/users", None, &json!({ "name": name }))).await;
        assert_eq!(status, StatusCode::OK);
        account
    }

    #[tokio::test]
    async fn mutations_require_a_token() {
        let app = app();
        let body = json!({ "text": "hello there, world" });

        let (status, error): (_, ErrorBody) = send(&app, post("/tweets/create", None, &body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.status, 401);

        let forged = "1:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA:AAAAAAAAAAAAAAAAAAAAAAAA";
        let (status, _): (_, ErrorBody) =
            send(&app, post("/tweets/create", Some(forged), &body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _): (_, ErrorBody) =
            send(&app, post("/tweets/create", Some("garbage"), &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unusable_tokens_read_anonymously() {
        let store = Arc::new(MemoryStore::default());
        let ferris = fixture::user(&store, "ferris").await;
        let tweets = fixture::tweets(&store, &ferris, 1).await;
        store.create_like(tweets[0].id, ferris.id).await.unwrap();

        let expired = AuthToken::generate_random(ferris.id);
        store
            .create_auth(&Authentication {
                user: ferris.id,
                token_hash: expired.hash().unwrap(),
                created_at: OffsetDateTime::now_utc() - Duration::hours(2),
                expires_after: Some(PositiveDuration::try_from(Duration::hours(1)).unwrap()),
            })
            .await
            .unwrap();
        let expired = expired.as_token_str();
        let unknown = "1:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA:AAAAAAAAAAAAAAAAAAAAAAAA";

        let app = app_with_store(store);
        for token in [expired.as_str(), unknown, "garbage"] {
            let (status, page): (_, TimelinePage) =
                send(&app, post("/tweets/timeline", Some(token), &json!({}))).await;
            assert_eq!(status, StatusCode::OK, "token {token}");
            assert_eq!(page.tweets.len(), 1);
            assert_eq!(page.tweets[0].like_count, 1);
            assert!(page.tweets[0].viewer_likes.is_empty());
        }

        let body = json!({ "text": "hello there, world" });
        let (status, _): (_, ErrorBody) =
            send(&app, post("/tweets/create", Some(expired.as_str()), &body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let app = app();
        let account = sign_up(&app, "ferris").await;
        let token = Some(account.token.as_str());

        let (status, error): (_, ErrorBody) =
            send(&app, post("/tweets/create", token, &json!({ "text": "short" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error.message.contains("10 to 280 characters"));

        let (status, _): (_, ErrorBody) =
            send(&app, post("/tweets/timeline", None, &json!({ "limit": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _): (_, ErrorBody) =
            send(&app, post("/tweets/timeline", None, &json!({ "limit": 101 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_like_and_read_back() {
        let app = app();
        let ferris = sign_up(&app, "ferris").await;
        let corro = sign_up(&app, "corro").await;
        let corro_token = Some(corro.token.as_str());

        let (status, tweet): (_, Tweet) = send(
            &app,
            post(
                "/tweets/create",
                Some(ferris.token.as_str()),
                &json!({ "text": "hello there, world" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tweet.author, ferris.user);

        let like_input = json!({ "tweetId": tweet.id });
        let (status, like): (_, Like) =
            send(&app, post("/tweets/like", corro_token, &like_input)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(like.user_id, corro.user.id);

        let (status, error): (_, ErrorBody) =
            send(&app, post("/tweets/like", corro_token, &like_input)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error.status, 409);

        let (status, page): (_, TimelinePage) =
            send(&app, post("/tweets/timeline", corro_token, &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page.tweets.len(), 1);
        assert_eq!(page.tweets[0].like_count, 1);
        assert_eq!(page.tweets[0].viewer_likes, [corro.user.id]);
        assert_eq!(page.next_cursor, None);

        let (_, page): (_, TimelinePage) =
            send(&app, post("/tweets/timeline", None, &json!({}))).await;
        assert_eq!(page.tweets[0].like_count, 1);
        assert!(page.tweets[0].viewer_likes.is_empty());

        let (status, _): (_, Like) =
            send(&app, post("/tweets/unlike", corro_token, &like_input)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _): (_, ErrorBody) =
            send(&app, post("/tweets/unlike", corro_token, &like_input)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _): (_, ErrorBody) = send(
            &app,
            post("/tweets/like", corro_token, &json!({ "tweetId": "404" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn timeline_pages_through_the_wire() {
        let app = app();
        let ferris = sign_up(&app, "ferris").await;
        for n in 0..5 {
            let text = json!({ "text": format!("tweet number {n} from ferris") });
            let (status, _): (_, Tweet) =
                send(&app, post("/tweets/create", Some(ferris.token.as_str()), &text)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, first): (_, TimelinePage) = send(
            &app,
            post(
                "/tweets/timeline",
                None,
                &json!({ "limit": 3, "where": { "author": { "name": "ferris" } } }),
            ),
        )
        .await;
        assert_eq!(first.tweets.len(), 3);
        let cursor = first.next_cursor.unwrap();

        let (_, second): (_, TimelinePage) = send(
            &app,
            post(
                "/tweets/timeline",
                None,
                &json!({ "limit": 3, "cursor": cursor, "where": { "author": { "name": "ferris" } } }),
            ),
        )
        .await;
        assert_eq!(second.tweets.len(), 2);
        assert_eq!(second.tweets[0].id, cursor);
        assert_eq!(second.next_cursor, None);
    }
}
