use crate::server::{AccountSettings, Result, ServerError, ServerRouter, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use chirp_common::model::{
    Id,
    auth::{AuthToken, NewAccount, NewCredentials},
    user::{CreateUser, User, UserMarker},
};
use chirp_db::store::RecordStore;
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_user)
        .typed_post(create_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(store): State<Arc<dyn RecordStore>>,
) -> Result<Json<User>> {
    let user = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct CreateUserPath();

/// Registers a user and hands out their only copy of a bearer token.
async fn create_user(
    CreateUserPath(): CreateUserPath,
    State(store): State<Arc<dyn RecordStore>>,
    State(accounts): State<AccountSettings>,
    Json(user): Json<CreateUser>,
) -> Result<Json<NewAccount>> {
    // The hash covers only the secret parts, so the id is filled in later.
    let token = AuthToken::generate_random(Id::from(0));
    let credentials = NewCredentials {
        token_hash: token.hash()?,
        created_at: OffsetDateTime::now_utc(),
        expires_after: accounts.token_lifetime,
    };
    let user = store.create_account(&user, &credentials).await?;
    let token = AuthToken {
        user_id: user.id,
        ..token
    };

    info!(user_id = %user.id, name = user.name.get(), "Created account");

    Ok(Json(NewAccount {
        user,
        token: token.as_token_str(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::server::test_util::{app, get, post, send};
    use axum::http::StatusCode;
    use chirp_common::model::{ErrorBody, auth::NewAccount, tweet::Tweet, user::User};
    use serde_json::json;

    #[tokio::test]
    async fn created_user_can_be_fetched() {
        let app = app();

        let (status, account): (_, NewAccount) = send(
            &app,
            post("/users", None, &json!({ "name": "ferris", "image": "crab.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(account.token.starts_with(&format!("{}:", account.user.id)));

        let (status, user): (_, User) = send(&app, get(&format!("/users/{}", account.user.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user, account.user);
        assert_eq!(user.image.as_deref(), Some("crab.png"));

        let (status, tweet): (_, Tweet) = send(
            &app,
            post(
                "/tweets/create",
                Some(account.token.as_str()),
                &json!({ "text": "my first tweet here" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tweet.author, account.user);
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let app = app();
        let body = json!({ "name": "ferris" });

        let (status, _): (_, NewAccount) = send(&app, post("/users", None, &body)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, error): (_, ErrorBody) = send(&app, post("/users", None, &body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error.status, 409);
    }

    #[tokio::test]
    async fn unknown_users_and_routes_are_not_found() {
        let app = app();

        let (status, _): (_, ErrorBody) = send(&app, get("/users/12345")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _): (_, ErrorBody) = send(&app, get("/users/not-a-number")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _): (_, ErrorBody) = send(&app, get("/nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
