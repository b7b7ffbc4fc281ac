use crate::{
    server::ServerError,
    session::{AuthenticatedUser, Viewer},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::TypedHeader;
use chirp_common::model::auth::AuthToken;
use chirp_db::store::RecordStore;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn RecordStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: AuthToken = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        let token_hash = request_token.hash()?;

        let authentication = Arc::<dyn RecordStore>::from_ref(state)
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if authentication.user != request_token.user_id {
            debug!(user_id = %request_token.user_id, "Token presented for the wrong user");
            return Err(ServerError::InvalidToken);
        }
        if authentication.is_expired_at(OffsetDateTime::now_utc()) {
            debug!(user_id = %authentication.user, "Token expired");
            return Err(ServerError::InvalidToken);
        }

        Ok(AuthenticatedUser::new(authentication.user))
    }
}

/// Reads that carry no usable credentials are anonymous. That covers a
/// missing header, a malformed one and a token that is unknown, expired or
/// issued for another user. Store failures still reject the request.
impl<S> FromRequestParts<S> for Viewer
where
    Arc<dyn RecordStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(Viewer::anonymous());
        }

        match AuthenticatedUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Viewer::from(user)),
            Err(
                err @ (ServerError::InvalidAuthorizationHeader(_)
                | ServerError::InvalidAuthToken(_)
                | ServerError::InvalidToken),
            ) => {
                debug!(error = %err, "Reading anonymously");
                Ok(Viewer::anonymous())
            }
            Err(err) => Err(err),
        }
    }
}
