use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use chirp_common::{
    model::{
        ErrorBody, Id,
        auth::{AuthTokenDecodeError, AuthTokenHashError},
        user::UserMarker,
    },
    util::PositiveDuration,
};
use chirp_db::store::{ConstraintViolation, DbError, RecordStore};
use json::Json;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn RecordStore>,
    pub accounts: AccountSettings,
}

/// How new accounts get their credentials.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AccountSettings {
    /// `None` issues tokens that never expire.
    pub token_lifetime: Option<PositiveDuration>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::Database(DbError::Constraint(ConstraintViolation::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_) => StatusCode::BAD_REQUEST,
            ServerError::Database(DbError::Constraint(ConstraintViolation::Unique(_))) => {
                StatusCode::CONFLICT
            }
            ServerError::Database(DbError::Constraint(ConstraintViolation::ForeignKey(_))) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let body = ErrorBody {
            status: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
