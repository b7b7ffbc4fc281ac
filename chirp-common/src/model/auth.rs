use crate::{
    model::{
        Id, InvalidIdError,
        user::{User, UserMarker},
    },
    util::PositiveDuration,
};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const AUTH_TOKEN_CORE_LEN: usize = 24;
pub const AUTH_TOKEN_SALT_LEN: usize = 18;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing auth token failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error(transparent)]
    InvalidUserId(#[from] InvalidIdError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// Bearer token handed to a user once. Only its hash is ever stored.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; AUTH_TOKEN_CORE_LEN],
    pub salt: [u8; AUTH_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(pub Box<[u8; AUTH_TOKEN_HASH_LEN]>);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Authentication {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_after
            .is_some_and(|lifetime| self.created_at + lifetime.get() < now)
    }
}

/// Credentials issued together with a user that has no id yet.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewCredentials {
    pub token_hash: AuthTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl NewCredentials {
    #[must_use]
    pub fn for_user(self, user: Id<UserMarker>) -> Authentication {
        Authentication {
            user,
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_after: self.expires_after,
        }
    }
}

/// Reply of the account bootstrap procedure.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct NewAccount {
    pub user: User,
    pub token: String,
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            core: rand::random(),
            salt: rand::random(),
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{user_id}:{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        Argon2::default()
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let mut next_part = || parts.next().ok_or(Self::Err::NotEnoughParts);

        let user_id: Id<UserMarker> = next_part()?.parse()?;
        let core: [u8; AUTH_TOKEN_CORE_LEN] = BASE64_STANDARD
            .decode(next_part()?)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt: [u8; AUTH_TOKEN_SALT_LEN] = BASE64_STANDARD
            .decode(next_part()?)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            core,
            salt,
        })
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token hash had an invalid length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Vec<u8>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let bytes: [u8; AUTH_TOKEN_HASH_LEN] =
            value.try_into().map_err(|_| InvalidAuthTokenHashError)?;
        Ok(Self(Box::new(bytes)))
    }
}
