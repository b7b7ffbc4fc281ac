//! Identity of the caller, passed explicitly into every service call.

use chirp_common::model::{Id, user::UserMarker};

/// A caller who presented a valid bearer token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn new(id: Id<UserMarker>) -> Self {
        Self { id }
    }

    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }
}

/// The reader of a timeline, who may be anonymous.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Viewer {
    user: Option<AuthenticatedUser>,
}

impl Viewer {
    #[must_use]
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    #[must_use]
    pub fn user_id(self) -> Option<Id<UserMarker>> {
        self.user.map(AuthenticatedUser::user_id)
    }
}

impl From<AuthenticatedUser> for Viewer {
    fn from(value: AuthenticatedUser) -> Self {
        Self { user: Some(value) }
    }
}
