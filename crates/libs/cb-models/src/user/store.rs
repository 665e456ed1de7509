//! The persistence contract the authentication engine relies on.

use cb_auth::role::Identity;
use uuid::Uuid;

use super::account::{NewUser, ProfileUpdate, User, UserProfile};
use crate::prelude::*;

/// User storage as seen by the authentication engine.
///
/// Only the `find_credential_*` lookups return the password hash; everything
/// else works on [`UserProfile`]. Timeouts and retries belong to the
/// implementation.
pub trait UserStore: Send + Sync {
    fn find_credential_by_email(&self, email: &str) -> Result<Option<User>>;

    fn find_credential_by_username(&self, username: &str) -> Result<Option<User>>;

    fn find_credential_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    fn find_profile_by_id(&self, id: &Uuid) -> Result<Option<UserProfile>>;

    fn find_identity_by_id(&self, id: &Uuid) -> Result<Option<Identity>> {
        Ok(self.find_profile_by_id(id)?.map(|profile| profile.identity()))
    }

    /// Stores `user`, whose credential was hashed when it was built.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] when the username or email is taken.
    fn create_user(&self, user: NewUser) -> Result<UserProfile>;

    fn update_last_login(&self, id: &Uuid) -> Result<()>;

    /// Applies a profile edit; never writes the credential.
    fn update_profile(&self, id: &Uuid, update: &ProfileUpdate) -> Result<Option<UserProfile>>;

    /// Activates or deactivates an account.
    fn set_active(&self, id: &Uuid, active: bool) -> Result<Option<UserProfile>>;

    /// Writes the user's current credential and nothing else.
    fn update_credential(&self, user: &User) -> Result<()>;
}
