//! User account records.

use cb_auth::role::{Identity, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::credential::Credential;
use crate::prelude::*;

/// Everything about a user except the password hash.
///
/// This is what default lookups return and what is sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.email.clone(), self.role)
    }
}

/// A user together with their credential, as needed for password checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub profile: UserProfile,
    pub credential: Credential,
}

impl User {
    pub fn identity(&self) -> Identity {
        self.profile.identity()
    }

    /// Rehashes the credential. Persist with
    /// [`UserStore::update_credential`](super::store::UserStore::update_credential).
    pub fn set_password(&mut self, plaintext: &str) -> Result<()> {
        self.credential.set_password(plaintext)
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub credential: Credential,
    pub display_name: Option<String>,
    pub role: Role,
}

impl NewUser {
    /// Builds a regular member, hashing `password` on the way.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: &str,
        display_name: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            username: username.into(),
            email: email.into(),
            credential: Credential::from_password(password)?,
            display_name,
            role: Role::User,
        })
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn set_password(&mut self, plaintext: &str) -> Result<()> {
        self.credential.set_password(plaintext)
    }
}

/// Profile fields a user may edit about themselves.
///
/// `None` leaves a field untouched. There is deliberately no password here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.bio.is_none()
    }

    pub fn apply(&self, profile: &mut UserProfile) {
        if let Some(display_name) = &self.display_name {
            profile.display_name = Some(display_name.clone());
        }
        if let Some(bio) = &self.bio {
            profile.bio = Some(bio.clone());
        }
    }
}
