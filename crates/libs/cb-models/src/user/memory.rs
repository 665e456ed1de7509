//! In-process user storage for tests and database-less runs.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use chrono::Utc;
use uuid::Uuid;

use super::{
    account::{NewUser, ProfileUpdate, User, UserProfile},
    store::UserStore,
};
use crate::prelude::*;

/// A [`UserStore`] backed by a map guarded by a mutex.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>> {
        self.users.lock().map_err(|_| Error::LockPoisoned)
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Result<Option<User>> {
        Ok(self.users()?.values().find(|user| predicate(*user)).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.users()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.users()?.is_empty())
    }
}

impl UserStore for MemoryUserStore {
    fn find_credential_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find(|user| user.profile.email == email)
    }

    fn find_credential_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find(|user| user.profile.username == username)
    }

    fn find_profile_by_id(&self, id: &Uuid) -> Result<Option<UserProfile>> {
        Ok(self.users()?.get(id).map(|user| user.profile.clone()))
    }

    fn create_user(&self, new_user: NewUser) -> Result<UserProfile> {
        let mut users = self.users()?;
        if users
            .values()
            .any(|user| user.profile.username == new_user.username)
        {
            return Err(Error::AlreadyExists("username"));
        }
        if users.values().any(|user| user.profile.email == new_user.email) {
            return Err(Error::AlreadyExists("email"));
        }

        let now = Utc::now();
        let profile = UserProfile {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            display_name: new_user.display_name,
            bio: None,
            role: new_user.role,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(
            profile.id,
            User {
                profile: profile.clone(),
                credential: new_user.credential,
            },
        );
        Ok(profile)
    }

    fn find_credential_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users()?.get(id).cloned())
    }

    fn update_last_login(&self, id: &Uuid) -> Result<()> {
        if let Some(user) = self.users()?.get_mut(id) {
            user.profile.last_login = Some(Utc::now());
        }
        Ok(())
    }

    fn update_profile(&self, id: &Uuid, update: &ProfileUpdate) -> Result<Option<UserProfile>> {
        Ok(self.users()?.get_mut(id).map(|user| {
            update.apply(&mut user.profile);
            user.profile.updated_at = Utc::now();
            user.profile.clone()
        }))
    }

    fn set_active(&self, id: &Uuid, active: bool) -> Result<Option<UserProfile>> {
        Ok(self.users()?.get_mut(id).map(|user| {
            user.profile.is_active = active;
            user.profile.updated_at = Utc::now();
            user.profile.clone()
        }))
    }

    fn update_credential(&self, updated: &User) -> Result<()> {
        if let Some(user) = self.users()?.get_mut(&updated.profile.id) {
            user.credential = updated.credential.clone();
            user.profile.updated_at = Utc::now();
        }
        Ok(())
    }
}
