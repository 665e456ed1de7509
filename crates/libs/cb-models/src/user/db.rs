//! PostgreSQL user storage.

use cb_auth::role::Role;
use chrono::{DateTime, Utc};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use tracing::debug;
use uuid::Uuid;

use super::{
    account::{NewUser, ProfileUpdate, User, UserProfile},
    credential::Credential,
    store::UserStore,
};
use crate::{db::connection::DbConnection, prelude::*, schema::users::dsl::*};

/// A row of the `users` table.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
struct UserInsert<'a> {
    id: Uuid,
    username: &'a str,
    email: &'a str,
    password_hash: &'a str,
    display_name: Option<&'a str>,
    role: &'a str,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::users)]
struct ProfileChangeset<'a> {
    display_name: Option<&'a str>,
    bio: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_profile(self) -> Result<(UserProfile, String)> {
        let parsed_role: Role = self.role.parse()?;
        Ok((
            UserProfile {
                id: self.id,
                username: self.username,
                email: self.email,
                display_name: self.display_name,
                bio: self.bio,
                role: parsed_role,
                is_active: self.is_active,
                last_login: self.last_login,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            self.password_hash,
        ))
    }

    fn into_user(self) -> Result<User> {
        let (profile, hash) = self.into_profile()?;
        Ok(User {
            profile,
            credential: Credential::from_hash(hash),
        })
    }

    /// Fetches a user by email.
    pub fn fetch_by_email(target: &str, connection: &DbConnection) -> Result<Option<Self>> {
        let conn = &mut connection.pool.get()?;
        Ok(users
            .filter(email.eq(target))
            .select(UserRow::as_select())
            .first(conn)
            .optional()?)
    }

    /// Fetches a user by username.
    pub fn fetch_by_username(target: &str, connection: &DbConnection) -> Result<Option<Self>> {
        let conn = &mut connection.pool.get()?;
        Ok(users
            .filter(username.eq(target))
            .select(UserRow::as_select())
            .first(conn)
            .optional()?)
    }

    /// Fetches a user by ID.
    pub fn fetch_by_id(target: &Uuid, connection: &DbConnection) -> Result<Option<Self>> {
        let conn = &mut connection.pool.get()?;
        Ok(UserRow::by_id(target)
            .select(UserRow::as_select())
            .first(conn)
            .optional()?)
    }

    /// Returns a query filtered by user ID.
    #[diesel::dsl::auto_type(no_type_alias)]
    pub fn by_id(target: &Uuid) -> _ {
        users.filter(id.eq(target))
    }
}

fn unique_violation(err: DieselError) -> Error {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
            if info
                .constraint_name()
                .is_some_and(|constraint| constraint.contains("username"))
            {
                Error::AlreadyExists("username")
            } else {
                Error::AlreadyExists("email")
            }
        }
        other => Error::Diesel(other),
    }
}

impl UserStore for DbConnection {
    fn find_credential_by_email(&self, target: &str) -> Result<Option<User>> {
        UserRow::fetch_by_email(target, self)?
            .map(UserRow::into_user)
            .transpose()
    }

    fn find_credential_by_username(&self, target: &str) -> Result<Option<User>> {
        UserRow::fetch_by_username(target, self)?
            .map(UserRow::into_user)
            .transpose()
    }

    fn find_credential_by_id(&self, target: &Uuid) -> Result<Option<User>> {
        UserRow::fetch_by_id(target, self)?
            .map(UserRow::into_user)
            .transpose()
    }

    fn find_profile_by_id(&self, target: &Uuid) -> Result<Option<UserProfile>> {
        UserRow::fetch_by_id(target, self)?
            .map(|row| row.into_profile().map(|(profile, _)| profile))
            .transpose()
    }

    fn create_user(&self, user: NewUser) -> Result<UserProfile> {
        let conn = &mut self.pool.get()?;
        let insert = UserInsert {
            id: Uuid::new_v4(),
            username: &user.username,
            email: &user.email,
            password_hash: user.credential.as_hash(),
            display_name: user.display_name.as_deref(),
            role: user.role.as_str(),
        };

        let row = diesel::insert_into(users)
            .values(insert)
            .returning(UserRow::as_returning())
            .get_result(conn)
            .map_err(unique_violation)?;
        debug!("Created user {}", row.id);

        Ok(row.into_profile()?.0)
    }

    fn update_last_login(&self, target: &Uuid) -> Result<()> {
        let conn = &mut self.pool.get()?;
        diesel::update(UserRow::by_id(target))
            .set(last_login.eq(Some(Utc::now())))
            .execute(conn)?;
        Ok(())
    }

    fn update_profile(&self, target: &Uuid, update: &ProfileUpdate) -> Result<Option<UserProfile>> {
        let conn = &mut self.pool.get()?;
        let changeset = ProfileChangeset {
            display_name: update.display_name.as_deref(),
            bio: update.bio.as_deref(),
            updated_at: Utc::now(),
        };

        diesel::update(UserRow::by_id(target))
            .set(changeset)
            .returning(UserRow::as_returning())
            .get_result(conn)
            .optional()?
            .map(|row| row.into_profile().map(|(profile, _)| profile))
            .transpose()
    }

    fn set_active(&self, target: &Uuid, active: bool) -> Result<Option<UserProfile>> {
        let conn = &mut self.pool.get()?;
        diesel::update(UserRow::by_id(target))
            .set((is_active.eq(active), updated_at.eq(Utc::now())))
            .returning(UserRow::as_returning())
            .get_result(conn)
            .optional()?
            .map(|row| row.into_profile().map(|(profile, _)| profile))
            .transpose()
    }

    fn update_credential(&self, user: &User) -> Result<()> {
        let conn = &mut self.pool.get()?;
        diesel::update(UserRow::by_id(&user.profile.id))
            .set((
                password_hash.eq(user.credential.as_hash()),
                updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    }
}
