//! User domain: entity, persistence port and service.

mod error;
mod repository;
mod service;

pub use error::*;
pub use repository::*;
pub use service::*;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest value accepted for any caller-supplied field.
pub const MAX_FIELD_LENGTH: usize = 255;

/// Identifier assigned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wraps a raw identifier.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[inline]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user record.
///
/// Values are immutable: use [`User::to_builder`] to derive a modified copy.
/// `id`, `created_at` and `updated_at` are absent until the record has gone
/// through a [`UserRepository`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    id: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    login_name: String,
    email_address: String,
    first_name: String,
    last_name: String,
}

impl User {
    /// Creates an empty [`UserBuilder`].
    pub fn builder() -> UserBuilder {
        UserBuilder::new()
    }

    /// Creates a [`UserBuilder`] pre-filled with every field of this user,
    /// identity and timestamps included.
    pub fn to_builder(&self) -> UserBuilder {
        UserBuilder {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            login_name: self.login_name.clone(),
            email_address: self.email_address.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    pub fn id(&self) -> Option<UserId> {
        self.id
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// Returns this record as stored: identifier and both timestamps set.
    ///
    /// Only persistence adapters are expected to call this.
    pub fn persisted(
        self,
        id: UserId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            created_at: Some(created_at),
            updated_at: Some(updated_at),
            ..self
        }
    }

    /// Checks every caller-supplied field.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        required(UserField::LoginName, &self.login_name)?;
        required(UserField::EmailAddress, &self.email_address)?;
        email(&self.email_address)?;
        required(UserField::FirstName, &self.first_name)?;
        required(UserField::LastName, &self.last_name)
    }
}

fn required(field: UserField, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(UserError::InvalidInput {
            field,
            reason: "must not be blank",
        });
    }

    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(UserError::InvalidInput {
            field,
            reason: "must be at most 255 characters long",
        });
    }

    Ok(())
}

fn email(value: &str) -> Result<()> {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None)
            if !local.is_empty() && !domain.is_empty() =>
        {
            Ok(())
        },
        _ => Err(UserError::InvalidInput {
            field: UserField::EmailAddress,
            reason: "must be a valid email address",
        }),
    }
}

/// [`User`] builder.
#[derive(Debug, Clone, Default)]
pub struct UserBuilder {
    id: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    login_name: String,
    email_address: String,
    first_name: String,
    last_name: String,
}

impl UserBuilder {
    /// Create a new [`UserBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets an existing record. `None` means the user will be created.
    pub fn id(mut self, id: Option<UserId>) -> Self {
        self.id = id;
        self
    }

    pub fn login_name(mut self, login_name: impl Into<String>) -> Self {
        self.login_name = login_name.into();
        self
    }

    pub fn email_address(mut self, email_address: impl Into<String>) -> Self {
        self.email_address = email_address.into();
        self
    }

    pub fn first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self
    }

    pub fn last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = last_name.into();
        self
    }

    /// Finalizes the build.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::InvalidInput`] if a field is missing or malformed.
    pub fn build(self) -> Result<User> {
        let user = User {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            login_name: self.login_name,
            email_address: self.email_address,
            first_name: self.first_name,
            last_name: self.last_name,
        };
        user.validate()?;
        Ok(user)
    }
}
