//! Typed failures of the user domain.

use std::fmt;

use crate::user::UserId;

pub type Result<T> = std::result::Result<T, UserError>;

/// Which key a lookup was made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Id,
    LoginName,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Id => write!(f, "id"),
            IdentifierKind::LoginName => write!(f, "login name"),
        }
    }
}

/// Fields of a [`crate::user::User`] supplied by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    LoginName,
    EmailAddress,
    FirstName,
    LastName,
}

impl UserField {
    /// Name of the field as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserField::LoginName => "loginName",
            UserField::EmailAddress => "emailAddress",
            UserField::FirstName => "firstName",
            UserField::LastName => "lastName",
        }
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enum representing user domain errors.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("no user with {kind} '{value}'")]
    NotFound { kind: IdentifierKind, value: String },

    #[error("a user with {field} '{value}' already exists")]
    DuplicateKey { field: UserField, value: String },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: UserField, reason: &'static str },

    #[error("user storage failed")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl UserError {
    /// No user carries this identifier.
    pub fn id_not_found(id: UserId) -> Self {
        Self::NotFound {
            kind: IdentifierKind::Id,
            value: id.to_string(),
        }
    }

    /// No user carries this login name.
    pub fn login_name_not_found(login_name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: IdentifierKind::LoginName,
            value: login_name.into(),
        }
    }

    /// Short label used in logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            UserError::NotFound { .. } => "not_found",
            UserError::DuplicateKey { .. } => "duplicate_key",
            UserError::InvalidInput { .. } => "invalid_input",
            UserError::Storage(_) => "storage_error",
        }
    }
}

/// Turns any infrastructure error into [`UserError::Storage`].
pub trait ToStorage<T> {
    fn catch(self) -> Result<T>;
}

impl<T, E> ToStorage<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn catch(self) -> Result<T> {
        self.map_err(|e| UserError::Storage(Box::new(e)))
    }
}
