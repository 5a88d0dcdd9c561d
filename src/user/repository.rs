//! Port between the user service and durable storage.

use async_trait::async_trait;

use crate::user::{Result, User, UserId};

/// Port for user persistence.
///
/// Implementations own the authoritative copy of every record and must:
/// - assign a fresh identifier to records created without one, never reusing
///   an identifier, even after deletion;
/// - stamp `created_at` on creation and `updated_at` on every write, keeping
///   `created_at` on updates;
/// - reject a write whose login name or email address is held by a different
///   record with [`crate::user::UserError::DuplicateKey`];
/// - make those checks and the stamping atomic with the write.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Every stored user, ordered by identifier.
    async fn get_all(&self) -> Result<Vec<User>>;

    /// Fails with `NotFound` if no user has this identifier.
    async fn get_by_id(&self, id: UserId) -> Result<User>;

    /// Fails with `NotFound` if no user has this login name.
    async fn get_by_login_name(&self, login_name: &str) -> Result<User>;

    /// Inserts a user without identifier, or replaces the one with the same
    /// identifier. Returns the stored record.
    async fn upsert(&self, user: User) -> Result<User>;

    /// Fails with `NotFound` if no user has this identifier.
    async fn delete(&self, id: UserId) -> Result<()>;

    /// Removes every user.
    async fn clear(&self) -> Result<()>;
}
