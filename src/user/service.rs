//! Business rules over the user persistence port.

use std::sync::Arc;

use crate::user::{Result, User, UserError, UserId, UserRepository};

/// User manager.
///
/// Holds no state of its own; cloning it only clones the handle to the
/// underlying [`UserRepository`].
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Removes every user. Meant for tests and administration only.
    pub async fn clear(&self) -> Result<()> {
        tracing::warn!("clearing all user data");

        let result = self.repo.clear().await;
        match &result {
            Ok(()) => tracing::info!("cleared all user data"),
            Err(err) => report("clear", err),
        }
        observe("clear", &result);
        result
    }

    /// Every stored user, ordered by identifier.
    pub async fn get_all(&self) -> Result<Vec<User>> {
        tracing::debug!("retrieving all users");

        let result = self.repo.get_all().await;
        if let Err(err) = &result {
            report("get_all", err);
        }
        observe("get_all", &result);
        result
    }

    /// Fails with [`UserError::NotFound`] if no user has this identifier.
    pub async fn get_by_id(&self, id: UserId) -> Result<User> {
        tracing::debug!(user_id = %id, "retrieving user");

        let result = self.repo.get_by_id(id).await;
        if let Err(err) = &result {
            report("get_by_id", err);
        }
        observe("get_by_id", &result);
        result
    }

    /// Fails with [`UserError::NotFound`] if no user has this login name.
    pub async fn get_by_login_name(&self, login_name: &str) -> Result<User> {
        tracing::debug!(%login_name, "retrieving user by login name");

        let result = self.repo.get_by_login_name(login_name).await;
        if let Err(err) = &result {
            report("get_by_login_name", err);
        }
        observe("get_by_login_name", &result);
        result
    }

    /// Creates `user` when it has no identifier, otherwise updates the stored
    /// user with that identifier.
    ///
    /// Returns the stored record, identifier and timestamps included.
    ///
    /// # Errors
    ///
    /// - [`UserError::InvalidInput`] if a field is missing or malformed;
    /// - [`UserError::NotFound`] when updating an identifier nobody holds;
    /// - [`UserError::DuplicateKey`] if another user already has the same
    ///   login name or email address.
    pub async fn upsert(&self, user: User) -> Result<User> {
        let result = self.try_upsert(user).await;
        observe("upsert", &result);
        result
    }

    async fn try_upsert(&self, user: User) -> Result<User> {
        let login_name = user.login_name().to_owned();

        match user.id() {
            None => tracing::info!(%login_name, "creating new user"),
            Some(id) => tracing::info!(user_id = %id, %login_name, "updating user"),
        }

        if let Err(err) = user.validate() {
            report("upsert", &err);
            return Err(err);
        }

        // an update must target a live record.
        if let Some(id) = user.id() {
            if let Err(err) = self.repo.get_by_id(id).await {
                report("upsert", &err);
                return Err(err);
            }
        }

        match self.repo.upsert(user).await {
            Ok(stored) => {
                tracing::info!(
                    user_id = ?stored.id().map(UserId::get),
                    %login_name,
                    "upserted user"
                );
                Ok(stored)
            },
            Err(err) => {
                tracing::error!(
                    %login_name,
                    outcome = err.outcome(),
                    error = %err,
                    "failed to upsert user"
                );
                Err(err)
            },
        }
    }

    /// Deletes the user with this identifier.
    ///
    /// Deleting twice fails the second time with [`UserError::NotFound`].
    pub async fn delete(&self, id: UserId) -> Result<()> {
        tracing::info!(user_id = %id, "deleting user");

        let result = self.repo.delete(id).await;
        match &result {
            Ok(()) => tracing::info!(user_id = %id, "deleted user"),
            Err(err) => report("delete", err),
        }
        observe("delete", &result);
        result
    }
}

/// Logs a failed operation at a level matching its cause.
fn report(operation: &'static str, err: &UserError) {
    match err {
        UserError::NotFound { .. } | UserError::InvalidInput { .. } => {
            tracing::warn!(
                operation,
                outcome = err.outcome(),
                error = %err,
                "user operation rejected"
            );
        },
        UserError::DuplicateKey { .. } => {
            tracing::error!(
                operation,
                outcome = err.outcome(),
                error = %err,
                "user operation rejected"
            );
        },
        UserError::Storage(source) => {
            tracing::error!(
                operation,
                outcome = err.outcome(),
                error = %source,
                "user storage failed"
            );
        },
    }
}

fn observe<T>(operation: &'static str, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(err) => err.outcome(),
    };
    metrics::counter!("user_operations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}
