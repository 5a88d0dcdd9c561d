//! PostgreSQL implementation of the user repository.
//!
//! Uniqueness is enforced by the `users_login_name_key` and
//! `users_email_address_key` constraints, timestamps by `now()` on the server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::user::{
    Result, ToStorage, User, UserError, UserField, UserId, UserRepository,
};

const LOGIN_NAME_CONSTRAINT: &str = "users_login_name_key";
const EMAIL_ADDRESS_CONSTRAINT: &str = "users_email_address_key";

/// User row as stored in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub login_name: String,
    pub email_address: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserRecord {
    /// Convert to a persisted [`User`].
    pub fn try_into_user(self) -> Result<User> {
        let user = User::builder()
            .login_name(self.login_name)
            .email_address(self.email_address)
            .first_name(self.first_name)
            .last_name(self.last_name)
            .build()?;

        Ok(user.persisted(UserId::new(self.id), self.created_at, self.updated_at))
    }
}

/// PostgreSQL user repository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, user: &User) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (login_name, email_address, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING
                id, created_at, updated_at,
                login_name, email_address, first_name, last_name
            "#,
        )
        .bind(user.login_name())
        .bind(user.email_address())
        .bind(user.first_name())
        .bind(user.last_name())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| conflict(err, user))?;

        record.try_into_user()
    }

    async fn update(&self, id: UserId, user: &User) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users
            SET
                login_name = $2,
                email_address = $3,
                first_name = $4,
                last_name = $5,
                updated_at = GREATEST(now(), updated_at)
            WHERE id = $1
            RETURNING
                id, created_at, updated_at,
                login_name, email_address, first_name, last_name
            "#,
        )
        .bind(id.get())
        .bind(user.login_name())
        .bind(user.email_address())
        .bind(user.first_name())
        .bind(user.last_name())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| conflict(err, user))?;

        match record {
            Some(record) => record.try_into_user(),
            None => Err(UserError::id_not_found(id)),
        }
    }
}

/// Maps unique violations to [`UserError::DuplicateKey`].
fn conflict(err: sqlx::Error, user: &User) -> UserError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(LOGIN_NAME_CONSTRAINT) => {
                    return UserError::DuplicateKey {
                        field: UserField::LoginName,
                        value: user.login_name().to_owned(),
                    };
                },
                Some(EMAIL_ADDRESS_CONSTRAINT) => {
                    return UserError::DuplicateKey {
                        field: UserField::EmailAddress,
                        value: user.email_address().to_owned(),
                    };
                },
                _ => {},
            }
        }
    }

    UserError::Storage(Box::new(err))
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_all(&self) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT
                id, created_at, updated_at,
                login_name, email_address, first_name, last_name
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .catch()?;

        records.into_iter().map(UserRecord::try_into_user).collect()
    }

    async fn get_by_id(&self, id: UserId) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT
                id, created_at, updated_at,
                login_name, email_address, first_name, last_name
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?;

        match record {
            Some(record) => record.try_into_user(),
            None => Err(UserError::id_not_found(id)),
        }
    }

    async fn get_by_login_name(&self, login_name: &str) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT
                id, created_at, updated_at,
                login_name, email_address, first_name, last_name
            FROM users
            WHERE login_name = $1
            "#,
        )
        .bind(login_name)
        .fetch_optional(&self.pool)
        .await
        .catch()?;

        match record {
            Some(record) => record.try_into_user(),
            None => Err(UserError::login_name_not_found(login_name)),
        }
    }

    async fn upsert(&self, user: User) -> Result<User> {
        match user.id() {
            None => self.insert(&user).await,
            Some(id) => self.update(id, &user).await,
        }
    }

    async fn delete(&self, id: UserId) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id.get())
            .execute(&self.pool)
            .await
            .catch()?;

        if result.rows_affected() == 0 {
            return Err(UserError::id_not_found(id));
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        // the identity sequence keeps advancing, so ids are never reused.
        sqlx::query(r#"DELETE FROM users"#)
            .execute(&self.pool)
            .await
            .catch()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::tests::{assert_same_fields, jane, maxi};

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance through DATABASE_URL"]
    async fn test_create_and_read(pool: PgPool) {
        let repo = PgUserRepository::new(pool);

        let created = repo.upsert(jane()).await.unwrap();
        assert!(created.id().is_some());
        assert_same_fields(&created, &jane());

        let by_id = repo.get_by_id(created.id().unwrap()).await.unwrap();
        let by_name = repo.get_by_login_name("jane_doe").await.unwrap();
        assert_eq!(by_id, created);
        assert_eq!(by_name, created);
    }

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance through DATABASE_URL"]
    async fn test_unique_constraints(pool: PgPool) {
        let repo = PgUserRepository::new(pool);
        repo.upsert(jane()).await.unwrap();

        let same_login = maxi().to_builder().login_name("jane_doe").build().unwrap();
        assert!(matches!(
            repo.upsert(same_login).await,
            Err(UserError::DuplicateKey {
                field: UserField::LoginName,
                ..
            })
        ));

        let same_email = maxi()
            .to_builder()
            .email_address("jane.doe@example.com")
            .build()
            .unwrap();
        assert!(matches!(
            repo.upsert(same_email).await,
            Err(UserError::DuplicateKey {
                field: UserField::EmailAddress,
                ..
            })
        ));
    }

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance through DATABASE_URL"]
    async fn test_update_and_delete(pool: PgPool) {
        let repo = PgUserRepository::new(pool);
        let created = repo.upsert(jane()).await.unwrap();
        let id = created.id().unwrap();

        let renamed = created.to_builder().first_name("Janet").build().unwrap();
        let updated = repo.upsert(renamed).await.unwrap();
        assert_eq!(updated.created_at(), created.created_at());
        assert!(updated.updated_at() >= created.updated_at());
        assert_eq!(updated.first_name(), "Janet");

        repo.delete(id).await.unwrap();
        assert!(matches!(repo.delete(id).await, Err(UserError::NotFound { .. })));
        assert!(matches!(repo.upsert(updated).await, Err(UserError::NotFound { .. })));

        repo.clear().await.unwrap();
        let again = repo.upsert(jane()).await.unwrap();
        assert!(again.id().unwrap() > id);
    }
}
