//! Process-local user storage.
//!
//! Used by tests and as fallback when no database is configured. Data is lost
//! on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::user::{Result, User, UserError, UserField, UserId, UserRepository};

/// In-memory [`UserRepository`].
#[derive(Default)]
pub struct MemoryUserRepository {
    store: RwLock<Store>,
}

impl MemoryUserRepository {
    /// Create a new empty [`MemoryUserRepository`].
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Store {
    /// Last identifier handed out. Never decreases.
    last_id: i64,
    users: BTreeMap<UserId, User>,
    login_names: HashMap<String, UserId>,
    email_addresses: HashMap<String, UserId>,
}

impl Store {
    /// Fails if a user other than `owner` holds one of the unique fields.
    fn check_unique(&self, user: &User, owner: Option<UserId>) -> Result<()> {
        let taken = |index: &HashMap<String, UserId>, key: &str| {
            index.get(key).is_some_and(|holder| Some(*holder) != owner)
        };

        if taken(&self.login_names, user.login_name()) {
            return Err(UserError::DuplicateKey {
                field: UserField::LoginName,
                value: user.login_name().to_owned(),
            });
        }

        if taken(&self.email_addresses, user.email_address()) {
            return Err(UserError::DuplicateKey {
                field: UserField::EmailAddress,
                value: user.email_address().to_owned(),
            });
        }

        Ok(())
    }

    fn insert(&mut self, id: UserId, user: User) {
        self.login_names.insert(user.login_name().to_owned(), id);
        self.email_addresses.insert(user.email_address().to_owned(), id);
        self.users.insert(id, user);
    }

    fn remove(&mut self, id: UserId) -> Option<User> {
        let user = self.users.remove(&id)?;
        self.login_names.remove(user.login_name());
        self.email_addresses.remove(user.email_address());
        Some(user)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn get_all(&self) -> Result<Vec<User>> {
        let store = self.store.read().await;
        Ok(store.users.values().cloned().collect())
    }

    async fn get_by_id(&self, id: UserId) -> Result<User> {
        let store = self.store.read().await;
        store
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| UserError::id_not_found(id))
    }

    async fn get_by_login_name(&self, login_name: &str) -> Result<User> {
        let store = self.store.read().await;
        store
            .login_names
            .get(login_name)
            .and_then(|id| store.users.get(id))
            .cloned()
            .ok_or_else(|| UserError::login_name_not_found(login_name))
    }

    async fn upsert(&self, user: User) -> Result<User> {
        let mut store = self.store.write().await;
        let now = Utc::now();

        let stored = match user.id() {
            None => {
                store.check_unique(&user, None)?;
                store.last_id += 1;
                let id = UserId::new(store.last_id);
                user.persisted(id, now, now)
            },
            Some(id) => {
                let previous = store
                    .users
                    .get(&id)
                    .ok_or_else(|| UserError::id_not_found(id))?;
                store.check_unique(&user, Some(id))?;

                let created_at = previous.created_at().unwrap_or(now);
                // clock skew must not move `updated_at` backwards.
                let updated_at = previous.updated_at().map_or(now, |last| last.max(now));
                store.remove(id);
                user.persisted(id, created_at, updated_at)
            },
        };

        if let Some(id) = stored.id() {
            store.insert(id, stored.clone());
        }
        Ok(stored)
    }

    async fn delete(&self, id: UserId) -> Result<()> {
        let mut store = self.store.write().await;
        store
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| UserError::id_not_found(id))
    }

    async fn clear(&self) -> Result<()> {
        let mut store = self.store.write().await;
        store.users.clear();
        store.login_names.clear();
        store.email_addresses.clear();
        Ok(())
    }
}
