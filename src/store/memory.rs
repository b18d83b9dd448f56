/// In-process stores
///
/// Same contract as `PgStore`: one mutex guards all tables, so a delete is
/// atomic and two concurrent deletes of one record produce one `true`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Credential, CredentialStore, RefreshRecord, TokenStore};
use crate::error::{AppError, DatabaseError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, Credential>,
    refresh_tokens: HashMap<Uuid, RefreshRecord>,
    /// token_hash -> record id
    digest_index: HashMap<String, Uuid>,
}

impl Tables {
    fn remove_refresh(&mut self, id: Uuid) -> bool {
        match self.refresh_tokens.remove(&id) {
            Some(record) => {
                self.digest_index.remove(&record.token_hash);
                true
            }
            None => false,
        }
    }

    fn remove_refresh_where(&mut self, predicate: impl Fn(&RefreshRecord) -> bool) -> u64 {
        let doomed: Vec<Uuid> = self
            .refresh_tokens
            .values()
            .filter(|record| predicate(record))
            .map(|record| record.id)
            .collect();

        doomed.into_iter().filter(|id| self.remove_refresh(*id)).count() as u64
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }

    /// Number of live refresh records
    pub fn refresh_record_count(&self) -> Result<usize, AppError> {
        Ok(self.tables()?.refresh_tokens.len())
    }

    /// Every stored digest, for inspecting what was persisted
    pub fn stored_digests(&self) -> Result<Vec<String>, AppError> {
        Ok(self.tables()?.digest_index.keys().cloned().collect())
    }
}

#[async_trait::async_trait]
impl TokenStore for InMemoryStore {
    async fn create_refresh_record(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        issued_at: DateTime<Utc>,
        revoked: bool,
    ) -> Result<Uuid, AppError> {
        let mut tables = self.tables()?;
        if tables.digest_index.contains_key(token_hash) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "refresh token digest already stored".to_string(),
            )
            .into());
        }

        let record = RefreshRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            issued_at,
            expires_at,
            revoked,
            created_at: Utc::now(),
        };
        let id = record.id;
        tables.digest_index.insert(record.token_hash.clone(), id);
        tables.refresh_tokens.insert(id, record);
        Ok(id)
    }

    async fn get_refresh_record_by_digest(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshRecord>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .digest_index
            .get(token_hash)
            .and_then(|id| tables.refresh_tokens.get(id))
            .cloned())
    }

    async fn delete_refresh_record_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables()?.remove_refresh(id))
    }

    async fn delete_refresh_record_by_digest(&self, token_hash: &str) -> Result<bool, AppError> {
        let mut tables = self.tables()?;
        match tables.digest_index.get(token_hash).copied() {
            Some(id) => Ok(tables.remove_refresh(id)),
            None => Ok(false),
        }
    }

    async fn delete_refresh_records_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        Ok(self
            .tables()?
            .remove_refresh_where(|record| record.user_id == user_id))
    }

    async fn delete_expired_refresh_records(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        Ok(self
            .tables()?
            .remove_refresh_where(|record| record.expires_at < now))
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryStore {
    async fn get_credential_by_email(&self, email: &str) -> Result<Option<Credential>, AppError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn get_credential_by_id(&self, id: Uuid) -> Result<Option<Credential>, AppError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn create_credential(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Uuid, AppError> {
        let mut tables = self.tables()?;
        if tables.users.values().any(|user| user.email == email) {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            )
            .into());
        }

        let id = Uuid::new_v4();
        tables.users.insert(
            id,
            Credential {
                id,
                name: name.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(id)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        match self.tables()?.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_refresh_record_roundtrip_by_digest() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let id = store
            .create_refresh_record(user_id, "digest-a", now + Duration::days(7), now, false)
            .await
            .expect("Failed to create record");

        let record = store
            .get_refresh_record_by_digest("digest-a")
            .await
            .expect("Lookup failed")
            .expect("Record should exist");

        assert_eq!(record.id, id);
        assert_eq!(record.user_id, user_id);
        assert!(!record.revoked);
        assert!(store
            .get_refresh_record_by_digest("digest-b")
            .await
            .expect("Lookup failed")
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_digest_is_rejected() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store
            .create_refresh_record(Uuid::new_v4(), "same", now, now, false)
            .await
            .expect("Failed to create record");

        let result = store
            .create_refresh_record(Uuid::new_v4(), "same", now, now, false)
            .await;
        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_second_delete_reports_nothing_deleted() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let id = store
            .create_refresh_record(Uuid::new_v4(), "digest", now, now, false)
            .await
            .expect("Failed to create record");

        assert!(store.delete_refresh_record_by_id(id).await.unwrap());
        assert!(!store.delete_refresh_record_by_id(id).await.unwrap());
        assert!(!store.delete_refresh_record_by_digest("digest").await.unwrap());
        assert_eq!(store.refresh_record_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired_and_per_user() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store
            .create_refresh_record(alice, "a1", now - Duration::days(1), now, false)
            .await
            .unwrap();
        store
            .create_refresh_record(alice, "a2", now + Duration::days(1), now, false)
            .await
            .unwrap();
        store
            .create_refresh_record(bob, "b1", now + Duration::days(1), now, false)
            .await
            .unwrap();

        assert_eq!(store.delete_expired_refresh_records(now).await.unwrap(), 1);
        assert_eq!(store.delete_refresh_records_for_user(alice).await.unwrap(), 1);
        assert_eq!(store.stored_digests().unwrap(), vec!["b1".to_string()]);
    }

    #[tokio::test]
    async fn test_credentials() {
        let store = InMemoryStore::new();
        let id = store
            .create_credential("Alice", "alice@example.com", "$2b$hash")
            .await
            .expect("Failed to create user");

        let by_email = store
            .get_credential_by_email("alice@example.com")
            .await
            .unwrap()
            .expect("User should exist");
        assert_eq!(by_email.id, id);

        assert!(store
            .create_credential("Other", "alice@example.com", "$2b$other")
            .await
            .is_err());

        assert!(store.update_password_hash(id, "$2b$new").await.unwrap());
        assert!(!store
            .update_password_hash(Uuid::new_v4(), "$2b$new")
            .await
            .unwrap());
        let by_id = store.get_credential_by_id(id).await.unwrap().unwrap();
        assert_eq!(by_id.password_hash, "$2b$new");
    }
}
