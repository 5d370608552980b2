use crate::db::traits::{NewUser, User, UserPatch, UserStore};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Guarded in-process user collection, optionally mirrored to a JSON file.
///
/// Every mutation builds the next collection, persists it, and only then
/// publishes it, all while holding the write lock.
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
    path: Option<PathBuf>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    /// Creates an empty, purely in-memory store.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            path: None,
        }
    }

    /// Opens a store backed by the JSON file at `path`.
    ///
    /// A missing file is created as an empty array. An unreadable or corrupt
    /// file is logged and treated as empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            write_atomically(&path, &[])?;
            info!(path = %path.display(), "created empty user file");
        }

        let users = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<User>>(&raw) {
                Ok(users) => users,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "user file is corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read user file, starting empty");
                Vec::new()
            }
        };

        info!(path = %path.display(), count = users.len(), "loaded users");

        Ok(Self {
            users: RwLock::new(users),
            path: Some(path),
        })
    }

    fn persist(&self, users: &[User]) -> Result<()> {
        match &self.path {
            Some(path) => write_atomically(path, users),
            None => Ok(()),
        }
    }
}

fn next_id(users: &[User]) -> i64 {
    users.iter().map(|u| u.id).max().unwrap_or(0) + 1
}

fn email_taken(users: &[User], email: &str, except_id: Option<i64>) -> bool {
    users
        .iter()
        .any(|u| Some(u.id) != except_id && u.email.eq_ignore_ascii_case(email))
}

fn write_atomically(path: &Path, users: &[User]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Database(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
    }

    let json = serde_json::to_string_pretty(users)
        .map_err(|e| AppError::Database(format!("Failed to serialize users: {}", e)))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| AppError::Database(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| AppError::Database(format!("Failed to replace {}: {}", path.display(), e)))?;

    Ok(())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write();

        if email_taken(&users, &user.email, None) {
            return Err(AppError::Conflict("Email already registered.".to_string()));
        }

        let now = Utc::now().timestamp();
        let created = User {
            id: next_id(&users),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };

        let mut next = users.clone();
        next.push(created.clone());
        self.persist(&next)?;
        *users = next;

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<User> {
        let mut users = self.users.write();

        let index = users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        if let Some(ref email) = patch.email {
            if email_taken(&users, email, Some(id)) {
                return Err(AppError::Conflict("Email already registered.".to_string()));
            }
        }

        let mut next = users.clone();
        let target = &mut next[index];
        if let Some(name) = patch.name {
            target.name = name;
        }
        if let Some(email) = patch.email {
            target.email = email;
        }
        target.updated_at = Utc::now().timestamp();
        let updated = target.clone();

        self.persist(&next)?;
        *users = next;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "salt:hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let store = MemoryUserStore::new();

        let a = store.create(new_user("Ana", "ana@example.com")).await.unwrap();
        let b = store.create(new_user("Rui", "rui@example.com")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryUserStore::new();
        store.create(new_user("Ana", "ana@x.com")).await.unwrap();

        let result = store.create(new_user("Other", "ANA@x.com")).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(store.find_by_id(2).await.unwrap().is_none(), "nothing persisted");
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_case() {
        let store = MemoryUserStore::new();
        store.create(new_user("Ana", "ana@x.com")).await.unwrap();

        let found = store.find_by_email("Ana@X.com").await.unwrap();

        assert_eq!(found.map(|u| u.id), Some(1));
    }

    #[tokio::test]
    async fn test_update_keeps_own_email_and_rejects_others() {
        let store = MemoryUserStore::new();
        store.create(new_user("Ana", "ana@x.com")).await.unwrap();
        store.create(new_user("Rui", "rui@x.com")).await.unwrap();

        // Re-submitting the current email is not a conflict
        let same = store
            .update(
                1,
                UserPatch {
                    name: Some("Ana Maria".to_string()),
                    email: Some("ana@x.com".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(same.name, "Ana Maria");

        let taken = store
            .update(
                1,
                UserPatch {
                    name: None,
                    email: Some("rui@x.com".to_string()),
                },
            )
            .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        let missing = store.update(99, UserPatch::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
