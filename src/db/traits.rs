//! Identity store abstraction
//!
//! This module provides the `UserStore` trait that abstracts over the
//! backends able to hold user records (in-memory, JSON file, local SQLite).
//!
//! # Example
//!
//! ```rust,ignore
//! use masterfork::db::UserStoreProvider;
//!
//! // Ephemeral store, lost on restart
//! let store = UserStoreProvider::Memory.create_store().await?;
//!
//! // In-memory collection mirrored to a JSON file
//! let store = UserStoreProvider::File { path: "data/users.json".into() }.create_store().await?;
//!
//! // Local SQLite database
//! let store = UserStoreProvider::Sqlite { path: "data/users.db".into() }.create_store().await?;
//! ```

use crate::types::{PublicUser, Result};
use crate::utils::toml_config::{IdentityBackend, IdentityConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A stored user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique, monotonically assigned identifier (>= 1)
    pub id: i64,
    pub name: String,
    /// Lower-cased, unique
    pub email: String,
    /// `salt:derivedKeyHex` encoding; older files store it under `password`
    #[serde(alias = "password")]
    pub password_hash: String,
    /// Unix timestamp of creation
    #[serde(default)]
    pub created_at: i64,
    /// Unix timestamp of last update
    #[serde(default)]
    pub updated_at: i64,
}

impl User {
    /// The externally visible view of this record.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Fields needed to create a user. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Profile changes; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Durable collection of user records.
///
/// Implementations must enforce email uniqueness (case-insensitive) inside
/// the same critical section as the write, so that concurrent `create` or
/// `update` calls cannot both pass the check.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists a new user and returns it with its assigned id.
    ///
    /// Fails with `AppError::Conflict` when the email is already taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Looks a user up by email (case-insensitive).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Looks a user up by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Applies `patch` to user `id`.
    ///
    /// Fails with `AppError::NotFound` for an unknown id and with
    /// `AppError::Conflict` when the new email belongs to another user.
    async fn update(&self, id: i64, patch: UserPatch) -> Result<User>;
}

/// Identity store backend selection
#[derive(Debug, Clone, Default)]
pub enum UserStoreProvider {
    /// In-memory collection (ephemeral, lost on restart)
    #[default]
    Memory,
    /// In-memory collection mirrored to a JSON file
    File {
        /// Path to the JSON file
        path: PathBuf,
    },
    /// Local SQLite database
    Sqlite {
        /// Path to the database file
        path: String,
    },
}

impl UserStoreProvider {
    /// Builds the provider described by the `[identity]` config section.
    pub fn from_config(config: &IdentityConfig) -> Self {
        match config.backend {
            IdentityBackend::Memory => UserStoreProvider::Memory,
            IdentityBackend::File => UserStoreProvider::File {
                path: PathBuf::from(&config.path),
            },
            IdentityBackend::Sqlite => UserStoreProvider::Sqlite {
                path: config.path.clone(),
            },
        }
    }

    /// Opens the store.
    pub async fn create_store(&self) -> Result<Arc<dyn UserStore>> {
        match self {
            UserStoreProvider::Memory => Ok(Arc::new(super::memory::MemoryUserStore::new())),
            UserStoreProvider::File { path } => {
                Ok(Arc::new(super::memory::MemoryUserStore::open(path)?))
            }
            UserStoreProvider::Sqlite { path } => {
                Ok(Arc::new(super::sqlite::SqliteUserStore::open(path).await?))
            }
        }
    }
}
