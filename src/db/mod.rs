//! Identity store.
//!
//! This module provides the user record collection consumed by the auth service:
//! - **traits**: the `UserStore` interface and backend selection
//! - **memory**: guarded in-process collection, optionally mirrored to a JSON file
//! - **sqlite**: local SQLite database via libsql

pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports
pub use memory::MemoryUserStore;
pub use sqlite::SqliteUserStore;
pub use traits::{NewUser, User, UserPatch, UserStore, UserStoreProvider};
