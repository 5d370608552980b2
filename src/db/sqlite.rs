use crate::db::traits::{NewUser, User, UserPatch, UserStore};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Connection, Database, Row};
use tokio::sync::Mutex;

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

/// User store backed by a local SQLite database.
///
/// All statements run on one connection behind an async mutex, so each
/// check-then-write sequence executes without interleaving.
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
    _db: Database,
}

impl SqliteUserStore {
    /// Opens (or creates) the database at `path`. `":memory:"` gives an ephemeral store.
    pub async fn open(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database {}: {}", path, e)))?;

        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        initialize_schema(&conn).await?;

        Ok(Self {
            conn: Mutex::new(conn),
            _db: db,
        })
    }

    /// Opens an ephemeral in-memory database.
    pub async fn new_memory() -> Result<Self> {
        Self::open(":memory:").await
    }
}

async fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        (),
    )
    .await
    .map_err(|e| AppError::Database(format!("Failed to create users table: {}", e)))?;

    Ok(())
}

fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.get(0).map_err(|e| AppError::Database(e.to_string()))?,
        name: row.get(1).map_err(|e| AppError::Database(e.to_string()))?,
        email: row.get(2).map_err(|e| AppError::Database(e.to_string()))?,
        password_hash: row.get(3).map_err(|e| AppError::Database(e.to_string()))?,
        created_at: row.get(4).map_err(|e| AppError::Database(e.to_string()))?,
        updated_at: row.get(5).map_err(|e| AppError::Database(e.to_string()))?,
    })
}

async fn query_one(conn: &Connection, sql: &str, params: impl libsql::params::IntoParams) -> Result<Option<User>> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| AppError::Database(format!("Failed to query user: {}", e)))?;

    match rows
        .next()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
    {
        Some(row) => Ok(Some(row_to_user(&row)?)),
        None => Ok(None),
    }
}

async fn select_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE lower(email) = lower(?1)", USER_COLUMNS);
    query_one(conn, &sql, [email]).await
}

async fn select_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    query_one(conn, &sql, [id]).await
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let conn = self.conn.lock().await;

        if select_by_email(&conn, &user.email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered.".to_string()));
        }

        let now = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO users (name, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                user.name.as_str(),
                user.email.as_str(),
                user.password_hash.as_str(),
                now,
                now,
            ),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create user: {}", e)))?;

        let id = conn.last_insert_rowid();

        Ok(User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        select_by_email(&conn, email).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        select_by_id(&conn, id).await
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<User> {
        let conn = self.conn.lock().await;

        let mut target = select_by_id(&conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        if let Some(ref email) = patch.email {
            if let Some(owner) = select_by_email(&conn, email).await? {
                if owner.id != id {
                    return Err(AppError::Conflict("Email already registered.".to_string()));
                }
            }
        }

        if let Some(name) = patch.name {
            target.name = name;
        }
        if let Some(email) = patch.email {
            target.email = email;
        }
        target.updated_at = Utc::now().timestamp();

        conn.execute(
            "UPDATE users SET name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
            (
                target.name.as_str(),
                target.email.as_str(),
                target.updated_at,
                id,
            ),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to update user: {}", e)))?;

        Ok(target)
    }
}
