//! User CRUD helpers.
//!
//! The store only ever sees password hashes; hashing and verification live
//! in the credential crate. The admin upsert is composed at the service
//! layer from [`Database::add_user`] and
//! [`Database::update_user_password`].

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert a new user and return it with its assigned id.
    ///
    /// Fails with [`StoreError::Duplicate`] if the username is taken.
    pub fn add_user(&mut self, username: &str, password_hash: &str) -> Result<User> {
        let tx = self.conn_mut().transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::Duplicate(format!("user {}", username)));
        }

        tx.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )?;
        let user_id = tx.last_insert_rowid();

        tx.commit()?;

        tracing::info!(username, user_id, "created user");

        Ok(User {
            user_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    /// Replace a user's password hash.
    pub fn update_user_password(&mut self, user_id: i64, password_hash: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET password_hash = ?2 WHERE user_id = ?1",
            params![user_id, password_hash],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }

        tracing::info!(user_id, "rotated user password hash");
        Ok(())
    }

    /// Fetch a user by username.
    pub fn get_user_by_name(&self, username: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT user_id, username, password_hash FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// Fetch a user by surrogate id.
    pub fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT user_id, username, password_hash FROM users WHERE user_id = ?1",
                params![user_id],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    #[test]
    fn add_and_lookup_user() {
        let (mut db, _dir) = test_db();

        let user = db.add_user("admin", "$argon2id$hash").unwrap();

        let by_name = db.get_user_by_name("admin").unwrap().unwrap();
        assert_eq!(by_name, user);

        let by_id = db.get_user_by_id(user.user_id).unwrap().unwrap();
        assert_eq!(by_id, user);

        assert!(db.get_user_by_name("nobody").unwrap().is_none());
        assert!(db.get_user_by_id(9999).unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let (mut db, _dir) = test_db();

        db.add_user("admin", "hash-1").unwrap();

        let result = db.add_user("admin", "hash-2");
        assert!(matches!(result, Err(StoreError::Duplicate(_))));

        // First hash still in place.
        let stored = db.get_user_by_name("admin").unwrap().unwrap();
        assert_eq!(stored.password_hash, "hash-1");
    }

    #[test]
    fn password_update_replaces_hash() {
        let (mut db, _dir) = test_db();

        let user = db.add_user("operator", "old-hash").unwrap();
        db.update_user_password(user.user_id, "new-hash").unwrap();

        let stored = db.get_user_by_id(user.user_id).unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");

        let result = db.update_user_password(9999, "whatever");
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
