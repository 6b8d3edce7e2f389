//! Admin account bootstrap.
//!
//! Runs at startup, before the listener binds, so the admin account exists
//! before any login can succeed.

use anyhow::Result;
use tracing::info;

use muster_auth::{hash_password, verify_password};
use muster_store::{Database, User};

/// Ensure the configured admin user exists with the configured password.
///
/// Idempotent by username. The stored hash is rewritten only when the
/// configured password no longer verifies against it, so restarting with an
/// unchanged config does not silently rotate the hash.
pub fn ensure_admin(db: &mut Database, username: &str, password: &str) -> Result<User> {
    match db.get_user_by_name(username)? {
        Some(user) => {
            if verify_password(password, &user.password_hash) {
                info!(username, "admin user present, password unchanged");
                Ok(user)
            } else {
                let password_hash = hash_password(password)?;
                db.update_user_password(user.user_id, &password_hash)?;
                info!(username, "configured admin password changed, hash rotated");
                Ok(User {
                    password_hash,
                    ..user
                })
            }
        }
        None => {
            let password_hash = hash_password(password)?;
            let user = db.add_user(username, &password_hash)?;
            info!(username, "admin user created");
            Ok(user)
        }
    }
}
