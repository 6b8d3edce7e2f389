//! v001 -- Initial schema creation.
//!
//! Creates the three entity tables (`clients`, `vm_images`, `users`) and the
//! `client_images` association table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Clients (fleet machines, keyed by hardware MAC address)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS clients (
    mac_address    TEXT PRIMARY KEY NOT NULL,
    ip_address     TEXT NOT NULL,
    hostname       TEXT NOT NULL,
    client_version TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_clients_version ON clients(client_version);

-- ----------------------------------------------------------------
-- VM images
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS vm_images (
    image_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    image_name    TEXT NOT NULL,
    image_file    TEXT NOT NULL,
    image_version TEXT NOT NULL,
    image_hash    TEXT NOT NULL,                -- content hash, not unique

    UNIQUE (image_name, image_version)
);

CREATE INDEX IF NOT EXISTS idx_vm_images_hash ON vm_images(image_hash);

-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    user_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL                 -- argon2id PHC string
);

-- ----------------------------------------------------------------
-- Client <-> image association (which images a client has installed)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS client_images (
    client_mac TEXT NOT NULL,
    image_id   INTEGER NOT NULL,

    PRIMARY KEY (client_mac, image_id),
    FOREIGN KEY (client_mac) REFERENCES clients(mac_address) ON DELETE CASCADE,
    FOREIGN KEY (image_id) REFERENCES vm_images(image_id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
