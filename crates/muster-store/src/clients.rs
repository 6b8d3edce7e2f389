//! Client CRUD helpers.
//!
//! All mutating helpers run in a single scoped transaction so the client row
//! and its association rows commit or roll back together.

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Client, ClientUpdate};

impl Database {
    /// Insert a new client together with its installed-image associations.
    ///
    /// Fails with [`StoreError::Duplicate`] if the MAC address is already
    /// registered, leaving the existing record unchanged.
    pub fn add_client(&mut self, client: &Client) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE mac_address = ?1)",
            params![client.mac_address],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::Duplicate(format!(
                "client {}",
                client.mac_address
            )));
        }

        tx.execute(
            "INSERT INTO clients (mac_address, ip_address, hostname, client_version)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                client.mac_address,
                client.ip_address,
                client.hostname,
                client.client_version,
            ],
        )?;

        // OR IGNORE dedupes repeated ids in the reported list; an unknown
        // image id still fails the foreign-key check and rolls everything
        // back.
        for image_id in &client.images {
            tx.execute(
                "INSERT OR IGNORE INTO client_images (client_mac, image_id) VALUES (?1, ?2)",
                params![client.mac_address, image_id],
            )?;
        }

        tx.commit()?;

        tracing::info!(mac = %client.mac_address, "registered client");
        Ok(())
    }

    /// Fetch a client by MAC address, including its installed image ids.
    pub fn get_client(&self, mac_address: &str) -> Result<Option<Client>> {
        let client = self
            .conn()
            .query_row(
                "SELECT mac_address, ip_address, hostname, client_version
                 FROM clients WHERE mac_address = ?1",
                params![mac_address],
                row_to_client,
            )
            .optional()?;

        match client {
            Some(mut client) => {
                client.images = self.client_image_ids(mac_address)?;
                Ok(Some(client))
            }
            None => Ok(None),
        }
    }

    /// Ids of the images installed on a client, in ascending order.
    pub fn client_image_ids(&self, mac_address: &str) -> Result<Vec<i64>> {
        let mut stmt = self.conn().prepare(
            "SELECT image_id FROM client_images WHERE client_mac = ?1 ORDER BY image_id ASC",
        )?;
        let rows = stmt.query_map(params![mac_address], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Replace the mutable fields of an existing client.
    ///
    /// The record is located by MAC; a missing MAC fails with
    /// [`StoreError::NotFound`] -- updates never mint a new identity. The
    /// association list is reset only when `update.images` is supplied.
    pub fn update_client(&mut self, update: &ClientUpdate) -> Result<Client> {
        let tx = self.conn_mut().transaction()?;

        let affected = tx.execute(
            "UPDATE clients SET ip_address = ?2, hostname = ?3, client_version = ?4
             WHERE mac_address = ?1",
            params![
                update.mac_address,
                update.ip_address,
                update.hostname,
                update.client_version,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!(
                "client {}",
                update.mac_address
            )));
        }

        if let Some(images) = &update.images {
            tx.execute(
                "DELETE FROM client_images WHERE client_mac = ?1",
                params![update.mac_address],
            )?;
            for image_id in images {
                tx.execute(
                    "INSERT OR IGNORE INTO client_images (client_mac, image_id) VALUES (?1, ?2)",
                    params![update.mac_address, image_id],
                )?;
            }
        }

        tx.commit()?;

        tracing::info!(mac = %update.mac_address, "updated client");

        self.get_client(&update.mac_address)?
            .ok_or_else(|| StoreError::NotFound(format!("client {}", update.mac_address)))
    }

    /// Remove a client. Association rows go with it (ON DELETE CASCADE).
    ///
    /// Store-layer capability only; not exposed over HTTP.
    pub fn delete_client(&mut self, mac_address: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM clients WHERE mac_address = ?1",
            params![mac_address],
        )?;
        Ok(affected > 0)
    }

    /// All registered clients.
    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let mut stmt = self.conn().prepare(
            "SELECT mac_address, ip_address, hostname, client_version
             FROM clients ORDER BY mac_address ASC",
        )?;
        let rows = stmt.query_map([], row_to_client)?;
        let clients = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;
        self.attach_images(clients)
    }

    /// Clients running the given client-software version.
    pub fn list_clients_by_version(&self, client_version: &str) -> Result<Vec<Client>> {
        let mut stmt = self.conn().prepare(
            "SELECT mac_address, ip_address, hostname, client_version
             FROM clients WHERE client_version = ?1 ORDER BY mac_address ASC",
        )?;
        let rows = stmt.query_map(params![client_version], row_to_client)?;
        let clients = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;
        self.attach_images(clients)
    }

    /// Clients whose installed-image set contains an image with the given
    /// content hash.
    pub fn list_clients_with_image(&self, image_hash: &str) -> Result<Vec<Client>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT c.mac_address, c.ip_address, c.hostname, c.client_version
             FROM clients c
             JOIN client_images ci ON ci.client_mac = c.mac_address
             JOIN vm_images v ON v.image_id = ci.image_id
             WHERE v.image_hash = ?1
             ORDER BY c.mac_address ASC",
        )?;
        let rows = stmt.query_map(params![image_hash], row_to_client)?;
        let clients = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)?;
        self.attach_images(clients)
    }

    fn attach_images(&self, mut clients: Vec<Client>) -> Result<Vec<Client>> {
        for client in &mut clients {
            client.images = self.client_image_ids(&client.mac_address)?;
        }
        Ok(clients)
    }
}

fn row_to_client(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        mac_address: row.get(0)?,
        ip_address: row.get(1)?,
        hostname: row.get(2)?,
        client_version: row.get(3)?,
        images: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewImage;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    fn sample_client(mac: &str) -> Client {
        Client {
            mac_address: mac.to_string(),
            ip_address: "10.0.0.12".to_string(),
            hostname: "node-12".to_string(),
            client_version: "1.4.0".to_string(),
            images: Vec::new(),
        }
    }

    #[test]
    fn add_and_get_round_trip() {
        let (mut db, _dir) = test_db();
        let client = sample_client("aa:bb:cc:dd:ee:01");

        db.add_client(&client).unwrap();

        let stored = db.get_client("aa:bb:cc:dd:ee:01").unwrap().unwrap();
        assert_eq!(stored, client);
    }

    #[test]
    fn get_missing_returns_none() {
        let (db, _dir) = test_db();
        assert!(db.get_client("ff:ff:ff:ff:ff:ff").unwrap().is_none());
    }

    #[test]
    fn duplicate_mac_rejected_and_first_record_kept() {
        let (mut db, _dir) = test_db();
        let first = sample_client("aa:bb:cc:dd:ee:02");
        db.add_client(&first).unwrap();

        let mut second = sample_client("aa:bb:cc:dd:ee:02");
        second.hostname = "imposter".to_string();

        let result = db.add_client(&second);
        assert!(matches!(result, Err(StoreError::Duplicate(_))));

        let stored = db.get_client("aa:bb:cc:dd:ee:02").unwrap().unwrap();
        assert_eq!(stored.hostname, "node-12");
    }

    #[test]
    fn update_missing_mac_fails() {
        let (mut db, _dir) = test_db();

        let update = ClientUpdate {
            mac_address: "aa:bb:cc:dd:ee:03".to_string(),
            ip_address: "10.0.0.3".to_string(),
            hostname: "ghost".to_string(),
            client_version: "2.0.0".to_string(),
            images: None,
        };

        let result = db.update_client(&update);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn update_replaces_fields_and_keeps_associations_unless_supplied() {
        let (mut db, _dir) = test_db();

        let image = db
            .add_image(&NewImage {
                image_name: "debian".to_string(),
                image_file: "/images/debian.qcow2".to_string(),
                image_version: "12".to_string(),
                image_hash: "hash-a".to_string(),
            })
            .unwrap();

        let mut client = sample_client("aa:bb:cc:dd:ee:04");
        client.images = vec![image.image_id];
        db.add_client(&client).unwrap();

        // No image list supplied: associations untouched.
        let update = ClientUpdate {
            mac_address: client.mac_address.clone(),
            ip_address: "10.0.0.99".to_string(),
            hostname: "renamed".to_string(),
            client_version: "1.5.0".to_string(),
            images: None,
        };
        let updated = db.update_client(&update).unwrap();
        assert_eq!(updated.ip_address, "10.0.0.99");
        assert_eq!(updated.hostname, "renamed");
        assert_eq!(updated.images, vec![image.image_id]);

        // Explicit empty list resets the associations.
        let update = ClientUpdate {
            images: Some(Vec::new()),
            ..update
        };
        let updated = db.update_client(&update).unwrap();
        assert!(updated.images.is_empty());
    }

    #[test]
    fn add_client_with_unknown_image_rolls_back() {
        let (mut db, _dir) = test_db();

        let mut client = sample_client("aa:bb:cc:dd:ee:05");
        client.images = vec![9999];

        assert!(db.add_client(&client).is_err());

        // The client row must not survive the failed association insert.
        assert!(db.get_client("aa:bb:cc:dd:ee:05").unwrap().is_none());
    }

    #[test]
    fn list_by_version_filters() {
        let (mut db, _dir) = test_db();

        let mut old = sample_client("aa:bb:cc:dd:ee:06");
        old.client_version = "0.9.0".to_string();
        db.add_client(&old).unwrap();
        db.add_client(&sample_client("aa:bb:cc:dd:ee:07")).unwrap();
        db.add_client(&sample_client("aa:bb:cc:dd:ee:08")).unwrap();

        let matching = db.list_clients_by_version("1.4.0").unwrap();
        assert_eq!(matching.len(), 2);
        assert!(matching.iter().all(|c| c.client_version == "1.4.0"));

        assert_eq!(db.list_clients().unwrap().len(), 3);
    }

    #[test]
    fn list_clients_with_image_matches_on_hash() {
        let (mut db, _dir) = test_db();

        let image = db
            .add_image(&NewImage {
                image_name: "ubuntu".to_string(),
                image_file: "/images/ubuntu.qcow2".to_string(),
                image_version: "24.04".to_string(),
                image_hash: "hash-b".to_string(),
            })
            .unwrap();

        let mut with_image = sample_client("aa:bb:cc:dd:ee:09");
        with_image.images = vec![image.image_id];
        db.add_client(&with_image).unwrap();
        db.add_client(&sample_client("aa:bb:cc:dd:ee:10")).unwrap();

        let holders = db.list_clients_with_image("hash-b").unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].mac_address, "aa:bb:cc:dd:ee:09");

        assert!(db.list_clients_with_image("no-such-hash").unwrap().is_empty());
    }

    #[test]
    fn delete_client_cascades_associations() {
        let (mut db, _dir) = test_db();

        let image = db
            .add_image(&NewImage {
                image_name: "alpine".to_string(),
                image_file: "/images/alpine.qcow2".to_string(),
                image_version: "3.19".to_string(),
                image_hash: "hash-c".to_string(),
            })
            .unwrap();

        let mut client = sample_client("aa:bb:cc:dd:ee:11");
        client.images = vec![image.image_id];
        db.add_client(&client).unwrap();

        assert!(db.delete_client("aa:bb:cc:dd:ee:11").unwrap());
        assert!(!db.delete_client("aa:bb:cc:dd:ee:11").unwrap());
        assert!(db.client_image_ids("aa:bb:cc:dd:ee:11").unwrap().is_empty());
    }
}
