//! VM image CRUD helpers.

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewImage, VmImage};

impl Database {
    /// Register a new VM image and return it with its assigned id.
    ///
    /// Fails with [`StoreError::Duplicate`] if the (name, version) pair is
    /// already taken. The content hash is deliberately not checked -- the
    /// same content may be re-tagged under another name or version.
    pub fn add_image(&mut self, image: &NewImage) -> Result<VmImage> {
        let tx = self.conn_mut().transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM vm_images WHERE image_name = ?1 AND image_version = ?2)",
            params![image.image_name, image.image_version],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::Duplicate(format!("image {}", image.tag())));
        }

        tx.execute(
            "INSERT INTO vm_images (image_name, image_file, image_version, image_hash)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                image.image_name,
                image.image_file,
                image.image_version,
                image.image_hash,
            ],
        )?;
        let image_id = tx.last_insert_rowid();

        tx.commit()?;

        tracing::info!(image = %image.tag(), image_id, "registered image");

        Ok(VmImage {
            image_id,
            image_name: image.image_name.clone(),
            image_file: image.image_file.clone(),
            image_version: image.image_version.clone(),
            image_hash: image.image_hash.clone(),
        })
    }

    /// Replace the fields of an existing image, keyed on id.
    ///
    /// Fails with [`StoreError::NotFound`] if the id is unknown and with
    /// [`StoreError::Duplicate`] if the new (name, version) pair collides
    /// with a different image.
    pub fn update_image(&mut self, image: &VmImage) -> Result<VmImage> {
        let tx = self.conn_mut().transaction()?;

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM vm_images
             WHERE image_name = ?1 AND image_version = ?2 AND image_id != ?3)",
            params![image.image_name, image.image_version, image.image_id],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StoreError::Duplicate(format!("image {}", image.tag())));
        }

        let affected = tx.execute(
            "UPDATE vm_images SET image_name = ?2, image_file = ?3,
             image_version = ?4, image_hash = ?5
             WHERE image_id = ?1",
            params![
                image.image_id,
                image.image_name,
                image.image_file,
                image.image_version,
                image.image_hash,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("image {}", image.image_id)));
        }

        tx.commit()?;

        tracing::info!(image = %image.tag(), image_id = image.image_id, "updated image");
        Ok(image.clone())
    }

    /// Fetch an image by its surrogate id.
    pub fn get_image(&self, image_id: i64) -> Result<Option<VmImage>> {
        self.conn()
            .query_row(
                "SELECT image_id, image_name, image_file, image_version, image_hash
                 FROM vm_images WHERE image_id = ?1",
                params![image_id],
                row_to_image,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// All registered images.
    pub fn list_images(&self) -> Result<Vec<VmImage>> {
        let mut stmt = self.conn().prepare(
            "SELECT image_id, image_name, image_file, image_version, image_hash
             FROM vm_images ORDER BY image_name ASC, image_version ASC",
        )?;
        let rows = stmt.query_map([], row_to_image)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// All versions of an image name.
    pub fn find_images_by_name(&self, image_name: &str) -> Result<Vec<VmImage>> {
        let mut stmt = self.conn().prepare(
            "SELECT image_id, image_name, image_file, image_version, image_hash
             FROM vm_images WHERE image_name = ?1 ORDER BY image_version ASC",
        )?;
        let rows = stmt.query_map(params![image_name], row_to_image)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// All images sharing a content hash.
    pub fn find_images_by_hash(&self, image_hash: &str) -> Result<Vec<VmImage>> {
        let mut stmt = self.conn().prepare(
            "SELECT image_id, image_name, image_file, image_version, image_hash
             FROM vm_images WHERE image_hash = ?1 ORDER BY image_name ASC",
        )?;
        let rows = stmt.query_map(params![image_hash], row_to_image)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<VmImage> {
    Ok(VmImage {
        image_id: row.get(0)?,
        image_name: row.get(1)?,
        image_file: row.get(2)?,
        image_version: row.get(3)?,
        image_hash: row.get(4)?,
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

    fn sample_image(name: &str, version: &str, hash: &str) -> NewImage {
        NewImage {
            image_name: name.to_string(),
            image_file: format!("/images/{}-{}.qcow2", name, version),
            image_version: version.to_string(),
            image_hash: hash.to_string(),
        }
    }

    #[test]
    fn add_assigns_ids_and_round_trips() {
        let (mut db, _dir) = test_db();

        let first = db.add_image(&sample_image("debian", "12", "h1")).unwrap();
        let second = db.add_image(&sample_image("debian", "13", "h2")).unwrap();
        assert_ne!(first.image_id, second.image_id);

        let stored = db.get_image(first.image_id).unwrap().unwrap();
        assert_eq!(stored, first);
        assert_eq!(stored.tag(), "debian@12");
    }

    #[test]
    fn duplicate_name_version_rejected() {
        let (mut db, _dir) = test_db();

        db.add_image(&sample_image("debian", "12", "h1")).unwrap();

        let result = db.add_image(&sample_image("debian", "12", "different-hash"));
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn same_hash_different_tag_allowed() {
        let (mut db, _dir) = test_db();

        db.add_image(&sample_image("debian", "12", "shared")).unwrap();
        db.add_image(&sample_image("debian-retag", "12", "shared"))
            .unwrap();

        let by_hash = db.find_images_by_hash("shared").unwrap();
        assert_eq!(by_hash.len(), 2);
    }

    #[test]
    fn find_by_name_returns_all_versions() {
        let (mut db, _dir) = test_db();

        db.add_image(&sample_image("alpine", "3.18", "h1")).unwrap();
        db.add_image(&sample_image("alpine", "3.19", "h2")).unwrap();
        db.add_image(&sample_image("debian", "12", "h3")).unwrap();

        let alpines = db.find_images_by_name("alpine").unwrap();
        assert_eq!(alpines.len(), 2);
        assert!(alpines.iter().all(|i| i.image_name == "alpine"));

        assert_eq!(db.list_images().unwrap().len(), 3);
    }

    #[test]
    fn update_is_keyed_on_id() {
        let (mut db, _dir) = test_db();

        let mut image = db.add_image(&sample_image("debian", "12", "h1")).unwrap();
        image.image_hash = "h1-rebuilt".to_string();

        let updated = db.update_image(&image).unwrap();
        assert_eq!(updated.image_hash, "h1-rebuilt");

        let stored = db.get_image(image.image_id).unwrap().unwrap();
        assert_eq!(stored.image_hash, "h1-rebuilt");
    }

    #[test]
    fn update_unknown_id_fails() {
        let (mut db, _dir) = test_db();

        let ghost = VmImage {
            image_id: 42,
            image_name: "ghost".to_string(),
            image_file: "/images/ghost.qcow2".to_string(),
            image_version: "1".to_string(),
            image_hash: "h".to_string(),
        };

        let result = db.update_image(&ghost);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn update_cannot_steal_existing_tag() {
        let (mut db, _dir) = test_db();

        db.add_image(&sample_image("debian", "12", "h1")).unwrap();
        let mut other = db.add_image(&sample_image("debian", "13", "h2")).unwrap();

        other.image_version = "12".to_string();
        let result = db.update_image(&other);
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }
}
