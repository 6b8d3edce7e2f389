//! Domain model structs persisted in the registry database.
//!
//! Every struct derives `Serialize`/`Deserialize` so the service layer can
//! hand records straight to the HTTP surface. The one exception is the user
//! password hash, which is never serialized into any response.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A fleet machine. The primary key is the hardware MAC address, which is
/// globally unique and immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    /// Hardware MAC address (primary key).
    pub mac_address: String,
    /// Last reported IP address.
    pub ip_address: String,
    /// Last reported hostname.
    pub hostname: String,
    /// Reported client-software version.
    pub client_version: String,
    /// Ids of the VM images installed on this machine.
    pub images: Vec<i64>,
}

/// Field updates for an existing client, addressed by MAC.
///
/// `ip_address`, `hostname` and `client_version` are always replaced; the
/// installed-image association is reset only when `images` is supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientUpdate {
    pub mac_address: String,
    pub ip_address: String,
    pub hostname: String,
    pub client_version: String,
    pub images: Option<Vec<i64>>,
}

// ---------------------------------------------------------------------------
// VM image
// ---------------------------------------------------------------------------

/// A registered VM image. The surrogate id is assigned by the store; the
/// natural key is the (name, version) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VmImage {
    /// Surrogate id, assigned on insert.
    pub image_id: i64,
    /// Image name; unique together with `image_version`.
    pub image_name: String,
    /// Image file reference.
    pub image_file: String,
    /// Image version string.
    pub image_version: String,
    /// Content hash. Not unique -- the same content may be re-tagged.
    pub image_hash: String,
}

/// A VM image about to be registered (no id yet).
#[derive(Debug, Clone, Deserialize)]
pub struct NewImage {
    pub image_name: String,
    pub image_file: String,
    pub image_version: String,
    pub image_hash: String,
}

impl VmImage {
    /// Derived `name@version` key.
    pub fn tag(&self) -> String {
        format!("{}@{}", self.image_name, self.image_version)
    }
}

impl NewImage {
    /// Derived `name@version` key.
    pub fn tag(&self) -> String {
        format!("{}@{}", self.image_name, self.image_version)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An API user able to authenticate against the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Surrogate id, assigned on insert.
    pub user_id: i64,
    /// Unique username.
    pub username: String,
    /// Salted one-way password hash. Never serialized into a response.
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_tag_combines_name_and_version() {
        let image = VmImage {
            image_id: 7,
            image_name: "debian-minimal".to_string(),
            image_file: "/images/debian-minimal.qcow2".to_string(),
            image_version: "12.4".to_string(),
            image_hash: "abc123".to_string(),
        };
        assert_eq!(image.tag(), "debian-minimal@12.4");
    }

    #[test]
    fn password_hash_never_serialized() {
        let user = User {
            user_id: 1,
            username: "admin".to_string(),
            password_hash: "$argon2id$secret".to_string(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
    }
}
