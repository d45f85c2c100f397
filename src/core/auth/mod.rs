use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Builder;

pub const OFFLINE_SESSION: &str = "OFFLINE";

/// Identity values substituted into the launch argument template.
///
/// Only offline identities are produced here; authenticated sessions are
/// built by the caller and passed in as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionIdentity {
    pub username: String,
    /// Undashed lowercase UUID.
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
    pub user_properties: String,
    pub session: String,
}

impl SessionIdentity {
    /// Offline identity with the conventional name-based UUID
    /// (MD5 of `OfflinePlayer:<name>`, version 3).
    pub fn offline(username: &str) -> Self {
        let username = match username.trim() {
            "" => "Player",
            trimmed => trimmed,
        };

        Self {
            username: username.to_string(),
            uuid: offline_uuid(username),
            access_token: "0".into(),
            user_type: "legacy".into(),
            user_properties: "{}".into(),
            session: OFFLINE_SESSION.into(),
        }
    }
}

fn offline_uuid(username: &str) -> String {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&Md5::digest(format!("OfflinePlayer:{}", username).as_bytes()));
    Builder::from_md5_bytes(digest)
        .into_uuid()
        .simple()
        .to_string()
}
