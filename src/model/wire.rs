//! Wire shapes of the plex.tv API and of the servers it advertises.
//!
//! The two user-listing endpoints disagree on field names and casing
//! (`name` vs `username`, `userID` vs `id`, and so on). All of that
//! variance is absorbed here: `into_record` on each shape is the only
//! place it is visible, everything downstream sees `UserAccessRecord`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::logical::{Pin, Server, UserAccessRecord};

/// `GET /api/v2/user` — token validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// One advertised resource with its ordered connection candidates.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    pub product: Option<String>,
    pub product_version: Option<String>,
    pub platform: Option<String>,
    pub client_identifier: String,
    #[serde(default)]
    pub provides: String,
    #[serde(default)]
    pub owned: bool,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Resource {
    pub fn is_server(&self) -> bool {
        self.provides.split(',').any(|p| p == "server")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub protocol: String,
    pub address: String,
    pub port: u16,
    pub uri: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub relay: bool,
}

/// `GET {server}/identity` — the probe target.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEnvelope {
    #[serde(rename = "MediaContainer")]
    pub media_container: ServerIdentity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerIdentity {
    pub machine_identifier: String,
    pub version: Option<String>,
    pub friendly_name: Option<String>,
}

/// `GET {server}/accounts` — users local to one server.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsEnvelope {
    #[serde(rename = "MediaContainer")]
    pub media_container: AccountsContainer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsContainer {
    #[serde(rename = "Account", default)]
    pub accounts: Vec<LocalAccount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAccount {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub restricted: Option<bool>,
    pub home: Option<bool>,
    pub guest: Option<bool>,
}

impl LocalAccount {
    /// Normalize into the canonical record. The local listing has no email
    /// or uuid; `name` doubles as username and display title.
    pub fn into_record(self, server: &Server) -> UserAccessRecord {
        UserAccessRecord {
            id: self.id,
            uuid: None,
            username: self.name.clone(),
            title: self.name,
            email: None,
            restricted: self.restricted,
            home: self.home,
            guest: self.guest,
            can_invite: None,
            machine_identifier: server.machine_identifier.clone(),
            server_name: server.name.clone(),
            account_label: server.account_label.clone(),
        }
    }
}

/// `GET /api/servers/{machine}/shared_servers` — account-level shares.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedServersEnvelope {
    #[serde(rename = "MediaContainer")]
    pub media_container: SharedServersContainer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SharedServersContainer {
    #[serde(rename = "SharedServer", default)]
    pub shared_servers: Vec<SharedServerUser>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedServerUser {
    #[serde(rename = "userID")]
    pub user_id: Option<i64>,
    pub uuid: Option<String>,
    pub username: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub restricted: Option<bool>,
    pub home: Option<bool>,
    pub guest: Option<bool>,
    pub allow_sync: Option<bool>,
}

impl SharedServerUser {
    pub fn into_record(self, server: &Server) -> UserAccessRecord {
        UserAccessRecord {
            id: self.user_id,
            uuid: self.uuid,
            username: self.username.clone(),
            title: self.title.or(self.username),
            email: self.email,
            restricted: self.restricted,
            home: self.home,
            guest: self.guest,
            can_invite: self.allow_sync,
            machine_identifier: server.machine_identifier.clone(),
            server_name: server.name.clone(),
            account_label: server.account_label.clone(),
        }
    }
}

/// `POST /api/v2/pins` and `GET /api/v2/pins/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinPayload {
    pub id: i64,
    pub code: String,
    pub client_identifier: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auth_token: Option<String>,
}

impl PinPayload {
    /// The v2 pins endpoint echoes the client identifier inconsistently;
    /// fall back to the one we presented.
    pub fn into_pin(self, client_identifier: &str) -> Pin {
        Pin {
            id: self.id,
            code: self.code,
            client_identifier: self
                .client_identifier
                .unwrap_or_else(|| client_identifier.to_owned()),
            expires_at: self.expires_at,
            auth_token: self.auth_token.filter(|t| !t.is_empty()),
        }
    }
}
