use chrono::{DateTime, Utc};
use serde::Serialize;

/// A successfully probed server, bound to the connection that answered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub name: String,
    pub friendly_name: String,
    pub machine_identifier: String,
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub uri: String,
    pub product: Option<String>,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub owned: bool,
    /// Label of the configured account this server was discovered under.
    pub account_label: String,
}

/// One person's access grant to one server, as seen by one account's token.
///
/// Identity fields are all optional because the upstream omits them
/// inconsistently between the local and shared listing endpoints; only the
/// server/account linkage is guaranteed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccessRecord {
    pub id: Option<i64>,
    pub uuid: Option<String>,
    pub username: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub restricted: Option<bool>,
    pub home: Option<bool>,
    pub guest: Option<bool>,
    pub can_invite: Option<bool>,
    pub machine_identifier: String,
    pub server_name: String,
    pub account_label: String,
}

/// A device-link PIN as last reported by the directory service. The remote
/// side is authoritative for its lifecycle; `auth_token` stays `None` until
/// the user approves the code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub id: i64,
    pub code: String,
    pub client_identifier: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedPin {
    #[serde(flatten)]
    pub pin: Pin,
    pub auth_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountValidation {
    pub label: String,
    pub valid: bool,
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMatch {
    pub key: String,
    pub matched_value: String,
    pub matched_character_indices: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMatch {
    /// 0.0 is a perfect match, 1.0 the worst admissible one.
    pub score: f64,
    pub record: UserAccessRecord,
    pub match_details: Vec<FieldMatch>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub matches: Vec<UserMatch>,
    pub total_matched: usize,
    pub total_searched: usize,
}

impl SearchOutcome {
    pub fn empty() -> Self {
        SearchOutcome {
            matches: vec![],
            total_matched: 0,
            total_searched: 0,
        }
    }
}
