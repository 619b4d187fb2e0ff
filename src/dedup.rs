use itertools::Itertools;

use crate::model::logical::UserAccessRecord;

/// Canonical identity of a record for dedup purposes, compared
/// case-insensitively. Fallback chain: email, uuid, server+username,
/// server+numeric id. Records carrying none of those collapse into a
/// single per-server `unknown` bucket — the upstream data gives us
/// nothing better to tell them apart with.
pub fn identity_key(record: &UserAccessRecord) -> String {
    if let Some(email) = non_blank(&record.email) {
        return email.to_lowercase();
    }
    if let Some(uuid) = non_blank(&record.uuid) {
        return uuid.to_lowercase();
    }
    if let Some(username) = non_blank(&record.username) {
        return format!("{}:{}", record.machine_identifier, username).to_lowercase();
    }
    if let Some(id) = record.id {
        return format!("{}:{}", record.machine_identifier, id).to_lowercase();
    }
    format!("{}:unknown", record.machine_identifier).to_lowercase()
}

/// Merge the two listings observed for one server. First occurrence under
/// a key wins; later duplicates are dropped whole, fields are never merged.
pub fn merge(
    local: Vec<UserAccessRecord>,
    shared: Vec<UserAccessRecord>,
) -> Vec<UserAccessRecord> {
    local
        .into_iter()
        .chain(shared)
        .unique_by(identity_key)
        .collect()
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        id: Option<i64>,
        uuid: Option<&str>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> UserAccessRecord {
        UserAccessRecord {
            id,
            uuid: uuid.map(str::to_owned),
            username: username.map(str::to_owned),
            title: None,
            email: email.map(str::to_owned),
            restricted: None,
            home: None,
            guest: None,
            can_invite: None,
            machine_identifier: "m1".to_owned(),
            server_name: "den".to_owned(),
            account_label: "main".to_owned(),
        }
    }

    #[test]
    fn key_prefers_email_then_uuid_then_username_then_id() {
        assert_eq!(
            identity_key(&record(Some(1), Some("u"), Some("n"), Some("E@X.com"))),
            "e@x.com"
        );
        assert_eq!(
            identity_key(&record(Some(1), Some("UU-1"), Some("n"), None)),
            "uu-1"
        );
        assert_eq!(
            identity_key(&record(Some(1), None, Some("Ann"), None)),
            "m1:ann"
        );
        assert_eq!(identity_key(&record(Some(9), None, None, None)), "m1:9");
    }

    #[test]
    fn anonymous_records_share_one_bucket_per_server() {
        // Unresolved upstream ambiguity: nothing distinguishes these.
        let merged = merge(
            vec![record(None, None, None, None)],
            vec![record(None, None, None, None)],
        );
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn first_seen_wins_case_insensitively() {
        let merged = merge(
            vec![record(None, None, Some("u1"), Some("a@x.com"))],
            vec![record(None, None, Some("u2"), Some("A@X.COM"))],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].username.as_deref(), Some("u1"));
    }

    #[test]
    fn blank_email_falls_through_to_uuid() {
        let r = record(None, Some("uu"), None, Some("  "));
        assert_eq!(identity_key(&r), "uu");
    }

    #[test]
    fn distinct_identities_all_survive() {
        let merged = merge(
            vec![
                record(Some(1), None, Some("ann"), Some("ann@x.com")),
                record(Some(2), None, Some("bob"), None),
            ],
            vec![record(Some(3), Some("uu-3"), None, None)],
        );
        assert_eq!(merged.len(), 3);
    }
}
