//! Weighted fuzzy ranking of a free-text query against user-access records.
//!
//! Matching is token-based and location-independent: each query token is
//! aligned against the best-fitting window of the field (edit distance with
//! free prefix/suffix skip in the field text), so prefix, suffix and
//! interior matches all score the same. A field whose best alignment needs
//! more than ~40% edits relative to the token length does not match.

use std::cmp::Ordering;

use crate::model::logical::{FieldMatch, UserAccessRecord, UserMatch};

const MAX_FIELD_SCORE: f64 = 0.4;
// Floor keeps perfect matches from flattening the weighted combination to 0.
const MIN_FIELD_SCORE: f64 = 1e-3;

const EMAIL_WEIGHT: f64 = 0.5;
const USERNAME_WEIGHT: f64 = 0.3;
const TITLE_WEIGHT: f64 = 0.2;

/// Rank `records` against `query`, best first (lower score is better),
/// truncated to `limit`. Ties keep input order.
pub fn rank(query: &str, records: &[UserAccessRecord], limit: usize) -> Vec<UserMatch> {
    let tokens: Vec<Vec<char>> = query
        .to_lowercase()
        .split_whitespace()
        .map(|t| t.chars().collect())
        .collect();
    if tokens.is_empty() {
        return vec![];
    }
    let mut matches: Vec<UserMatch> = records
        .iter()
        .filter_map(|record| score_record(&tokens, record))
        .collect();
    matches.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
    matches.truncate(limit);
    matches
}

fn score_record(tokens: &[Vec<char>], record: &UserAccessRecord) -> Option<UserMatch> {
    let fields = [
        ("email", EMAIL_WEIGHT, record.email.as_deref()),
        ("username", USERNAME_WEIGHT, record.username.as_deref()),
        ("title", TITLE_WEIGHT, record.title.as_deref()),
    ];
    // Weighted geometric combination: a field that does not match
    // contributes its worst score (1.0), i.e. nothing.
    let mut combined = 1.0;
    let mut match_details = Vec::new();
    for &(key, weight, value) in fields.iter() {
        let value = match value {
            Some(v) => v,
            None => continue,
        };
        if let Some((score, indices)) = score_field(tokens, value) {
            combined *= score.max(MIN_FIELD_SCORE).powf(weight);
            match_details.push(FieldMatch {
                key: key.to_owned(),
                matched_value: value.to_owned(),
                matched_character_indices: indices,
            });
        }
    }
    if match_details.is_empty() {
        return None;
    }
    Some(UserMatch {
        score: combined,
        record: record.clone(),
        match_details,
    })
}

/// Average best-alignment score of all query tokens against `text`, plus
/// the character indices of the matched windows. `None` when the field
/// misses the admission threshold.
fn score_field(tokens: &[Vec<char>], text: &str) -> Option<(f64, Vec<usize>)> {
    let hay: Vec<char> = text.to_lowercase().chars().collect();
    let mut total = 0.0;
    let mut indices = Vec::new();
    for token in tokens {
        let (distance, end) = substring_distance(token, &hay);
        total += distance as f64 / token.len() as f64;
        let start = end.saturating_sub(token.len());
        indices.extend(start..end);
    }
    let score = total / tokens.len() as f64;
    if score > MAX_FIELD_SCORE {
        return None;
    }
    indices.sort_unstable();
    indices.dedup();
    Some((score, indices))
}

/// Edit distance of `needle` against the best-matching window of `hay`
/// (deletions before and after the window are free), with the window's end
/// index. Ties resolve to the leftmost window.
fn substring_distance(needle: &[char], hay: &[char]) -> (usize, usize) {
    let n = needle.len();
    let m = hay.len();
    let mut prev: Vec<usize> = vec![0; m + 1];
    let mut curr: Vec<usize> = vec![0; m + 1];
    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if needle[i - 1] == hay[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j - 1] + cost).min(prev[j] + 1).min(curr[j - 1] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev.into_iter()
        .enumerate()
        .map(|(j, d)| (d, j))
        .min()
        .unwrap_or((n, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(username: Option<&str>, title: Option<&str>, email: Option<&str>) -> UserAccessRecord {
        UserAccessRecord {
            id: None,
            uuid: None,
            username: username.map(str::to_owned),
            title: title.map(str::to_owned),
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
    fn exact_email_outranks_similar_username() {
        let records = vec![
            record(Some("alice@example.org"), None, None),
            record(None, None, Some("alice@example.com")),
        ];
        let ranked = rank("alice@example.com", &records, 25);
        assert_eq!(ranked.len(), 2);
        assert_eq!(
            ranked[0].record.email.as_deref(),
            Some("alice@example.com")
        );
        assert!(ranked[0].score < ranked[1].score);
    }

    #[test]
    fn interior_match_scores_like_a_prefix_match() {
        let records = vec![
            record(None, None, Some("alice@example.com")),
            record(None, None, Some("example@alice.com")),
        ];
        let ranked = rank("example", &records, 25);
        assert_eq!(ranked.len(), 2);
        assert!((ranked[0].score - ranked[1].score).abs() < 1e-9);
    }

    #[test]
    fn dissimilar_records_are_excluded() {
        let records = vec![record(Some("bob"), Some("Bob"), Some("bob@example.com"))];
        assert!(rank("zzzzqqqq", &records, 25).is_empty());
    }

    #[test]
    fn multi_token_query_matches_display_title() {
        let records = vec![record(None, Some("Alice Smith"), None)];
        let ranked = rank("alice smith", &records, 25);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].match_details[0].key, "title");
    }

    #[test]
    fn limit_truncates_and_ties_keep_input_order() {
        let records: Vec<_> = (0..10)
            .map(|i| {
                let mut r = record(Some("ann"), None, None);
                r.id = Some(i);
                r
            })
            .collect();
        let ranked = rank("ann", &records, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].record.id, Some(0));
    }

    #[test]
    fn match_details_carry_the_matched_window() {
        let records = vec![record(None, None, Some("alice@example.com"))];
        let ranked = rank("example", &records, 25);
        // "example" sits at indices 6..13 of the email
        assert_eq!(
            ranked[0].match_details[0].matched_character_indices,
            (6..13).collect::<Vec<_>>()
        );
    }

    #[test]
    fn blank_query_matches_nothing() {
        let records = vec![record(Some("ann"), None, None)];
        assert!(rank("   ", &records, 25).is_empty());
    }

    #[test]
    fn substring_distance_basics() {
        let needle: Vec<char> = "abc".chars().collect();
        let hay: Vec<char> = "xxabcxx".chars().collect();
        assert_eq!(substring_distance(&needle, &hay), (0, 5));
        let hay: Vec<char> = "xxaXcxx".chars().collect();
        assert_eq!(substring_distance(&needle, &hay).0, 1);
    }
}
