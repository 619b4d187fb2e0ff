use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Error, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

const CONFIG_PATH: &str = "~/.config/plexfind/config.json";
const TOKEN_ENV: &str = "PLEX_TOKEN";

pub const DEFAULT_TTL_SECS: u64 = 300;
const MIN_TTL_SECS: u64 = 30;
const MAX_TTL_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    accounts: Vec<AccountEntry>,
    cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AccountEntry {
    label: String,
    token: String,
    client_identifier: Option<String>,
}

/// One configured upstream session. Immutable after load.
#[derive(Debug, Clone)]
pub struct Account {
    pub label: String,
    pub token: String,
    pub client_identifier: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub accounts: Vec<Account>,
    pub cache_ttl: Duration,
}

/// Read `~/.config/plexfind/config.json`; fall back to a single account
/// from `$PLEX_TOKEN` when no file exists. At least one account is required.
pub fn load() -> Result<Config> {
    let path = shellexpand::full(CONFIG_PATH).with_context(|| "Bad config path")?;
    let path = Path::new(path.as_ref());

    let file = match read_if_found(path)? {
        Some(raw) => serde_json::from_str::<ConfigFile>(&raw)
            .with_context(|| format!("Error parsing config file {:?}", path))?,
        None => ConfigFile {
            accounts: std::env::var(TOKEN_ENV)
                .ok()
                .filter(|t| !t.trim().is_empty())
                .map(|token| AccountEntry {
                    label: "default".to_owned(),
                    token,
                    client_identifier: None,
                })
                .into_iter()
                .collect(),
            cache_ttl_secs: None,
        },
    };
    assemble(file)
}

fn assemble(file: ConfigFile) -> Result<Config> {
    if file.accounts.is_empty() {
        return Err(Error::msg(format!(
            "No accounts configured, add at least one to {} or set {}",
            CONFIG_PATH, TOKEN_ENV
        )));
    }
    let accounts: Vec<Account> = file
        .accounts
        .into_iter()
        .map(|entry| {
            let AccountEntry {
                label,
                token,
                client_identifier,
            } = entry;
            Account {
                client_identifier: client_identifier
                    .unwrap_or_else(|| derive_client_identifier(&label)),
                label,
                token,
            }
        })
        .collect();
    for (i, account) in accounts.iter().enumerate() {
        if accounts[..i].iter().any(|a| a.label == account.label) {
            return Err(Error::msg(format!(
                "Duplicate account label '{}'",
                account.label
            )));
        }
    }
    let ttl_secs = file
        .cache_ttl_secs
        .unwrap_or(DEFAULT_TTL_SECS)
        .clamp(MIN_TTL_SECS, MAX_TTL_SECS);
    Ok(Config {
        accounts,
        cache_ttl: Duration::from_secs(ttl_secs),
    })
}

/// Stable per-label device identity: the same label presents the same
/// client identifier on every run, with nothing persisted.
pub fn derive_client_identifier(label: &str) -> String {
    let digest = Sha256::digest(label.as_bytes());
    hex::encode(&digest[..16])
}

fn read_if_found(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str) -> AccountEntry {
        AccountEntry {
            label: label.to_owned(),
            token: "tok".to_owned(),
            client_identifier: None,
        }
    }

    #[test]
    fn client_identifier_is_deterministic_hex() {
        let a = derive_client_identifier("main");
        let b = derive_client_identifier("main");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, derive_client_identifier("other"));
    }

    #[test]
    fn ttl_is_clamped_into_range() {
        let config = assemble(ConfigFile {
            accounts: vec![entry("a")],
            cache_ttl_secs: Some(5),
        })
        .unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(30));

        let config = assemble(ConfigFile {
            accounts: vec![entry("a")],
            cache_ttl_secs: Some(999_999),
        })
        .unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));

        let config = assemble(ConfigFile {
            accounts: vec![entry("a")],
            cache_ttl_secs: None,
        })
        .unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(DEFAULT_TTL_SECS));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let result = assemble(ConfigFile {
            accounts: vec![entry("a"), entry("a")],
            cache_ttl_secs: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn no_accounts_is_an_error() {
        assert!(assemble(ConfigFile {
            accounts: vec![],
            cache_ttl_secs: None,
        })
        .is_err());
    }

    #[test]
    fn explicit_client_identifier_is_kept() {
        let config = assemble(ConfigFile {
            accounts: vec![AccountEntry {
                label: "a".to_owned(),
                token: "tok".to_owned(),
                client_identifier: Some("my-device".to_owned()),
            }],
            cache_ttl_secs: None,
        })
        .unwrap();
        assert_eq!(config.accounts[0].client_identifier, "my-device");
    }
}
