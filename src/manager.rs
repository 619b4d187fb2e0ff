use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Error, Result};
use log::{debug, warn};

use crate::cache::Cache;
use crate::config::{self, Account};
use crate::dedup;
use crate::fuzzy;
use crate::model::logical::{
    AccountValidation, IssuedPin, Pin, SearchOutcome, Server, UserAccessRecord,
};
use crate::model::wire::Resource;
use crate::plex::{auth_url, ApiError, DirectoryClient, PRODUCT};

pub const DEFAULT_MAX_RESULTS: usize = 25;

/// Fans requests out across every configured account, caching each tier of
/// results independently: server lists per account, user lists per
/// `(server, account)`. One account's or server's failure is logged and
/// skipped; partial results always beat total failure. Only the
/// credential-issuance calls propagate errors.
pub struct Manager<C> {
    client: C,
    accounts: Vec<Account>,
    server_cache: Cache<String, Vec<Server>>,
    user_cache: Cache<(String, String), Vec<UserAccessRecord>>,
}

impl<C: DirectoryClient> Manager<C> {
    pub fn new(client: C, accounts: Vec<Account>, cache_ttl: Duration) -> Self {
        Manager {
            client,
            accounts,
            server_cache: Cache::new(cache_ttl),
            user_cache: Cache::new(cache_ttl),
        }
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn clear_caches(&mut self) {
        self.server_cache.clear();
        self.user_cache.clear();
    }

    /// Check each account's token against the directory service. A failed
    /// check marks that account invalid; it never aborts the others.
    pub fn validate_accounts(&self) -> Vec<AccountValidation> {
        self.accounts
            .iter()
            .map(|account| {
                match self
                    .client
                    .validate_credential(&account.token, &account.client_identifier)
                {
                    Ok(Some(user)) => AccountValidation {
                        label: account.label.clone(),
                        valid: true,
                        username: user.username,
                        email: user.email,
                    },
                    Ok(None) => AccountValidation {
                        label: account.label.clone(),
                        valid: false,
                        username: None,
                        email: None,
                    },
                    Err(e) => {
                        warn!("Validation of account '{}' failed: {}", account.label, e);
                        AccountValidation {
                            label: account.label.clone(),
                            valid: false,
                            username: None,
                            email: None,
                        }
                    }
                }
            })
            .collect()
    }

    /// All reachable servers across all accounts, in account order, each
    /// `(machineIdentifier, account)` pair at most once. Per-account
    /// results come from cache within the TTL unless `refresh` is set.
    pub fn get_servers(&mut self, refresh: bool) -> Vec<Server> {
        let mut merged: Vec<Server> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for account in &self.accounts {
            let cached = if refresh {
                None
            } else {
                self.server_cache.get(&account.label)
            };
            let servers = match cached {
                Some(servers) => servers,
                None => match Self::discover_servers(&self.client, account) {
                    Ok(servers) => {
                        self.server_cache.set(account.label.clone(), servers.clone());
                        servers
                    }
                    Err(e) => {
                        warn!("Skipping account '{}': {}", account.label, e);
                        continue;
                    }
                },
            };
            for server in servers {
                let key = (
                    server.machine_identifier.clone(),
                    server.account_label.clone(),
                );
                if seen.insert(key) {
                    merged.push(server);
                }
            }
        }
        merged
    }

    /// User-access records concatenated across every reachable server.
    /// Records are deduplicated within a server, never across servers: the
    /// same person legitimately appears once per server they can reach.
    pub fn get_users_across_servers(&mut self, refresh: bool) -> Result<Vec<UserAccessRecord>> {
        let servers = self.get_servers(refresh);
        let mut all = Vec::new();
        for server in servers {
            let key = (
                server.machine_identifier.clone(),
                server.account_label.clone(),
            );
            if !refresh {
                if let Some(users) = self.user_cache.get(&key) {
                    all.extend(users);
                    continue;
                }
            }
            let account = self
                .accounts
                .iter()
                .find(|a| a.label == server.account_label)
                .ok_or_else(|| {
                    Error::msg(format!(
                        "No configured account with label '{}'",
                        server.account_label
                    ))
                })?;
            let users = match Self::fetch_users(&self.client, &server, account) {
                Ok(users) => users,
                Err(e) => {
                    warn!("Skipping users on server '{}': {}", server.name, e);
                    continue;
                }
            };
            self.user_cache.set(key, users.clone());
            all.extend(users);
        }
        Ok(all)
    }

    /// Fuzzy-search the aggregated records. A blank query short-circuits
    /// without touching upstream.
    pub fn search_users(
        &mut self,
        query: &str,
        max_results: usize,
        refresh: bool,
    ) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchOutcome::empty());
        }
        let users = self.get_users_across_servers(refresh)?;
        if users.is_empty() {
            return Ok(SearchOutcome::empty());
        }
        let matches = fuzzy::rank(query, &users, max_results);
        Ok(SearchOutcome {
            total_searched: users.len(),
            total_matched: matches.len(),
            matches,
        })
    }

    /// Request a device-link PIN and its authorization URL. Single remote
    /// call, no retry; PINs are short-lived so a failure surfaces as-is.
    pub fn generate_auth_pin(&self, client_identifier: Option<&str>) -> Result<IssuedPin, ApiError> {
        let client_identifier = client_identifier
            .map(str::to_owned)
            .unwrap_or_else(|| config::derive_client_identifier(PRODUCT));
        let pin = self.client.create_pin(&client_identifier)?;
        let auth_url = auth_url(&pin, PRODUCT);
        Ok(IssuedPin { pin, auth_url })
    }

    /// Relay the remote service's current snapshot of a PIN. The remote
    /// side is authoritative for expiry; no state is tracked here.
    pub fn check_auth_pin_status(
        &self,
        id: i64,
        client_identifier: &str,
    ) -> Result<Pin, ApiError> {
        self.client.poll_pin(id, client_identifier)
    }

    fn discover_servers(client: &C, account: &Account) -> Result<Vec<Server>, ApiError> {
        let resources = client.list_resources(&account.token, &account.client_identifier)?;
        let mut servers = Vec::new();
        for resource in resources.into_iter().filter(Resource::is_server) {
            match Self::probe_resource(client, &resource, account) {
                Some(server) => servers.push(server),
                None => warn!(
                    "No reachable connection for resource '{}' (account '{}')",
                    resource.name, account.label
                ),
            }
        }
        Ok(servers)
    }

    /// Try the resource's connections in advertised order; the first one
    /// that answers wins and the rest are abandoned. The probed identity
    /// is authoritative over what the directory advertised.
    fn probe_resource(client: &C, resource: &Resource, account: &Account) -> Option<Server> {
        for connection in &resource.connections {
            match client.probe_connection(
                &connection.uri,
                &account.token,
                &account.client_identifier,
            ) {
                Ok(identity) => {
                    return Some(Server {
                        name: resource.name.clone(),
                        friendly_name: identity
                            .friendly_name
                            .unwrap_or_else(|| resource.name.clone()),
                        machine_identifier: identity.machine_identifier,
                        host: connection.address.clone(),
                        port: connection.port,
                        scheme: connection.protocol.clone(),
                        uri: connection.uri.clone(),
                        product: resource.product.clone(),
                        version: identity.version.or_else(|| resource.product_version.clone()),
                        platform: resource.platform.clone(),
                        owned: resource.owned,
                        account_label: account.label.clone(),
                    });
                }
                Err(e) => debug!("Connection {} failed: {}", connection.uri, e),
            }
        }
        None
    }

    fn fetch_users(
        client: &C,
        server: &Server,
        account: &Account,
    ) -> Result<Vec<UserAccessRecord>, ApiError> {
        let local: Vec<UserAccessRecord> = client
            .list_local_users(&server.uri, &account.token, &account.client_identifier)?
            .into_iter()
            .map(|user| user.into_record(server))
            .collect();
        let shared: Vec<UserAccessRecord> = client
            .list_shared_users(
                &server.machine_identifier,
                &account.token,
                &account.client_identifier,
            )?
            .into_iter()
            .map(|user| user.into_record(server))
            .collect();
        Ok(dedup::merge(local, shared))
    }
}
