use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::model::logical::Pin;
use crate::model::wire::{
    AccountsEnvelope, IdentityEnvelope, LocalAccount, PinPayload, Resource, ServerIdentity,
    SharedServerUser, SharedServersEnvelope, UserInfo,
};

pub const PRODUCT: &str = "plexfind";
const VERSION: &str = env!("CARGO_PKG_VERSION");

const PLEX_TV: &str = "https://plex.tv";
const AUTH_BASE: &str = "https://app.plex.tv/auth#?";

const CALL_TIMEOUT: Duration = Duration::from_secs(15);
// Probes race dead LAN addresses; keep them short.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("unexpected response shape from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// The directory service, reduced to the calls the manager needs. Every
/// operation fails independently; nothing here retries.
pub trait DirectoryClient {
    fn validate_credential(
        &self,
        token: &str,
        client_identifier: &str,
    ) -> Result<Option<UserInfo>, ApiError>;

    fn list_resources(
        &self,
        token: &str,
        client_identifier: &str,
    ) -> Result<Vec<Resource>, ApiError>;

    fn probe_connection(
        &self,
        uri: &str,
        token: &str,
        client_identifier: &str,
    ) -> Result<ServerIdentity, ApiError>;

    fn list_local_users(
        &self,
        server_uri: &str,
        token: &str,
        client_identifier: &str,
    ) -> Result<Vec<LocalAccount>, ApiError>;

    fn list_shared_users(
        &self,
        machine_identifier: &str,
        token: &str,
        client_identifier: &str,
    ) -> Result<Vec<SharedServerUser>, ApiError>;

    fn create_pin(&self, client_identifier: &str) -> Result<Pin, ApiError>;

    fn poll_pin(&self, id: i64, client_identifier: &str) -> Result<Pin, ApiError>;
}

/// plex.tv over blocking HTTP.
pub struct PlexTv {
    http: Client,
    base: String,
}

impl PlexTv {
    pub fn new() -> Result<Self> {
        Self::with_base(PLEX_TV)
    }

    pub fn with_base(base: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .context("Failed to construct HTTP client")?;
        Ok(PlexTv {
            http,
            base: base.trim_end_matches('/').to_owned(),
        })
    }

    fn get(&self, url: &str, token: Option<&str>, client_identifier: &str) -> Result<Response, ApiError> {
        // Tokens travel in headers, never in the URL, so this is safe to log.
        debug!("GET {}", url);
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .header("X-Plex-Client-Identifier", client_identifier)
            .header("X-Plex-Product", PRODUCT)
            .header("X-Plex-Version", VERSION);
        if let Some(token) = token {
            request = request.header("X-Plex-Token", token);
        }
        request.send().map_err(|source| ApiError::Http {
            url: url.to_owned(),
            source,
        })
    }

    fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_owned(),
                status,
            });
        }
        response.json().map_err(|source| ApiError::Decode {
            url: url.to_owned(),
            source,
        })
    }
}

impl DirectoryClient for PlexTv {
    fn validate_credential(
        &self,
        token: &str,
        client_identifier: &str,
    ) -> Result<Option<UserInfo>, ApiError> {
        let url = format!("{}/api/v2/user", self.base);
        let response = self.get(&url, Some(token), client_identifier)?;
        // An invalid or expired token is an answer, not a failure.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        Self::decode(&url, response).map(Some)
    }

    fn list_resources(
        &self,
        token: &str,
        client_identifier: &str,
    ) -> Result<Vec<Resource>, ApiError> {
        let url = format!(
            "{}/api/v2/resources?includeHttps=1&includeRelay=1",
            self.base
        );
        let response = self.get(&url, Some(token), client_identifier)?;
        Self::decode(&url, response)
    }

    fn probe_connection(
        &self,
        uri: &str,
        token: &str,
        client_identifier: &str,
    ) -> Result<ServerIdentity, ApiError> {
        let url = format!("{}/identity", uri.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .header("Accept", "application/json")
            .header("X-Plex-Token", token)
            .header("X-Plex-Client-Identifier", client_identifier)
            .send()
            .map_err(|source| ApiError::Http {
                url: url.clone(),
                source,
            })?;
        let envelope: IdentityEnvelope = Self::decode(&url, response)?;
        Ok(envelope.media_container)
    }

    fn list_local_users(
        &self,
        server_uri: &str,
        token: &str,
        client_identifier: &str,
    ) -> Result<Vec<LocalAccount>, ApiError> {
        let url = format!("{}/accounts", server_uri.trim_end_matches('/'));
        let response = self.get(&url, Some(token), client_identifier)?;
        let envelope: AccountsEnvelope = Self::decode(&url, response)?;
        Ok(envelope.media_container.accounts)
    }

    fn list_shared_users(
        &self,
        machine_identifier: &str,
        token: &str,
        client_identifier: &str,
    ) -> Result<Vec<SharedServerUser>, ApiError> {
        let url = format!(
            "{}/api/servers/{}/shared_servers",
            self.base, machine_identifier
        );
        let response = self.get(&url, Some(token), client_identifier)?;
        let envelope: SharedServersEnvelope = Self::decode(&url, response)?;
        Ok(envelope.media_container.shared_servers)
    }

    fn create_pin(&self, client_identifier: &str) -> Result<Pin, ApiError> {
        let url = format!("{}/api/v2/pins?strong=true", self.base);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .header("X-Plex-Client-Identifier", client_identifier)
            .header("X-Plex-Product", PRODUCT)
            .header("X-Plex-Version", VERSION)
            .send()
            .map_err(|source| ApiError::Http {
                url: url.clone(),
                source,
            })?;
        let payload: PinPayload = Self::decode(&url, response)?;
        Ok(payload.into_pin(client_identifier))
    }

    fn poll_pin(&self, id: i64, client_identifier: &str) -> Result<Pin, ApiError> {
        let url = format!("{}/api/v2/pins/{}", self.base, id);
        let response = self.get(&url, None, client_identifier)?;
        let payload: PinPayload = Self::decode(&url, response)?;
        Ok(payload.into_pin(client_identifier))
    }
}

/// Compose the app.plex.tv authorization URL for a PIN. Pure formatting;
/// the parameter set must stay exactly what the authorization page expects.
pub fn auth_url(pin: &Pin, product: &str) -> String {
    let params = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("clientID", &pin.client_identifier)
        .append_pair("code", &pin.code)
        .append_pair("context[device][product]", product)
        .append_pair("context[device][version]", VERSION)
        .append_pair("context[device][platform]", std::env::consts::OS)
        .append_pair("context[device][device]", "CLI")
        .finish();
    format!("{}{}", AUTH_BASE, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_is_byte_exact() {
        let pin = Pin {
            id: 7,
            code: "XYZW".to_owned(),
            client_identifier: "abc123".to_owned(),
            expires_at: None,
            auth_token: None,
        };
        let expected = format!(
            "https://app.plex.tv/auth#?clientID=abc123&code=XYZW\
             &context%5Bdevice%5D%5Bproduct%5D=plexfind\
             &context%5Bdevice%5D%5Bversion%5D={}\
             &context%5Bdevice%5D%5Bplatform%5D={}\
             &context%5Bdevice%5D%5Bdevice%5D=CLI",
            VERSION,
            std::env::consts::OS
        );
        assert_eq!(auth_url(&pin, PRODUCT), expected);
    }

    #[test]
    fn auth_url_escapes_the_code() {
        let pin = Pin {
            id: 7,
            code: "A B+C".to_owned(),
            client_identifier: "abc".to_owned(),
            expires_at: None,
            auth_token: None,
        };
        assert!(auth_url(&pin, PRODUCT).contains("code=A+B%2BC"));
    }
}
