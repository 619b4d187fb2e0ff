pub mod cache;
pub mod config;
pub mod dedup;
pub mod fuzzy;
pub mod manager;
pub mod model;
pub mod plex;

pub use config::{Account, Config};
pub use manager::{Manager, DEFAULT_MAX_RESULTS};
pub use plex::{auth_url, ApiError, DirectoryClient, PlexTv, PRODUCT};
