pub mod auth;
pub mod config;
pub mod entry;
pub mod keys;
pub mod nss;
pub mod remote;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const USER_AGENT: &str = concat!("forgepass/", env!("CARGO_PKG_VERSION"));

/// Default service endpoint when the config does not name one.
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/";

pub const DEFAULT_CONFIG_FILE: &str = "/etc/forgepass.conf";
pub const DEFAULT_CACHE_DIR: &str = "/var/cache/forgepass";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config: {0}")]
    Config(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("unexpected response shape: {0}")]
    Parse(String),

    #[error("not found")]
    NotFound,

    #[error("authentication failed")]
    AuthFailed,
}

pub type Result<T> = std::result::Result<T, Error>;
