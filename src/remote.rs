use std::time::Duration;

use crate::config::Config;
use crate::{Error, Result};

mod cache;
mod directory;
mod http;

/// Raw upstream response: the body as text plus the HTTP status. Bodies
/// served from the on-disk cache report status 200.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub body: String,
    pub status: u16,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Client for the directory API. Borrows the per-call config; construction
/// happens on every outer call and is cheap next to the network round-trip.
pub struct RemoteClient<'a> {
    config: &'a Config,
    client: reqwest::blocking::Client,
}

impl<'a> RemoteClient<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .map_err(|e| Error::Transport(format!("build http client: {}", e)))?;
        Ok(Self { config, client })
    }

    // The endpoint always carries a trailing slash, so paths never start
    // with one.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint, path)
    }
}
