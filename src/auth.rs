use std::sync::{Mutex, PoisonError};

use crate::config::Config;
use crate::remote::RemoteClient;
use crate::{Error, Result};

// Authentication serializes on its own lock, independent of the
// enumeration cursors.
static AUTH_MUTEX: Mutex<()> = Mutex::new(());

/// Verifies that `token` belongs to `user` by asking the directory who the
/// token authenticates as. Bypasses the response cache so a revoked token
/// fails immediately. The token itself is never logged.
pub fn authenticate(config: &Config, user: &str, token: &str) -> Result<()> {
    let _guard = AUTH_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
    tracing::info!(user, "authenticate");

    let client = RemoteClient::new(config)?;
    match client.authenticate(user, token) {
        Ok(()) => {
            tracing::info!(user, status = "SUCCESS", "authenticate done");
            Ok(())
        }
        Err(Error::AuthFailed) => {
            tracing::info!(user, status = "FAILED", "authenticate done");
            Err(Error::AuthFailed)
        }
        Err(e) => {
            tracing::error!(user, error = %e, "authenticate failed");
            Err(e)
        }
    }
}
