use crate::config::Config;
use crate::remote::RemoteClient;
use crate::Result;

/// SSH public keys for a local login. A shared user receives the
/// aggregated keys of every directory member instead of its own.
pub fn public_keys(config: &Config, name: &str) -> Result<String> {
    tracing::info!(name, "public keys");
    let client = RemoteClient::new(config)?;

    if config.is_shared_user(name) {
        client.team_members_keys()
    } else {
        client.user_keys(name)
    }
}
