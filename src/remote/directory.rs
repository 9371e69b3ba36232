use serde::Deserialize;
use serde_json::Value;

use super::*;

#[derive(Debug, Deserialize)]
struct AuthedUser {
    #[serde(default)]
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyEntry {
    #[serde(default)]
    key: Option<String>,
}

impl RemoteClient<'_> {
    /// Resolves the configured team to its numeric id by scanning the
    /// organization's teams for a matching `name` or `slug`.
    pub fn team_id(&self) -> Result<Option<i64>> {
        let url = self.url(&format!(
            "orgs/{}/teams?per_page=100",
            self.config.organization
        ));
        let items = self.get_array(&url)?;

        for team in &items {
            let Some(id) = team.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let name = team.get("name").and_then(Value::as_str);
            let slug = team.get("slug").and_then(Value::as_str);
            if name == Some(self.config.team.as_str()) || slug == Some(self.config.team.as_str()) {
                return Ok(Some(id));
            }
        }

        Ok(None)
    }

    pub fn team_members(&self) -> Result<Vec<Value>> {
        let Some(team_id) = self.team_id()? else {
            tracing::error!(team = %self.config.team, "team not found");
            return Err(Error::NotFound);
        };
        let url = self.url(&format!("teams/{}/members?per_page=100", team_id));
        self.get_array(&url)
    }

    /// Collaborators of the configured repository, filtered down to those
    /// holding the configured permission level.
    pub fn repository_collaborators(&self) -> Result<Vec<Value>> {
        let permission = self
            .config
            .permission
            .ok_or_else(|| Error::Config("Permission is required for repository mode".into()))?;
        let url = self.url(&format!(
            "repos/{}/{}/collaborators?per_page=100",
            self.config.owner, self.config.repository
        ));
        let items = self.get_array(&url)?;

        let flag = permission.flag();
        Ok(items
            .into_iter()
            .filter(|c| {
                c.get("permissions")
                    .and_then(|p| p.get(flag))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// The single enumeration entry point: repository mode when a
    /// repository is configured, team mode otherwise.
    pub fn members(&self) -> Result<Vec<Value>> {
        if self.config.repository.is_empty() {
            self.team_members()
        } else {
            self.repository_collaborators()
        }
    }

    /// Verifies the supplied token by fetching the authenticated user,
    /// bypassing the cache so a revoked token is seen immediately. Only a
    /// 401 or a login mismatch is an authentication failure; any other
    /// non-2xx status is the upstream being unavailable.
    pub fn authenticate(&self, user: &str, token: &str) -> Result<()> {
        let url = self.url("user");
        let res = self.get_uncached(&url, Some(token))?;

        if res.status == 401 {
            return Err(Error::AuthFailed);
        }
        if !res.is_ok() {
            return Err(Error::Transport(format!(
                "{} returned {}",
                url, res.status
            )));
        }

        let authed: AuthedUser = serde_json::from_str(&res.body)
            .map_err(|e| Error::Parse(format!("authenticated user: {}", e)))?;
        if authed.login.as_deref() == Some(user) {
            Ok(())
        } else {
            Err(Error::AuthFailed)
        }
    }

    /// Public keys of one user, one key per line. Elements without a `key`
    /// string are skipped.
    pub fn user_keys(&self, user: &str) -> Result<String> {
        let url = self.url(&format!("users/{}/keys?per_page=100", user));
        let res = self.get(&url)?;
        if !res.is_ok() {
            return Err(Error::Transport(format!(
                "keys request for {} returned {}",
                user, res.status
            )));
        }

        let entries: Vec<KeyEntry> = serde_json::from_str(&res.body)
            .map_err(|e| Error::Parse(format!("keys of {}: {}", user, e)))?;

        let mut out = String::new();
        for entry in entries {
            if let Some(key) = entry.key {
                out.push_str(&key);
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Concatenated keys of every directory member, in member order.
    /// Members without a `login` string are skipped.
    pub fn team_members_keys(&self) -> Result<String> {
        let members = self.members()?;

        let mut out = String::new();
        for member in &members {
            let Some(login) = member.get("login").and_then(Value::as_str) else {
                continue;
            };
            out.push_str(&self.user_keys(login)?);
        }
        Ok(out)
    }

    fn get_array(&self, url: &str) -> Result<Vec<Value>> {
        let res = self.get(url)?;
        if !res.is_ok() {
            return Err(Error::Transport(format!(
                "{} returned {}",
                url, res.status
            )));
        }

        let root: Value = serde_json::from_str(&res.body)
            .map_err(|e| Error::Parse(format!("{}: {}", url, e)))?;
        match root {
            Value::Array(items) => Ok(items),
            _ => Err(Error::Parse(format!("{}: expected an array", url))),
        }
    }
}
