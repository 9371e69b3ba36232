use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::{DEFAULT_CACHE_DIR, DEFAULT_CONFIG_FILE, DEFAULT_ENDPOINT, Error, Result};

mod permission;

pub use permission::Permission;

/// Runtime configuration, loaded fresh on every outer call and dropped at
/// return. All strings are already de-quoted and defaults are filled.
#[derive(Clone, Debug)]
pub struct Config {
    pub endpoint: String,
    pub token: String,
    pub organization: String,
    pub team: String,
    pub owner: String,
    pub repository: String,
    pub permission: Option<Permission>,
    pub group_name: String,
    pub home: String,
    pub shell: String,
    pub uid_starts: u32,
    pub gid: u32,
    /// Cache TTL in seconds; 0 disables the response cache.
    pub cache: u64,
    pub cache_dir: PathBuf,
    pub syslog: bool,
    /// Local logins that receive the aggregated team key list.
    pub shared_users: Vec<String>,
}

impl Config {
    /// Loads from `FORGEPASS_CONFIG` if set, else the system config file.
    pub fn load_default() -> Result<Config> {
        let path = env::var("FORGEPASS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load(Path::new(&path))
    }

    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {}", path.display(), e)))?;

        let mut con = Config {
            endpoint: String::new(),
            token: String::new(),
            organization: String::new(),
            team: String::new(),
            owner: String::new(),
            repository: String::new(),
            permission: None,
            group_name: String::new(),
            home: String::new(),
            shell: String::new(),
            uid_starts: 2000,
            gid: 2000,
            cache: 500,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            syslog: false,
            shared_users: Vec::new(),
        };

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let Some((key, rest)) = line.split_once(" = ") else {
                continue;
            };
            let key = key.trim();
            let value = dequote(rest);

            match key {
                "Endpoint" => con.endpoint = ensure_trailing_slash(value),
                "Token" => con.token = value.to_string(),
                "Organization" => con.organization = value.to_string(),
                "Team" => con.team = value.to_string(),
                "Owner" => con.owner = value.to_string(),
                "Repository" => con.repository = value.to_string(),
                "Permission" => con.permission = Some(value.parse()?),
                "Group" => con.group_name = value.to_string(),
                "Home" => con.home = value.to_string(),
                "Shell" => con.shell = value.to_string(),
                "UidStarts" => con.uid_starts = parse_number(key, value)?,
                "Gid" => con.gid = parse_number(key, value)?,
                "Cache" => con.cache = parse_number(key, value)?,
                "CacheDir" => con.cache_dir = PathBuf::from(value),
                "Syslog" => con.syslog = value == "true",
                "SharedUsers" => con.shared_users = scan_shared_users(rest)?,
                _ => {}
            }
        }

        con.apply_env_overrides()?;
        con.fill_defaults();

        if con.token.is_empty() {
            return Err(Error::Config("Token is required".to_string()));
        }

        tracing::info!(
            endpoint = %con.endpoint,
            token = %masked_token(&con.token),
            organization = %con.organization,
            team = %con.team,
            owner = %con.owner,
            repository = %con.repository,
            group = %con.group_name,
            uid_starts = con.uid_starts,
            gid = con.gid,
            cache = con.cache,
            "config loaded"
        );

        Ok(con)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var("FORGEPASS_TOKEN") {
            self.token = v;
        }
        if let Ok(v) = env::var("FORGEPASS_ENDPOINT") {
            self.endpoint = ensure_trailing_slash(&v);
        }
        if let Ok(v) = env::var("FORGEPASS_ORGANIZATION") {
            self.organization = v;
        }
        if let Ok(v) = env::var("FORGEPASS_TEAM") {
            self.team = v;
        }
        if let Ok(v) = env::var("FORGEPASS_OWNER") {
            self.owner = v;
        }
        if let Ok(v) = env::var("FORGEPASS_REPOSITORY") {
            self.repository = v;
        }
        if let Ok(v) = env::var("FORGEPASS_PERMISSION") {
            self.permission = Some(v.parse()?);
        }
        Ok(())
    }

    fn fill_defaults(&mut self) {
        if self.endpoint.is_empty() {
            self.endpoint = DEFAULT_ENDPOINT.to_string();
        }
        if self.group_name.is_empty() {
            self.group_name = if self.repository.is_empty() {
                self.team.clone()
            } else {
                self.repository.clone()
            };
        }
        if self.owner.is_empty() && !self.organization.is_empty() {
            self.owner = self.organization.clone();
        }
        if !self.repository.is_empty() && self.permission.is_none() {
            self.permission = Some(Permission::Write);
        }
        if self.home.is_empty() {
            self.home = "/home/%s".to_string();
        }
        if self.shell.is_empty() {
            self.shell = "/bin/bash".to_string();
        }
    }

    /// Renders the home template by substituting the login for its `%s`.
    pub fn home_dir(&self, login: &str) -> String {
        self.home.replacen("%s", login, 1)
    }

    pub fn is_shared_user(&self, name: &str) -> bool {
        self.shared_users.iter().any(|u| u == name)
    }
}

/// Replaces all but the first 5 characters of the token with a fixed marker.
pub fn masked_token(token: &str) -> String {
    let prefix: String = token.chars().take(5).collect();
    format!("{} ************ REDACTED ************", prefix)
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

fn dequote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid {}: {}", key, value)))
}

fn scan_shared_users(value: &str) -> Result<Vec<String>> {
    let re = Regex::new(r#""([A-Za-z0-9_-]+)""#)
        .map_err(|e| Error::Config(format!("shared users pattern: {}", e)))?;
    Ok(re
        .captures_iter(value)
        .map(|c| c[1].to_string())
        .collect())
}
