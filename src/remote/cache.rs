use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::*;

impl RemoteClient<'_> {
    /// Cache-aware GET. A fresh on-disk entry is served as a 200 without
    /// touching the network; otherwise the request is performed and a 200
    /// body replaces the entry. A stale entry survives a failed refresh.
    pub fn get(&self, url: &str) -> Result<ApiResponse> {
        if self.config.cache == 0 {
            return self.get_uncached(url, None);
        }

        let dir = self.config.cache_dir.join(effective_uid().to_string());
        let file = dir.join(cache_file_name(url, &self.config.token));

        if is_fresh(&file, self.config.cache)
            && let Ok(body) = fs::read_to_string(&file)
        {
            tracing::info!(path = %file.display(), "use cache");
            return Ok(ApiResponse { body, status: 200 });
        }

        let res = self.get_uncached(url, None)?;
        if res.is_ok() {
            store(&dir, &file, &res.body)?;
        }
        Ok(res)
    }
}

fn effective_uid() -> u32 {
    // Always safe to call; the binding is unsafe only because it is foreign.
    unsafe { libc::geteuid() }
}

/// `<url-escaped-url>-<first-6-chars-of-token>`. The token prefix keeps
/// caches of distinct credentials apart under a shared cache root.
fn cache_file_name(url: &str, token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}-{}", urlencoding::encode(url), prefix)
}

fn is_fresh(path: &Path, ttl: u64) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    let Ok(mtime) = meta.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(mtime) {
        Ok(age) => age.as_secs() <= ttl,
        // An mtime in the future counts as fresh.
        Err(_) => true,
    }
}

fn store(dir: &Path, file: &Path, body: &str) -> Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Transport(format!("create cache dir {}: {}", dir.display(), e)))?;
        set_mode(dir, 0o700)?;
    }
    write_atomic(file, body.as_bytes())?;
    set_mode(file, 0o644)
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::Transport(format!("chmod {}: {}", path.display(), e)))
}

// The temp name must append to the full cache file name rather than swap
// an "extension": escaped URLs keep their dots, so trimming at the last dot
// would collapse every key of one endpoint onto a single temp path.
fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.tmp.{}", path.display(), std::process::id()))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)
        .map_err(|e| Error::Transport(format!("write temp file {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path).map_err(|e| {
        Error::Transport(format!(
            "rename {} -> {}: {}",
            tmp.display(),
            path.display(),
            e
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_file_name_escapes_url_and_keeps_token_prefix() {
        let name = cache_file_name(
            "https://api.example.com/orgs/acme/teams?per_page=100",
            "secret-token",
        );
        assert!(!name.contains('/'));
        assert!(!name.contains('?'));
        assert!(name.ends_with("-secret"));
        assert!(!name.contains("secret-token"));
    }

    #[test]
    fn missing_file_is_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_fresh(&dir.path().join("nope"), 500));
    }

    #[test]
    fn just_written_file_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry");
        fs::write(&path, b"body").unwrap();
        assert!(is_fresh(&path, 500));
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn distinct_dotted_cache_names_get_distinct_temp_paths() {
        let dir = tempfile::tempdir().unwrap();
        let teams = dir.path().join(cache_file_name(
            "https://api.example.com/orgs/acme/teams?per_page=100",
            "secret-token",
        ));
        let members = dir.path().join(cache_file_name(
            "https://api.example.com/teams/5/members?per_page=100",
            "secret-token",
        ));
        assert_ne!(tmp_path(&teams), tmp_path(&members));

        write_atomic(&teams, b"teams").unwrap();
        write_atomic(&members, b"members").unwrap();
        assert_eq!(fs::read_to_string(&teams).unwrap(), "teams");
        assert_eq!(fs::read_to_string(&members).unwrap(), "members");
    }
}
