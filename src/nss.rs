use std::fmt;

use serde_json::Value;

use crate::Error;
use crate::config::Config;
use crate::entry::PackError;
use crate::remote::RemoteClient;

mod cursor;
pub mod group;
pub mod passwd;
pub mod shadow;

/// Host-facing status of a service operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    NotFound,
    Unavail,
    TryAgain,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Success => "SUCCESS",
            Status::NotFound => "NOTFOUND",
            Status::Unavail => "UNAVAIL",
            Status::TryAgain => "TRYAGAIN",
        };
        f.write_str(name)
    }
}

/// Non-success outcome of a service operation, carrying the errno the host
/// expects. `TryAgain` is its own variant because the caller's recovery is
/// different: grow the buffer and retry without the cursor moving.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("entry not found")]
    NotFound { errno: i32 },

    #[error("directory unavailable")]
    Unavail { errno: i32 },

    #[error("buffer too small, retry with a larger one")]
    TryAgain { errno: i32 },
}

impl LookupError {
    pub(crate) fn not_found() -> Self {
        LookupError::NotFound {
            errno: libc::ENOENT,
        }
    }

    pub(crate) fn unavail() -> Self {
        LookupError::Unavail {
            errno: libc::ENOENT,
        }
    }

    pub(crate) fn unavail_io() -> Self {
        LookupError::Unavail { errno: libc::EIO }
    }

    pub(crate) fn try_again() -> Self {
        LookupError::TryAgain {
            errno: libc::ERANGE,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            LookupError::NotFound { .. } => Status::NotFound,
            LookupError::Unavail { .. } => Status::Unavail,
            LookupError::TryAgain { .. } => Status::TryAgain,
        }
    }

    pub fn errno(&self) -> i32 {
        match self {
            LookupError::NotFound { errno }
            | LookupError::Unavail { errno }
            | LookupError::TryAgain { errno } => *errno,
        }
    }
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Emits the exit line for an outer call and passes the result through.
pub(crate) fn finish<T>(op: &'static str, res: LookupResult<T>) -> LookupResult<T> {
    match &res {
        Ok(_) => tracing::info!(op, status = %Status::Success, "done"),
        Err(e) if e.status() == Status::Unavail => {
            tracing::error!(op, status = %e.status(), errno = e.errno(), "failed");
        }
        Err(e) => tracing::info!(op, status = %e.status(), errno = e.errno(), "done"),
    }
    res
}

pub(crate) fn load_config() -> LookupResult<Config> {
    Config::load_default().map_err(|e| {
        tracing::error!(error = %e, "config load failed");
        LookupError::unavail_io()
    })
}

/// Fetches the full member snapshot for the current configuration.
pub(crate) fn fetch_members(config: &Config) -> LookupResult<Vec<Value>> {
    let fetch = || -> Result<Vec<Value>, Error> {
        let client = RemoteClient::new(config)?;
        client.members()
    };
    fetch().map_err(|e| {
        tracing::error!(error = %e, "member fetch failed");
        LookupError::unavail()
    })
}

pub(crate) fn pack_error(e: PackError) -> LookupError {
    match e {
        PackError::Malformed => LookupError::not_found(),
        PackError::BufferTooSmall => LookupError::try_again(),
    }
}

pub(crate) fn find_by_login<'a>(members: &'a [Value], name: &str) -> Option<&'a Value> {
    members
        .iter()
        .find(|m| m.get("login").and_then(Value::as_str) == Some(name))
}

/// First member whose directory id matches; with duplicate ids the earliest
/// in delivered order wins.
pub(crate) fn find_by_id(members: &[Value], id: i64) -> Option<&Value> {
    members
        .iter()
        .find(|m| m.get("id").and_then(Value::as_i64) == Some(id))
}
