use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Operator-facing permission names for repository mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Admin,
    Write,
    Read,
}

impl Permission {
    /// The collaborator permission flag the directory reports for this level.
    pub fn flag(self) -> &'static str {
        match self {
            Permission::Admin => "admin",
            Permission::Write => "push",
            Permission::Read => "pull",
        }
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "admin" => Ok(Permission::Admin),
            "write" => Ok(Permission::Write),
            "read" => Ok(Permission::Read),
            other => Err(Error::Config(format!("unknown permission: {}", other))),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::Admin => "admin",
            Permission::Write => "write",
            Permission::Read => "read",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_names_to_directory_flags() {
        assert_eq!(Permission::Admin.flag(), "admin");
        assert_eq!(Permission::Write.flag(), "push");
        assert_eq!(Permission::Read.flag(), "pull");
    }

    #[test]
    fn parses_known_names_only() {
        assert_eq!("admin".parse::<Permission>().unwrap(), Permission::Admin);
        assert_eq!("write".parse::<Permission>().unwrap(), Permission::Write);
        assert_eq!("read".parse::<Permission>().unwrap(), Permission::Read);
        assert!("maintain".parse::<Permission>().is_err());
    }
}
