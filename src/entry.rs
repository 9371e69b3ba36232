use std::fmt;
use std::ops::Range;

use serde_json::Value;

use crate::config::Config;

pub const GECOS: &str = "managed by forgepass";

/// Outcome of packing a directory record into a caller buffer. A caller
/// seeing `BufferTooSmall` retries with a larger buffer; the cursor it came
/// from must not have advanced.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PackError {
    #[error("record is missing a required field or has the wrong shape")]
    Malformed,

    #[error("caller buffer is too small")]
    BufferTooSmall,
}

/// An account record whose string fields all point into the caller buffer
/// it was packed into; the record lives exactly as long as that buffer.
#[derive(Debug)]
pub struct AccountEntry<'buf> {
    pub name: &'buf str,
    pub passwd: &'static str,
    pub uid: u32,
    pub gid: u32,
    pub gecos: &'static str,
    pub dir: &'buf str,
    pub shell: &'buf str,
}

impl fmt::Display for AccountEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}",
            self.name, self.passwd, self.uid, self.gid, self.gecos, self.dir, self.shell
        )
    }
}

#[derive(Debug)]
pub struct ShadowEntry<'buf> {
    pub name: &'buf str,
    pub passwd: &'static str,
    pub last_change: i64,
    pub min: i64,
    pub max: i64,
    pub warn: i64,
    pub inactive: i64,
    pub expire: i64,
    pub flag: u64,
}

impl fmt::Display for ShadowEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Negative date/age fields render as empty, shadow-file style.
        write!(f, "{}:{}:", self.name, self.passwd)?;
        for v in [
            self.last_change,
            self.min,
            self.max,
            self.warn,
            self.inactive,
            self.expire,
        ] {
            if v >= 0 {
                write!(f, "{}", v)?;
            }
            f.write_str(":")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct GroupEntry<'buf> {
    pub name: &'buf str,
    pub passwd: &'static str,
    pub gid: u32,
    pub members: Vec<&'buf str>,
}

impl fmt::Display for GroupEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.name,
            self.passwd,
            self.gid,
            self.members.join(",")
        )
    }
}

/// Bump cursor over a caller-supplied buffer. Strings are written
/// contiguously, each followed by a NUL, and handed back as ranges so the
/// packed record can borrow them once writing is done.
struct BufCursor<'buf> {
    buf: &'buf mut [u8],
    used: usize,
}

impl<'buf> BufCursor<'buf> {
    fn new(buf: &'buf mut [u8]) -> Self {
        buf.fill(0);
        Self { buf, used: 0 }
    }

    /// Sets aside room at the head of the buffer without writing into it
    /// (the group member record leads with its pointer-slot array).
    fn reserve(&mut self, bytes: usize) -> Result<(), PackError> {
        if self.used + bytes > self.buf.len() {
            return Err(PackError::BufferTooSmall);
        }
        self.used += bytes;
        Ok(())
    }

    fn push_str(&mut self, s: &str) -> Result<Range<usize>, PackError> {
        let start = self.used;
        let end = start + s.len();
        if end + 1 > self.buf.len() {
            return Err(PackError::BufferTooSmall);
        }
        self.buf[start..end].copy_from_slice(s.as_bytes());
        self.buf[end] = 0;
        self.used = end + 1;
        Ok(start..end)
    }

    fn finish(self) -> &'buf [u8] {
        self.buf
    }
}

fn str_at(buf: &[u8], range: Range<usize>) -> Result<&str, PackError> {
    std::str::from_utf8(&buf[range]).map_err(|_| PackError::Malformed)
}

fn login_of(member: &Value) -> Result<&str, PackError> {
    member
        .get("login")
        .and_then(Value::as_str)
        .ok_or(PackError::Malformed)
}

pub fn pack_account<'buf>(
    member: &Value,
    buf: &'buf mut [u8],
    config: &Config,
) -> Result<AccountEntry<'buf>, PackError> {
    if !member.is_object() {
        return Err(PackError::Malformed);
    }
    let login = login_of(member)?;
    let id = member
        .get("id")
        .and_then(Value::as_u64)
        .ok_or(PackError::Malformed)?;
    let dir = config.home_dir(login);

    let mut cur = BufCursor::new(buf);
    let name = cur.push_str(login)?;
    let dir = cur.push_str(&dir)?;
    let shell = cur.push_str(&config.shell)?;
    let buf = cur.finish();

    Ok(AccountEntry {
        name: str_at(buf, name)?,
        passwd: "x",
        uid: (config.uid_starts as u64 + id) as u32,
        gid: config.gid,
        gecos: GECOS,
        dir: str_at(buf, dir)?,
        shell: str_at(buf, shell)?,
    })
}

pub fn pack_shadow<'buf>(
    member: &Value,
    buf: &'buf mut [u8],
) -> Result<ShadowEntry<'buf>, PackError> {
    if !member.is_object() {
        return Err(PackError::Malformed);
    }
    let login = login_of(member)?;

    let mut cur = BufCursor::new(buf);
    let name = cur.push_str(login)?;
    let buf = cur.finish();

    Ok(ShadowEntry {
        name: str_at(buf, name)?,
        passwd: "!!",
        last_change: -1,
        min: -1,
        max: -1,
        warn: -1,
        inactive: -1,
        expire: -1,
        flag: u64::MAX,
    })
}

/// Packs the single synthesized group: name and gid from the config,
/// member logins from the directory array in delivered order. The head of
/// the buffer is reserved for the `(count + 1)` pointer slots the host
/// group record leads with (terminator included).
pub fn pack_group<'buf>(
    members: &Value,
    buf: &'buf mut [u8],
    config: &Config,
) -> Result<GroupEntry<'buf>, PackError> {
    let Some(items) = members.as_array() else {
        return Err(PackError::Malformed);
    };

    let mut cur = BufCursor::new(buf);
    cur.reserve((items.len() + 1) * std::mem::size_of::<usize>())?;
    let name = cur.push_str(&config.group_name)?;

    let mut ranges = Vec::new();
    for member in items {
        let Some(login) = member.get("login").and_then(Value::as_str) else {
            continue;
        };
        ranges.push(cur.push_str(login)?);
    }
    let buf = cur.finish();

    let mut member_names = Vec::with_capacity(ranges.len());
    for range in ranges {
        member_names.push(str_at(buf, range)?);
    }

    Ok(GroupEntry {
        name: str_at(buf, name)?,
        passwd: "x",
        gid: config.gid,
        members: member_names,
    })
}
