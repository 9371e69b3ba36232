use std::sync::Mutex;

use serde_json::Value;

use crate::config::Config;
use crate::entry::{self, GroupEntry, PackError};

use super::cursor::{self, EntCursor};
use super::{LookupError, LookupResult};

static CURSOR: Mutex<EntCursor> = Mutex::new(EntCursor::new());

/// There is exactly one group: the configured group name holding every
/// directory member. Its enumeration snapshot is a one-element virtual
/// array wrapping the member list.
fn fetch_snapshot(config: &Config) -> LookupResult<Vec<Value>> {
    let members = super::fetch_members(config)?;
    Ok(vec![Value::Array(members)])
}

pub fn set_ent(stay_open: bool) -> LookupResult<()> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!(stay_open, "setgrent");
    super::finish("setgrent", set_ent_locked(&mut cur))
}

fn set_ent_locked(cur: &mut EntCursor) -> LookupResult<()> {
    let config = super::load_config()?;
    let snapshot = fetch_snapshot(&config)?;
    cur.open(snapshot);
    Ok(())
}

pub fn get_ent<'buf>(buf: &'buf mut [u8]) -> LookupResult<GroupEntry<'buf>> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!("getgrent");
    super::finish("getgrent", get_ent_locked(&mut cur, buf))
}

fn get_ent_locked<'buf>(cur: &mut EntCursor, buf: &'buf mut [u8]) -> LookupResult<GroupEntry<'buf>> {
    if !cur.is_open() {
        set_ent_locked(cur)?;
    }

    let config = super::load_config()?;
    let Some(members) = cur.current() else {
        return Err(LookupError::not_found());
    };
    // A snapshot that is not an array never came from a directory fetch.
    let entry = entry::pack_group(members, buf, &config).map_err(|e| match e {
        PackError::Malformed => LookupError::unavail(),
        PackError::BufferTooSmall => LookupError::try_again(),
    })?;
    cur.advance();
    Ok(entry)
}

pub fn end_ent() -> LookupResult<()> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!("endgrent");
    cur.close();
    super::finish("endgrent", Ok(()))
}

/// Only the configured group name resolves; anything else is absent.
pub fn get_by_name<'buf>(name: &str, buf: &'buf mut [u8]) -> LookupResult<GroupEntry<'buf>> {
    let _cur = cursor::lock(&CURSOR);
    tracing::info!(name, "getgrnam");
    super::finish("getgrnam", get_by_name_locked(name, buf))
}

fn get_by_name_locked<'buf>(name: &str, buf: &'buf mut [u8]) -> LookupResult<GroupEntry<'buf>> {
    let config = super::load_config()?;
    if name != config.group_name {
        return Err(LookupError::not_found());
    }
    pack_fetched_group(&config, buf)
}

/// Only the configured gid resolves; anything else is absent.
pub fn get_by_gid<'buf>(gid: u32, buf: &'buf mut [u8]) -> LookupResult<GroupEntry<'buf>> {
    let _cur = cursor::lock(&CURSOR);
    tracing::info!(gid, "getgrgid");
    super::finish("getgrgid", get_by_gid_locked(gid, buf))
}

fn get_by_gid_locked<'buf>(gid: u32, buf: &'buf mut [u8]) -> LookupResult<GroupEntry<'buf>> {
    let config = super::load_config()?;
    if gid != config.gid {
        return Err(LookupError::not_found());
    }
    pack_fetched_group(&config, buf)
}

fn pack_fetched_group<'buf>(config: &Config, buf: &'buf mut [u8]) -> LookupResult<GroupEntry<'buf>> {
    let members = Value::Array(super::fetch_members(config)?);
    entry::pack_group(&members, buf, config).map_err(super::pack_error)
}
