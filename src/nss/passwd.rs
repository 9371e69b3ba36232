use std::sync::Mutex;

use crate::entry::{self, AccountEntry};

use super::cursor::{self, EntCursor};
use super::{LookupError, LookupResult};

static CURSOR: Mutex<EntCursor> = Mutex::new(EntCursor::new());

/// Opens account enumeration by publishing a fresh member snapshot.
pub fn set_ent(stay_open: bool) -> LookupResult<()> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!(stay_open, "setpwent");
    super::finish("setpwent", set_ent_locked(&mut cur))
}

fn set_ent_locked(cur: &mut EntCursor) -> LookupResult<()> {
    let config = super::load_config()?;
    let members = super::fetch_members(&config)?;
    cur.open(members);
    Ok(())
}

/// Packs the entry under the cursor and advances past it. The cursor does
/// not move on `TryAgain`, so the caller retries the same entry with a
/// larger buffer.
pub fn get_ent<'buf>(buf: &'buf mut [u8]) -> LookupResult<AccountEntry<'buf>> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!("getpwent");
    super::finish("getpwent", get_ent_locked(&mut cur, buf))
}

fn get_ent_locked<'buf>(
    cur: &mut EntCursor,
    buf: &'buf mut [u8],
) -> LookupResult<AccountEntry<'buf>> {
    if !cur.is_open() {
        set_ent_locked(cur)?;
    }

    let config = super::load_config()?;
    let Some(member) = cur.current() else {
        return Err(LookupError::not_found());
    };
    let entry = entry::pack_account(member, buf, &config).map_err(super::pack_error)?;
    cur.advance();
    Ok(entry)
}

/// Closes enumeration and frees the snapshot. Safe to call in any state.
pub fn end_ent() -> LookupResult<()> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!("endpwent");
    cur.close();
    super::finish("endpwent", Ok(()))
}

pub fn get_by_name<'buf>(name: &str, buf: &'buf mut [u8]) -> LookupResult<AccountEntry<'buf>> {
    let _cur = cursor::lock(&CURSOR);
    tracing::info!(name, "getpwnam");
    super::finish("getpwnam", get_by_name_locked(name, buf))
}

fn get_by_name_locked<'buf>(name: &str, buf: &'buf mut [u8]) -> LookupResult<AccountEntry<'buf>> {
    let config = super::load_config()?;
    let members = super::fetch_members(&config)?;
    let member = super::find_by_login(&members, name).ok_or_else(LookupError::not_found)?;
    entry::pack_account(member, buf, &config).map_err(super::pack_error)
}

/// The directory id is recovered from the requested uid by subtracting the
/// configured uid base.
pub fn get_by_uid<'buf>(uid: u32, buf: &'buf mut [u8]) -> LookupResult<AccountEntry<'buf>> {
    let _cur = cursor::lock(&CURSOR);
    tracing::info!(uid, "getpwuid");
    super::finish("getpwuid", get_by_uid_locked(uid, buf))
}

fn get_by_uid_locked<'buf>(uid: u32, buf: &'buf mut [u8]) -> LookupResult<AccountEntry<'buf>> {
    let config = super::load_config()?;
    let members = super::fetch_members(&config)?;
    let id = uid as i64 - config.uid_starts as i64;
    let member = super::find_by_id(&members, id).ok_or_else(LookupError::not_found)?;
    entry::pack_account(member, buf, &config).map_err(super::pack_error)
}
