use std::sync::Mutex;

use crate::entry::{self, ShadowEntry};

use super::cursor::{self, EntCursor};
use super::{LookupError, LookupResult};

static CURSOR: Mutex<EntCursor> = Mutex::new(EntCursor::new());

pub fn set_ent(stay_open: bool) -> LookupResult<()> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!(stay_open, "setspent");
    super::finish("setspent", set_ent_locked(&mut cur))
}

fn set_ent_locked(cur: &mut EntCursor) -> LookupResult<()> {
    let config = super::load_config()?;
    let members = super::fetch_members(&config)?;
    cur.open(members);
    Ok(())
}

pub fn get_ent<'buf>(buf: &'buf mut [u8]) -> LookupResult<ShadowEntry<'buf>> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!("getspent");
    super::finish("getspent", get_ent_locked(&mut cur, buf))
}

fn get_ent_locked<'buf>(
    cur: &mut EntCursor,
    buf: &'buf mut [u8],
) -> LookupResult<ShadowEntry<'buf>> {
    if !cur.is_open() {
        set_ent_locked(cur)?;
    }

    let Some(member) = cur.current() else {
        return Err(LookupError::not_found());
    };
    let entry = entry::pack_shadow(member, buf).map_err(super::pack_error)?;
    cur.advance();
    Ok(entry)
}

pub fn end_ent() -> LookupResult<()> {
    let mut cur = cursor::lock(&CURSOR);
    tracing::info!("endspent");
    cur.close();
    super::finish("endspent", Ok(()))
}

pub fn get_by_name<'buf>(name: &str, buf: &'buf mut [u8]) -> LookupResult<ShadowEntry<'buf>> {
    let _cur = cursor::lock(&CURSOR);
    tracing::info!(name, "getspnam");
    super::finish("getspnam", get_by_name_locked(name, buf))
}

fn get_by_name_locked<'buf>(name: &str, buf: &'buf mut [u8]) -> LookupResult<ShadowEntry<'buf>> {
    let config = super::load_config()?;
    let members = super::fetch_members(&config)?;
    let member = super::find_by_login(&members, name).ok_or_else(LookupError::not_found)?;
    entry::pack_shadow(member, buf).map_err(super::pack_error)
}
