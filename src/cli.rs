use std::io::Read;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};

use forgepass::config::Config;
use forgepass::nss::{LookupError, LookupResult, group, passwd, shadow};
use forgepass::{auth, keys};

#[derive(Parser)]
#[command(name = "forgepass", version)]
#[command(about = "Directory-backed account, shadow, group and public key lookups")]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Display account entries served from the directory
    Passwd { key: Option<String> },
    /// Display shadow entries served from the directory
    Shadow { key: Option<String> },
    /// Display the directory-backed group
    Group { key: Option<String> },
    /// Authenticate a user with a token read from standard input
    Pam { user: Option<String> },
    // A bare user name prints that user's public keys.
    #[command(external_subcommand)]
    Keys(Vec<String>),
}

pub(crate) fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 2,
                _ => 1,
            };
            let _ = err.print();
            return code;
        }
    };

    init_tracing();

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return 2;
    };

    match dispatch(command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            1
        }
    }
}

// The library only emits events; picking and configuring the sink is the
// front-end's job.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = match std::env::var("FORGEPASS_LOG") {
        Ok(v) => EnvFilter::new(v),
        Err(_) => {
            let enabled = Config::load_default().map(|c| c.syslog).unwrap_or(false);
            EnvFilter::new(if enabled { "forgepass=info" } else { "off" })
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(command: Command) -> Result<i32> {
    match command {
        Command::Passwd { key } => handle_passwd(key),
        Command::Shadow { key } => handle_shadow(key),
        Command::Group { key } => handle_group(key),
        Command::Pam { user } => handle_pam(user),
        Command::Keys(args) => handle_keys(args),
    }
}

const INITIAL_BUFLEN: usize = 1024;
const MAX_BUFLEN: usize = 10 * 1024 * 1024;

/// Runs a lookup with the caller-side retry discipline: on `TryAgain` the
/// buffer is doubled and the same lookup repeated.
fn with_growing_buffer(
    mut f: impl FnMut(&mut [u8]) -> LookupResult<String>,
) -> LookupResult<String> {
    let mut len = INITIAL_BUFLEN;
    loop {
        let mut buf = vec![0u8; len];
        match f(&mut buf) {
            Err(LookupError::TryAgain { .. }) if len < MAX_BUFLEN => len *= 2,
            other => return other,
        }
    }
}

/// Positive integers select id-based lookup, everything else name-based.
fn numeric_key(key: &str) -> Option<u32> {
    match key.parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}

fn print_lookup(looked: LookupResult<String>, what: &str) -> Result<i32> {
    match looked {
        Ok(line) => {
            println!("{}", line);
            Ok(0)
        }
        Err(LookupError::NotFound { .. }) => Ok(0),
        Err(e) => Err(e).with_context(|| format!("look up {}", what)),
    }
}

fn handle_passwd(key: Option<String>) -> Result<i32> {
    match key {
        None => {
            passwd::set_ent(true).context("open account enumeration")?;
            loop {
                match with_growing_buffer(|buf| passwd::get_ent(buf).map(|e| e.to_string())) {
                    Ok(line) => println!("{}", line),
                    Err(LookupError::NotFound { .. }) => break,
                    Err(e) => {
                        let _ = passwd::end_ent();
                        return Err(e).context("account enumeration");
                    }
                }
            }
            passwd::end_ent().context("close account enumeration")?;
            Ok(0)
        }
        Some(key) => {
            let looked = match numeric_key(&key) {
                Some(uid) => {
                    with_growing_buffer(|buf| passwd::get_by_uid(uid, buf).map(|e| e.to_string()))
                }
                None => {
                    with_growing_buffer(|buf| passwd::get_by_name(&key, buf).map(|e| e.to_string()))
                }
            };
            print_lookup(looked, &key)
        }
    }
}

fn handle_shadow(key: Option<String>) -> Result<i32> {
    match key {
        None => {
            shadow::set_ent(true).context("open shadow enumeration")?;
            loop {
                match with_growing_buffer(|buf| shadow::get_ent(buf).map(|e| e.to_string())) {
                    Ok(line) => println!("{}", line),
                    Err(LookupError::NotFound { .. }) => break,
                    Err(e) => {
                        let _ = shadow::end_ent();
                        return Err(e).context("shadow enumeration");
                    }
                }
            }
            shadow::end_ent().context("close shadow enumeration")?;
            Ok(0)
        }
        Some(key) => {
            if numeric_key(&key).is_some() {
                eprintln!("Error: shadow entries have no numeric key: {}", key);
                return Ok(1);
            }
            let looked =
                with_growing_buffer(|buf| shadow::get_by_name(&key, buf).map(|e| e.to_string()));
            print_lookup(looked, &key)
        }
    }
}

fn handle_group(key: Option<String>) -> Result<i32> {
    match key {
        None => {
            group::set_ent(true).context("open group enumeration")?;
            loop {
                match with_growing_buffer(|buf| group::get_ent(buf).map(|e| e.to_string())) {
                    Ok(line) => println!("{}", line),
                    Err(LookupError::NotFound { .. }) => break,
                    Err(e) => {
                        let _ = group::end_ent();
                        return Err(e).context("group enumeration");
                    }
                }
            }
            group::end_ent().context("close group enumeration")?;
            Ok(0)
        }
        Some(key) => {
            let looked = match numeric_key(&key) {
                Some(gid) => {
                    with_growing_buffer(|buf| group::get_by_gid(gid, buf).map(|e| e.to_string()))
                }
                None => {
                    with_growing_buffer(|buf| group::get_by_name(&key, buf).map(|e| e.to_string()))
                }
            };
            print_lookup(looked, &key)
        }
    }
}

/// PAM helper: the token arrives on the first line of standard input, the
/// user as an argument or via `PAM_USER`. Exit 0 authenticates.
fn handle_pam(user: Option<String>) -> Result<i32> {
    let mut line = String::new();
    match std::io::stdin().lock().read_to_string(&mut line) {
        Ok(0) | Err(_) => {
            eprintln!("Error: failed to read token from stdin");
            return Ok(2);
        }
        Ok(_) => {}
    }
    let token = line.lines().next().unwrap_or("").trim_end_matches('\r');

    let Some(user) = user.or_else(|| std::env::var("PAM_USER").ok()) else {
        eprintln!("Error: user is required");
        return Ok(2);
    };

    let config = match Config::load_default() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(2);
        }
    };

    match auth::authenticate(&config, &user, token) {
        Ok(()) => Ok(0),
        Err(_) => Ok(1),
    }
}

fn handle_keys(args: Vec<String>) -> Result<i32> {
    let [name] = args.as_slice() else {
        eprintln!("Error: expected exactly one user name");
        return Ok(1);
    };

    let config = Config::load_default().context("load config")?;
    let keys = keys::public_keys(&config, name).context("fetch public keys")?;
    print!("{}", keys);
    Ok(0)
}
