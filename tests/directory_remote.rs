use anyhow::{Context, Result};

use forgepass::config::Config;
use forgepass::remote::RemoteClient;
use forgepass::{Error, keys};

mod common;

use common::{StubDirectory, config_file};

const TEAMS: &str = "/orgs/acme/teams?per_page=100";
const TEAM_MEMBERS: &str = "/teams/5/members?per_page=100";

fn team_config(server: &StubDirectory, dir: &std::path::Path, team: &str) -> Result<Config> {
    let path = config_file(
        dir,
        &format!(
            "Endpoint = {}\n\
             Token = secret-token-abc\n\
             Organization = acme\n\
             Team = {}\n\
             Cache = 0\n\
             CacheDir = {}\n",
            server.base_url,
            team,
            dir.display()
        ),
    );
    Config::load(&path).context("load team config")
}

fn seed_team(server: &StubDirectory) {
    server.route(
        TEAMS,
        200,
        r#"[{"id": 5, "name": "ops", "slug": "ops-team"}]"#,
    );
    server.route(
        TEAM_MEMBERS,
        200,
        r#"[{"login": "linyows", "id": 72049}, {"login": "tomsawyer", "id": 100}]"#,
    );
}

#[test]
fn team_members_resolve_team_by_name() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    seed_team(&server);
    let con = team_config(&server, dir.path(), "ops")?;

    let members = RemoteClient::new(&con)?.members()?;
    let logins: Vec<_> = members
        .iter()
        .map(|m| m["login"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(logins, vec!["linyows", "tomsawyer"]);
    Ok(())
}

#[test]
fn team_members_resolve_team_by_slug() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    seed_team(&server);
    let con = team_config(&server, dir.path(), "ops-team")?;

    let members = RemoteClient::new(&con)?.members()?;
    assert_eq!(members.len(), 2);
    Ok(())
}

#[test]
fn unknown_team_does_not_resolve() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    seed_team(&server);
    let con = team_config(&server, dir.path(), "no-such-team")?;

    let client = RemoteClient::new(&con)?;
    assert_eq!(client.team_id()?, None);
    assert!(client.members().is_err());
    Ok(())
}

#[test]
fn empty_member_array_is_an_empty_list() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    server.route(TEAMS, 200, r#"[{"id": 5, "name": "ops", "slug": "ops"}]"#);
    server.route(TEAM_MEMBERS, 200, "[]");
    let con = team_config(&server, dir.path(), "ops")?;

    let members = RemoteClient::new(&con)?.members()?;
    assert!(members.is_empty());
    Ok(())
}

#[test]
fn collaborators_filter_on_configured_permission() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    server.route(
        "/repos/acme/infra/collaborators?per_page=100",
        200,
        r#"[
            {"login": "alice", "id": 1, "permissions": {"admin": true, "push": true, "pull": true}},
            {"login": "bob", "id": 2, "permissions": {"admin": false, "push": true, "pull": true}},
            {"login": "carol", "id": 3, "permissions": {"admin": false, "push": false, "pull": true}},
            {"login": "mallory", "id": 4}
        ]"#,
    );
    let path = config_file(
        dir.path(),
        &format!(
            "Endpoint = {}\n\
             Token = secret-token-abc\n\
             Owner = acme\n\
             Repository = infra\n\
             Permission = admin\n\
             Cache = 0\n\
             CacheDir = {}\n",
            server.base_url,
            dir.path().display()
        ),
    );
    let con = Config::load(&path)?;

    let members = RemoteClient::new(&con)?.members()?;
    let logins: Vec<_> = members
        .iter()
        .map(|m| m["login"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(logins, vec!["alice"]);
    Ok(())
}

#[test]
fn repository_mode_defaults_to_write_permission() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    server.route(
        "/repos/acme/infra/collaborators?per_page=100",
        200,
        r#"[
            {"login": "alice", "id": 1, "permissions": {"admin": true, "push": true, "pull": true}},
            {"login": "carol", "id": 3, "permissions": {"admin": false, "push": false, "pull": true}}
        ]"#,
    );
    let path = config_file(
        dir.path(),
        &format!(
            "Endpoint = {}\n\
             Token = secret-token-abc\n\
             Owner = acme\n\
             Repository = infra\n\
             Cache = 0\n\
             CacheDir = {}\n",
            server.base_url,
            dir.path().display()
        ),
    );
    let con = Config::load(&path)?;

    let members = RemoteClient::new(&con)?.members()?;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["login"], "alice");
    Ok(())
}

#[test]
fn authenticate_accepts_matching_login_only() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    seed_team(&server);
    server.route_for_token("/user", "good-token", 200, r#"{"login": "linyows"}"#);
    server.route_for_token("/user", "stolen-token", 200, r#"{"login": "someone-else"}"#);
    server.route("/user", 401, r#"{"message": "Bad credentials"}"#);
    let con = team_config(&server, dir.path(), "ops")?;
    let client = RemoteClient::new(&con)?;

    assert!(client.authenticate("linyows", "good-token").is_ok());
    assert!(matches!(
        client.authenticate("linyows", "stolen-token"),
        Err(Error::AuthFailed)
    ));
    assert!(matches!(
        client.authenticate("linyows", "revoked-token"),
        Err(Error::AuthFailed)
    ));
    Ok(())
}

#[test]
fn authenticate_reports_upstream_failure_as_transport() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    server.route("/user", 500, r#"{"message": "boom"}"#);
    let con = team_config(&server, dir.path(), "ops")?;
    let client = RemoteClient::new(&con)?;

    assert!(matches!(
        client.authenticate("linyows", "any-token"),
        Err(Error::Transport(_))
    ));
    Ok(())
}

#[test]
fn user_keys_concatenate_and_skip_broken_entries() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    seed_team(&server);
    server.route(
        "/users/linyows/keys?per_page=100",
        200,
        r#"[{"id": 1, "key": "ssh-rsa AAA"}, {"id": 2}, {"id": 3, "key": "ssh-ed25519 BBB"}]"#,
    );
    let con = team_config(&server, dir.path(), "ops")?;

    let keys = RemoteClient::new(&con)?.user_keys("linyows")?;
    assert_eq!(keys, "ssh-rsa AAA\nssh-ed25519 BBB\n");
    Ok(())
}

#[test]
fn shared_user_receives_aggregated_team_keys() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    seed_team(&server);
    server.route(
        "/users/linyows/keys?per_page=100",
        200,
        r#"[{"key": "ssh-rsa AAA"}]"#,
    );
    server.route(
        "/users/tomsawyer/keys?per_page=100",
        200,
        r#"[{"key": "ssh-rsa CCC"}]"#,
    );
    let path = config_file(
        dir.path(),
        &format!(
            "Endpoint = {}\n\
             Token = secret-token-abc\n\
             Organization = acme\n\
             Team = ops\n\
             Cache = 0\n\
             CacheDir = {}\n\
             SharedUsers = [\"deploy\"]\n",
            server.base_url,
            dir.path().display()
        ),
    );
    let con = Config::load(&path)?;

    let aggregated = keys::public_keys(&con, "deploy")?;
    assert_eq!(aggregated, "ssh-rsa AAA\nssh-rsa CCC\n");

    let own = keys::public_keys(&con, "linyows")?;
    assert_eq!(own, "ssh-rsa AAA\n");
    Ok(())
}

#[test]
fn every_request_carries_token_auth_and_user_agent_is_versioned() -> Result<()> {
    let server = StubDirectory::start();
    let dir = tempfile::tempdir()?;
    seed_team(&server);
    let con = team_config(&server, dir.path(), "ops")?;

    RemoteClient::new(&con)?.members()?;

    let requests = server.requests();
    assert!(!requests.is_empty());
    for req in requests {
        assert_eq!(req.authorization.as_deref(), Some("token secret-token-abc"));
        assert_eq!(req.user_agent.as_deref(), Some(forgepass::USER_AGENT));
    }
    Ok(())
}
