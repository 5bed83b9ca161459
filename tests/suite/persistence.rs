//! State surviving restarts.

use invitegate_core::{EntitySession, VerifyOutcome};

use crate::common::{Player, STANDARD_CONFIG, Server};

#[test]
fn verified_and_attempts_survive_a_restart() {
    let server = Server::start(STANDARD_CONFIG);
    let verified = Player::new("Alex");
    let failing = Player::new("Sam");
    server.gate.attempt_verify(verified.as_ref(), "ABC");
    server.gate.attempt_verify(failing.as_ref(), "nope");
    server.gate.attempt_verify(failing.as_ref(), "nope");

    let server = server.restart();

    assert!(server.gate.is_verified(&verified.identity()));
    assert_eq!(server.gate.record(&failing.identity()).failed_attempts(), 2);
    assert!(matches!(
        server.gate.attempt_verify(failing.rejoin().as_ref(), "nope"),
        VerifyOutcome::Punished { attempts: 3, .. }
    ));
}

#[test]
fn first_start_writes_default_config_and_no_one_is_verified() {
    let dir = tempfile::tempdir().unwrap();
    let server = Server::start_in(dir);

    let config = crate::common::read(&server.path("config.yml"));
    assert!(config.contains("invite-codes"));
    assert_eq!(server.gate.config().time_limit_secs(), 60);
    assert!(!server.gate.is_verified(&Player::new("Alex").identity()));
}

#[test]
fn unreadable_state_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.yml"), STANDARD_CONFIG).unwrap();
    std::fs::write(dir.path().join("verified.yml"), "verified: [: nope").unwrap();

    let server = Server::start_in(dir);
    let player = Player::new("Alex");

    assert_eq!(server.gate.record(&player.identity()).failed_attempts(), 0);
    assert!(server.gate.attempt_verify(player.as_ref(), "ABC").is_success());
}
