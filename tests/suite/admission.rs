//! Connect, verify and punish through the public gate API.

use invitegate_core::{
    CommandSender, EntitySession, MoveDecision, Position, PunishmentPolicy, VerifyOutcome,
    messages,
};

use crate::common::{Player, STANDARD_CONFIG, Server};

#[test]
fn three_wrong_codes_kick_with_configured_message() {
    let server = Server::start(STANDARD_CONFIG);
    let player = Player::new("Alex");
    server.gate.on_connect(player.clone());
    let sender = CommandSender::entity(player.clone());

    server.gate.handle_command(&sender, &["nope"]);
    assert_eq!(player.last_message(), Some(messages::invalid_code(1, 3)));
    server.gate.handle_command(&sender, &["nope"]);
    assert_eq!(player.last_message(), Some(messages::invalid_code(2, 3)));
    server.gate.handle_command(&sender, &["nope"]);

    assert_eq!(
        player.terminated_with().as_deref(),
        Some("\u{a7}cYou must use /join <code> to play!")
    );
    assert_eq!(server.gate.record(&player.identity()).failed_attempts(), 3);
    let state = server.state_file();
    assert!(state.contains("failed-attempts"));
    assert!(state.contains(&player.identity().to_string()));
}

#[test]
fn correct_code_first_try_verifies_and_persists() {
    let server = Server::start(STANDARD_CONFIG);
    let player = Player::new("Alex");
    server.gate.on_connect(player.clone());

    server
        .gate
        .handle_command(&CommandSender::entity(player.clone()), &["WELCOME"]);

    assert_eq!(player.last_message().as_deref(), Some(messages::VERIFIED));
    assert!(server.gate.is_verified(&player.identity()));
    assert!(server.state_file().contains(&player.identity().to_string()));
    assert!(player.terminated_with().is_none());
}

#[test]
fn codes_are_case_sensitive() {
    let server = Server::start(STANDARD_CONFIG);
    let player = Player::new("Alex");

    let outcome = server.gate.attempt_verify(player.as_ref(), "abc");

    assert_eq!(
        outcome,
        VerifyOutcome::Failure {
            attempts: 1,
            max_attempts: 3
        }
    );
}

#[test]
fn unverified_player_cannot_chat_or_walk_but_can_look() {
    let server = Server::start(STANDARD_CONFIG);
    let player = Player::new("Alex");
    server.gate.on_connect(player.clone());

    assert!(!server.gate.on_chat(player.as_ref()));
    assert_eq!(player.last_message().as_deref(), Some(messages::CHAT_DENIED));

    let from = Position::new(0.0, 64.0, 0.0, 0.0, 0.0);
    let walk = Position::new(3.0, 64.0, 0.0, 45.0, 10.0);
    let look = Position::new(0.0, 64.0, 0.0, 180.0, -20.0);
    assert_eq!(
        server.gate.on_move(&player.identity(), &from, &walk),
        MoveDecision::Redirect(Position::new(0.0, 64.0, 0.0, 45.0, 10.0))
    );
    assert_eq!(
        server.gate.on_move(&player.identity(), &from, &look),
        MoveDecision::Allow
    );

    server.gate.attempt_verify(player.as_ref(), "ABC");
    assert!(server.gate.on_chat(player.as_ref()));
    assert_eq!(
        server.gate.on_move(&player.identity(), &from, &walk),
        MoveDecision::Allow
    );
}

#[test]
fn ban_ip_without_address_degrades_to_kick() {
    let server = Server::start(&STANDARD_CONFIG.replace("punishment: kick", "punishment: ban-ip"));
    let player = Player::new("Alex");

    for _ in 0..2 {
        server.gate.attempt_verify(player.as_ref(), "nope");
    }
    let outcome = server.gate.attempt_verify(player.as_ref(), "nope");

    assert_eq!(
        outcome,
        VerifyOutcome::Punished {
            policy: PunishmentPolicy::Kick,
            attempts: 3
        }
    );
    assert!(server.bans.addresses.lock().unwrap().is_empty());
    assert_eq!(
        player.terminated_with().as_deref(),
        Some("\u{a7}cYou must use /join <code> to play!")
    );
}

#[test]
fn ban_ip_with_address_records_the_address() {
    let server = Server::start(&STANDARD_CONFIG.replace("punishment: kick", "punishment: ban-ip"));
    let player = Player::with_address("Alex", "192.0.2.9");

    for _ in 0..3 {
        server.gate.attempt_verify(player.as_ref(), "nope");
    }

    assert_eq!(
        *server.bans.addresses.lock().unwrap(),
        vec!["192.0.2.9".parse::<std::net::IpAddr>().unwrap()]
    );
    assert_eq!(player.terminated_with().as_deref(), Some("\u{a7}cBanned."));
}

#[test]
fn attempts_carry_over_to_the_next_connection() {
    let server = Server::start(STANDARD_CONFIG);
    let first = Player::new("Alex");
    server.gate.on_connect(first.clone());
    server.gate.attempt_verify(first.as_ref(), "nope");
    server.gate.attempt_verify(first.as_ref(), "nope");
    first.leave();

    let second = first.rejoin();
    server.gate.on_connect(second.clone());
    let outcome = server.gate.attempt_verify(second.as_ref(), "nope");

    assert!(matches!(outcome, VerifyOutcome::Punished { attempts: 3, .. }));
    assert!(!second.is_live());
}
