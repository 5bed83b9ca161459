//! Line protocol of the console host.
//!
//! One event per line, whitespace separated:
//!
//! ```text
//! connect <uuid> <name> [ip]
//! disconnect <name>
//! chat <name> <text...>
//! move <name> <x> <y> <z> <yaw> <pitch>
//! cmd <name> <args...>
//! op <name>
//! console <args...>
//! tab <name|console> [prefix]
//! save | help | quit
//! ```

use std::net::IpAddr;

use invitegate_core::{Identity, Position};

pub(crate) const HELP: &str = "\
Events:
  connect <uuid> <name> [ip]         a player joins
  disconnect <name>                  a player leaves
  chat <name> <text...>              a player chats
  move <name> <x> <y> <z> <yaw> <pitch>
  cmd <name> <args...>               a player runs /join <args...>
  op <name>                          grant operator
  console <args...>                  the console runs /join <args...>
  tab <name|console> [prefix]        tab-complete /join
  save | help | quit";

#[derive(Debug, PartialEq)]
pub(crate) enum Event<'a> {
    Connect {
        identity: Identity,
        name: &'a str,
        address: Option<IpAddr>,
    },
    Disconnect(&'a str),
    Chat {
        name: &'a str,
        text: String,
    },
    Move {
        name: &'a str,
        to: Position,
    },
    Command {
        name: &'a str,
        args: Vec<&'a str>,
    },
    Op(&'a str),
    Console(Vec<&'a str>),
    Tab {
        who: &'a str,
        prefix: &'a str,
    },
    Save,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> Event<'static> {
    Event::Invalid(message.into())
}

impl<'a> Event<'a> {
    pub(crate) fn parse(line: &'a str) -> Self {
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            [] => Event::Empty,
            ["connect", identity, name, rest @ ..] => {
                let identity = match identity.parse::<Identity>() {
                    Ok(identity) => identity,
                    Err(e) => return invalid(e.to_string()),
                };
                let address = match rest {
                    [] => None,
                    [ip] => match ip.parse::<IpAddr>() {
                        Ok(ip) => Some(ip),
                        Err(_) => return invalid(format!("invalid address: {ip}")),
                    },
                    _ => return invalid("usage: connect <uuid> <name> [ip]"),
                };
                Event::Connect {
                    identity,
                    name: *name,
                    address,
                }
            }
            ["disconnect", name] => Event::Disconnect(*name),
            ["chat", name, text @ ..] if !text.is_empty() => Event::Chat {
                name: *name,
                text: text.join(" "),
            },
            ["move", name, coords @ ..] => match parse_position(coords) {
                Some(to) => Event::Move { name: *name, to },
                None => invalid("usage: move <name> <x> <y> <z> <yaw> <pitch>"),
            },
            ["cmd", name, args @ ..] => Event::Command {
                name: *name,
                args: args.to_vec(),
            },
            ["op", name] => Event::Op(*name),
            ["console", args @ ..] => Event::Console(args.to_vec()),
            ["tab", who] => Event::Tab {
                who: *who,
                prefix: "",
            },
            ["tab", who, prefix] => Event::Tab {
                who: *who,
                prefix: *prefix,
            },
            ["save"] => Event::Save,
            ["help"] => Event::Help,
            ["quit" | "stop"] => Event::Quit,
            [verb, ..] => invalid(format!("unknown or malformed event: {verb} (try help)")),
        }
    }
}

fn parse_position(coords: &[&str]) -> Option<Position> {
    let [x, y, z, yaw, pitch] = coords else {
        return None;
    };
    Some(Position::new(
        x.parse().ok()?,
        y.parse().ok()?,
        z.parse().ok()?,
        yaw.parse().ok()?,
        pitch.parse().ok()?,
    ))
}
