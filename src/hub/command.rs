/// Command dispatch: turns one client line into hub state changes and the
/// lines those changes produce.
use tracing::debug;

use super::error::HubError;
use super::message::ServerLine;
use super::router::{self, Outbound};
use super::state::HubState;
use super::vote::Ballot;

/// Lines broadcast for `/help`, after a bare `System: ` header.
const HELP_LINES: &[&str] = &[
    "* /whisper - sends a private message to a user",
    "* /quit - shuts the client session",
    "* /userlist - list of current users",
    "* /crdntrlist - list of current coordinators",
    "* /dthlist - list of dethroned users",
    "* /serverip - displays the server's ip",
    "* /clientip - displays all the clients' ip -  requires coordinator status",
    "* /bestow - grants coordinator status to a user -  requires coordinator status",
    "* /dethrone - Starts a voting process to dethrone a coordinator",
];

/// A parsed client line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Quit,
    Whisper { recipient: &'a str, body: &'a str },
    Help,
    UserList,
    CoordinatorList,
    DethronedList,
    ServerIp,
    ClientIp,
    Bestow(&'a str),
    Dethrone(&'a str),
    Vote(Ballot),
    Chat(&'a str),
}

/// If `line` starts with `prefix` (ASCII case-insensitive), the remainder.
fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

impl<'a> Command<'a> {
    /// Classify a line by its command prefix.
    ///
    /// Matching is by prefix, so `/yes` counts as `/y` and `/userlists` as
    /// `/userlist`. Anything unrecognized is chat.
    pub fn parse(line: &'a str) -> Self {
        let arg = |prefix: &str| strip_prefix_ignore_case(line, prefix).map(str::trim);

        if arg("/quit").is_some() {
            Self::Quit
        } else if let Some(rest) = strip_prefix_ignore_case(line, "/whisper") {
            let rest = rest.trim_start();
            let (recipient, body) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Self::Whisper {
                recipient,
                body: body.trim_start(),
            }
        } else if arg("/help").is_some() {
            Self::Help
        } else if arg("/userlist").is_some() {
            Self::UserList
        } else if arg("/crdntrlist").is_some() {
            Self::CoordinatorList
        } else if arg("/dthlist").is_some() {
            Self::DethronedList
        } else if arg("/serverip").is_some() {
            Self::ServerIp
        } else if arg("/clientip").is_some() {
            Self::ClientIp
        } else if let Some(target) = arg("/bestow") {
            Self::Bestow(target)
        } else if let Some(target) = arg("/dethrone") {
            Self::Dethrone(target)
        } else if arg("/y").is_some() {
            Self::Vote(Ballot::Yes)
        } else if arg("/n").is_some() {
            Self::Vote(Ballot::No)
        } else {
            Self::Chat(line)
        }
    }

    /// Whether the raw line is echoed to everyone before it takes effect.
    pub fn echoes(&self) -> bool {
        !matches!(self, Self::Quit | Self::Whisper { .. })
    }
}

/// Result of dispatching one line.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub outbound: Vec<Outbound>,
    /// The member asked to end their session.
    pub quit: bool,
}

fn list(names: &[String]) -> String {
    format!("[{}]", names.join(", "))
}

/// Apply one line from member `name`. Call with the hub lock held.
///
/// A coordinator is re-asserted before the line is handled and the open
/// vote is re-checked after it, whatever the command was.
pub fn dispatch(state: &mut HubState, name: &str, line: &str) -> Dispatch {
    let mut out = state.ensure_coordinator();
    let command = Command::parse(line);
    debug!(name, ?command, "dispatch");

    if command == Command::Quit {
        return Dispatch {
            outbound: out,
            quit: true,
        };
    }
    if command.echoes() {
        out.push(Outbound::broadcast(format!("{name}: {line}")));
    }

    match command {
        Command::Quit | Command::Chat(_) => {}

        Command::Whisper { recipient, body } => {
            match router::whisper(&state.registry, name, recipient, body) {
                Ok(lines) => out.extend(lines),
                // Only the sender learns the whisper went nowhere.
                Err(e) => out.push(Outbound::direct(name, ServerLine::system(e))),
            }
        }

        Command::Help => {
            out.push(Outbound::system(""));
            out.extend(HELP_LINES.iter().map(|l| Outbound::broadcast(*l)));
        }

        Command::UserList => {
            out.push(Outbound::system(list(&state.registry.names())));
        }

        Command::CoordinatorList => {
            out.push(Outbound::system(list(
                &state.authority.coordinators(&state.registry),
            )));
        }

        Command::DethronedList => {
            out.push(Outbound::system(list(&state.authority.dethroned())));
        }

        Command::ServerIp => {
            out.push(Outbound::system(&state.server_ip));
        }

        Command::ClientIp => {
            if state.authority.is_coordinator(name) {
                out.push(Outbound::system(list(state.registry.address_log())));
            } else {
                out.push(Outbound::system(HubError::Unauthorized));
            }
        }

        Command::Bestow(target) => {
            match state.authority.grant(&state.registry, name, target) {
                Ok(()) => out.push(Outbound::system(format!("{target} is now the coordinator"))),
                Err(e) => out.push(Outbound::system(e)),
            }
        }

        Command::Dethrone(target) => match state.vote.open(&state.authority, name, target) {
            Ok(()) => {
                let members = state.registry.len();
                let yes = state.vote.tally(Ballot::Yes);
                out.push(Outbound::system(format!(
                    "The voting process to dethrone {target} has started"
                )));
                out.push(Outbound::system("Type /y or /n to cast your vote"));
                out.push(Outbound::system(format!(
                    "{name} has voted yes [{yes}/{members}]"
                )));
            }
            Err(e) => out.push(Outbound::system(e)),
        },

        Command::Vote(ballot) => match state.vote.cast(name, ballot) {
            Ok(count) => {
                let members = state.registry.len();
                out.push(Outbound::system(format!(
                    "{name} has voted {} [{count}/{members}]",
                    ballot.as_str()
                )));
            }
            Err(e) => out.push(Outbound::system(e)),
        },
    }

    out.extend(state.resolve_vote());
    Dispatch {
        outbound: out,
        quit: false,
    }
}
