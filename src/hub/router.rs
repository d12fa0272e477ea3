/// Broadcast router: plans deliveries under the hub lock and sends them
/// after it is released.
///
/// Hub operations return [`Outbound`] items naming *who* should get a line.
/// [`route`] turns them into a snapshot of `(handle, line)` pairs while the
/// lock is held; [`deliver`] pushes that snapshot into the client queues
/// once the lock is gone.
use tracing::debug;

use super::error::HubError;
use super::message::ServerLine;
use super::registry::{ClientTx, Registry};

/// Who a planned line is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every live member.
    All,
    /// Exactly one member, by name.
    Only(String),
}

/// A line waiting to be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: Recipients,
    pub line: ServerLine,
}

impl Outbound {
    /// `MESSAGE <text>` to everyone.
    pub fn broadcast(text: impl Into<String>) -> Self {
        Self {
            to: Recipients::All,
            line: ServerLine::message(text),
        }
    }

    /// `MESSAGE System: <body>` to everyone.
    pub fn system(body: impl std::fmt::Display) -> Self {
        Self {
            to: Recipients::All,
            line: ServerLine::system(body),
        }
    }

    /// Any line to one member.
    pub fn direct(name: impl Into<String>, line: ServerLine) -> Self {
        Self {
            to: Recipients::Only(name.into()),
            line,
        }
    }
}

/// A routed line bound to a concrete client queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: String,
    pub tx: ClientTx,
    pub line: ServerLine,
}

/// Private message from `sender` to `recipient`.
///
/// The recipient sees `Whisper from {sender}: {body}` and the sender sees
/// `Whispered to {recipient}: {body}`. Nobody else sees anything.
pub fn whisper(
    registry: &Registry,
    sender: &str,
    recipient: &str,
    body: &str,
) -> Result<Vec<Outbound>, HubError> {
    if !registry.contains(recipient) {
        return Err(HubError::RecipientNotFound);
    }
    Ok(vec![
        Outbound::direct(
            recipient,
            ServerLine::message(format!("Whisper from {sender}: {body}")),
        ),
        Outbound::direct(
            sender,
            ServerLine::message(format!("Whispered to {recipient}: {body}")),
        ),
    ])
}

/// Resolve planned lines against the current registry. Call with the hub
/// lock held.
///
/// Lines for members that are gone, or whose session stopped receiving,
/// are dropped here.
pub fn route(registry: &Registry, outbound: Vec<Outbound>) -> Vec<Delivery> {
    let mut batch = Vec::new();
    for Outbound { to, line } in outbound {
        match to {
            Recipients::All => {
                for member in registry.live_members() {
                    batch.push(Delivery {
                        recipient: member.name.clone(),
                        tx: member.tx.clone(),
                        line: line.clone(),
                    });
                }
            }
            Recipients::Only(name) => match registry.get(&name) {
                Some(member) if member.is_live() => batch.push(Delivery {
                    recipient: name,
                    tx: member.tx.clone(),
                    line,
                }),
                _ => debug!(recipient = %name, "dropping line for absent member"),
            },
        }
    }
    batch
}

/// Push routed lines into client queues. Returns how many were accepted.
///
/// A queue that closed after routing is skipped without affecting the
/// rest of the batch.
pub fn deliver(batch: Vec<Delivery>) -> usize {
    let mut sent = 0;
    for Delivery { recipient, tx, line } in batch {
        if tx.send(line).is_ok() {
            sent += 1;
        } else {
            debug!(%recipient, "session closed before delivery");
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn registry(
        names: &[&str],
    ) -> (Registry, Vec<mpsc::UnboundedReceiver<ServerLine>>) {
        let mut reg = Registry::new();
        let mut receivers = Vec::new();
        for name in names {
            let (tx, rx) = mpsc::unbounded_channel();
            reg.register(name, "127.0.0.1", tx).unwrap();
            receivers.push(rx);
        }
        (reg, receivers)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerLine>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line.to_wire());
        }
        lines
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let (reg, mut rxs) = registry(&["alice", "bob", "carol"]);
        let sent = deliver(route(&reg, vec![Outbound::broadcast("alice: hi")]));
        assert_eq!(sent, 3);
        for rx in &mut rxs {
            assert_eq!(drain(rx), vec!["MESSAGE alice: hi"]);
        }
    }

    #[test]
    fn broadcast_skips_stale_handle() {
        let (reg, mut rxs) = registry(&["alice", "bob", "carol"]);
        let bob = rxs.remove(1);
        drop(bob);

        let sent = deliver(route(&reg, vec![Outbound::system("hello")]));
        assert_eq!(sent, 2);
        assert_eq!(drain(&mut rxs[0]), vec!["MESSAGE System: hello"]);
        assert_eq!(drain(&mut rxs[1]), vec!["MESSAGE System: hello"]);
    }

    #[test]
    fn handle_closed_after_routing_does_not_abort_batch() {
        let (reg, mut rxs) = registry(&["alice", "bob"]);
        let batch = route(&reg, vec![Outbound::broadcast("x")]);
        let alice = rxs.remove(0);
        drop(alice);

        assert_eq!(deliver(batch), 1);
        assert_eq!(drain(&mut rxs[0]), vec!["MESSAGE x"]);
    }

    #[test]
    fn whisper_reaches_only_sender_and_recipient() {
        let (reg, mut rxs) = registry(&["bob", "carol", "dave"]);
        let out = whisper(&reg, "dave", "carol", "hello").unwrap();
        assert_eq!(deliver(route(&reg, out)), 2);

        assert!(drain(&mut rxs[0]).is_empty());
        assert_eq!(drain(&mut rxs[1]), vec!["MESSAGE Whisper from dave: hello"]);
        assert_eq!(drain(&mut rxs[2]), vec!["MESSAGE Whispered to carol: hello"]);
    }

    #[test]
    fn whisper_to_unknown_recipient() {
        let (reg, _rxs) = registry(&["dave"]);
        assert_eq!(
            whisper(&reg, "dave", "nobody", "hello"),
            Err(HubError::RecipientNotFound)
        );
    }

    #[test]
    fn direct_to_absent_member_is_dropped() {
        let (reg, _rxs) = registry(&["alice"]);
        let batch = route(
            &reg,
            vec![Outbound::direct("ghost", ServerLine::message("boo"))],
        );
        assert!(batch.is_empty());
    }

    #[test]
    fn routing_preserves_order_per_member() {
        let (reg, mut rxs) = registry(&["alice"]);
        let out = vec![
            Outbound::direct("alice", ServerLine::NameAccepted("alice".into())),
            Outbound::broadcast("Welcome alice!"),
        ];
        deliver(route(&reg, out));
        assert_eq!(
            drain(&mut rxs[0]),
            vec!["NAMEACCEPTED alice", "MESSAGE Welcome alice!"]
        );
    }
}
