/// Session registry: who is connected, under which name, from where.
use std::collections::HashMap;

use tokio::sync::mpsc;

use super::error::HubError;
use super::message::ServerLine;

/// Outbound queue of one connected client.
pub type ClientTx = mpsc::UnboundedSender<ServerLine>;

/// A registered, connected participant.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    /// Address the client reported during the handshake.
    pub address: String,
    /// Registration sequence number; lower joined earlier.
    pub joined: u64,
    pub tx: ClientTx,
}

impl Member {
    /// Whether the owning session is still draining this handle.
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Registered members keyed by name, plus the append-only address log.
#[derive(Debug, Default)]
pub struct Registry {
    members: HashMap<String, Member>,
    /// Address of everyone who ever registered. Never pruned.
    address_log: Vec<String>,
    next_seq: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with its send handle.
    ///
    /// Rejects empty (or whitespace-only) names and names already in use.
    /// Callers hold the hub lock, so two sessions can never both win the
    /// same name.
    pub fn register(
        &mut self,
        name: &str,
        address: &str,
        tx: ClientTx,
    ) -> Result<&Member, HubError> {
        if name.trim().is_empty() || self.members.contains_key(name) {
            return Err(HubError::DuplicateOrEmptyName);
        }

        let joined = self.next_seq;
        self.next_seq += 1;
        self.address_log.push(address.to_owned());

        let member = Member {
            name: name.to_owned(),
            address: address.to_owned(),
            joined,
            tx,
        };
        Ok(self.members.entry(name.to_owned()).or_insert(member))
    }

    /// Remove `name`. Returns the member if it was registered.
    pub fn deregister(&mut self, name: &str) -> Option<Member> {
        self.members.remove(name)
    }

    /// True when exactly one member is registered.
    pub fn is_first_member(&self) -> bool {
        self.members.len() == 1
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members ordered by registration, earliest first.
    pub fn members(&self) -> Vec<&Member> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|m| m.joined);
        members
    }

    /// Names ordered by registration, earliest first.
    pub fn names(&self) -> Vec<String> {
        self.members().into_iter().map(|m| m.name.clone()).collect()
    }

    /// Members whose sessions are still receiving, earliest first.
    ///
    /// Handles whose session already went away are skipped here; the entry
    /// itself disappears when that session's teardown deregisters it.
    pub fn live_members(&self) -> Vec<&Member> {
        self.members().into_iter().filter(|m| m.is_live()).collect()
    }

    pub fn address_log(&self) -> &[String] {
        &self.address_log
    }
}
