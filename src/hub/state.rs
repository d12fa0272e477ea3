/// Hub state: registry, coordinator authority and the dethrone vote,
/// guarded together by one lock.
///
/// Every mutation goes through a method here and returns the lines it
/// wants sent as [`Outbound`] items. Callers hand them to
/// [`HubState::publish`] before releasing the write guard, so every member
/// sees lines in the order the state changes happened.
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::authority::{Authority, Promotion};
use super::error::HubError;
use super::message::ServerLine;
use super::registry::{ClientTx, Registry};
use super::router::{self, Outbound};
use super::vote::{Resolution, VoteSession};

#[derive(Debug)]
pub struct HubState {
    pub registry: Registry,
    pub authority: Authority,
    pub vote: VoteSession,
    /// Address reported by `/serverip`.
    pub server_ip: String,
}

/// Shared, thread-safe hub state.
pub type SharedState = Arc<RwLock<HubState>>;

impl HubState {
    pub fn new(server_ip: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(),
            authority: Authority::new(),
            vote: VoteSession::new(),
            server_ip: server_ip.into(),
        }
    }

    pub fn shared(server_ip: impl Into<String>) -> SharedState {
        Arc::new(RwLock::new(Self::new(server_ip)))
    }

    /// Register a new member and announce them.
    ///
    /// The new member gets `NAMEACCEPTED` first; then everyone (the
    /// newcomer included) gets the welcome lines, the first-to-join notice
    /// when applicable, and any coordinator promotion.
    pub fn join(
        &mut self,
        name: &str,
        address: &str,
        tx: ClientTx,
    ) -> Result<Vec<Outbound>, HubError> {
        self.registry.register(name, address, tx)?;
        info!(name, address, members = self.registry.len(), "member joined");

        let mut out = vec![
            Outbound::direct(name, ServerLine::NameAccepted(name.to_owned())),
            Outbound::broadcast(format!("Welcome {name}!")),
            Outbound::broadcast("We hope you brought pizza"),
            Outbound::broadcast("Type /help to list down all the commands"),
        ];
        if self.registry.is_first_member() {
            info!(name, "first member to join");
            out.push(Outbound::broadcast(format!("{name} is the first one to join")));
        }
        out.extend(self.ensure_coordinator());
        Ok(out)
    }

    /// Remove a member and settle what their departure changes.
    ///
    /// Idempotent: leaving twice produces nothing the second time.
    pub fn leave(&mut self, name: &str) -> Vec<Outbound> {
        if self.registry.deregister(name).is_none() {
            return Vec::new();
        }
        info!(name, members = self.registry.len(), "member left");

        self.authority.remove_member(name);
        self.vote.withdraw(name);

        let mut out = vec![Outbound::broadcast(format!("{name} has left"))];
        out.extend(self.resolve_vote());
        out.extend(self.ensure_coordinator());
        out
    }

    /// Promote a coordinator if members exist and none holds the role.
    pub fn ensure_coordinator(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        if let Some(Promotion { name, requalified }) =
            self.authority.ensure_coordinator(&self.registry)
        {
            if requalified {
                out.push(Outbound::system(
                    "all users are now requalified to be coordinators",
                ));
            }
            out.push(Outbound::broadcast(format!("{name} is now the coordinator")));
        }
        out
    }

    /// Check the open vote against current membership and apply the result.
    pub fn resolve_vote(&mut self) -> Vec<Outbound> {
        match self.vote.resolve(self.registry.len()) {
            Resolution::Pending => Vec::new(),
            Resolution::Dethroned(target) => {
                self.authority.revoke(&target);
                let mut out = vec![Outbound::system(format!("{target} has been dethroned"))];
                out.extend(self.ensure_coordinator());
                out
            }
            Resolution::Reigns(target) => {
                vec![Outbound::system(format!("{target} reigns for another day"))]
            }
        }
    }

    /// Queue `outbound` on the current members' handles. Call while holding
    /// the write guard. Returns how many lines were queued.
    pub fn publish(&self, outbound: Vec<Outbound>) -> usize {
        router::deliver(router::route(&self.registry, outbound))
    }
}
