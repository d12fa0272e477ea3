/// Coordinator authority: who holds coordinator privilege and who has
/// been voted out of automatic eligibility.
use std::collections::HashSet;

use tracing::info;

use super::error::HubError;
use super::registry::Registry;

/// Outcome of an automatic assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    /// Newly promoted member.
    pub name: String,
    /// Every member had been dethroned, so the dethroned set was cleared
    /// before choosing.
    pub requalified: bool,
}

#[derive(Debug, Default)]
pub struct Authority {
    coordinators: HashSet<String>,
    dethroned: HashSet<String>,
}

impl Authority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_coordinator(&self, name: &str) -> bool {
        self.coordinators.contains(name)
    }

    pub fn is_dethroned(&self, name: &str) -> bool {
        self.dethroned.contains(name)
    }

    pub fn has_coordinator(&self) -> bool {
        !self.coordinators.is_empty()
    }

    /// Promote someone when members exist but nobody coordinates.
    ///
    /// The longest-standing member that is not dethroned wins. If every
    /// member is dethroned the dethroned set is cleared first. Returns
    /// `None` when nothing changed.
    pub fn ensure_coordinator(&mut self, registry: &Registry) -> Option<Promotion> {
        if registry.is_empty() || self.has_coordinator() {
            return None;
        }

        let members = registry.members();
        let requalified = members.iter().all(|m| self.dethroned.contains(&m.name));
        if requalified {
            self.dethroned.clear();
            info!("all members dethroned, eligibility reset");
        }

        let chosen = members
            .iter()
            .find(|m| !self.dethroned.contains(&m.name))?
            .name
            .clone();
        self.coordinators.insert(chosen.clone());
        info!(name = %chosen, "coordinator assigned");

        Some(Promotion {
            name: chosen,
            requalified,
        })
    }

    /// Coordinator `granter` promotes `target`. Dethroned status is not
    /// consulted; the granter keeps their own privilege.
    pub fn grant(
        &mut self,
        registry: &Registry,
        granter: &str,
        target: &str,
    ) -> Result<(), HubError> {
        if !self.is_coordinator(granter) {
            return Err(HubError::Unauthorized);
        }
        if !registry.contains(target) {
            return Err(HubError::TargetNotFound);
        }
        self.coordinators.insert(target.to_owned());
        info!(granter, target, "coordinator granted");
        Ok(())
    }

    /// Strip coordinator status and bar from automatic reassignment.
    pub fn revoke(&mut self, name: &str) {
        self.coordinators.remove(name);
        self.dethroned.insert(name.to_owned());
        info!(name, "coordinator dethroned");
    }

    /// Drop a departing member's privilege. Dethroned status survives.
    pub fn remove_member(&mut self, name: &str) {
        self.coordinators.remove(name);
    }

    /// Current coordinators in join order.
    pub fn coordinators(&self, registry: &Registry) -> Vec<String> {
        registry
            .names()
            .into_iter()
            .filter(|n| self.coordinators.contains(n))
            .collect()
    }

    /// Dethroned names, sorted. May include members who have left.
    pub fn dethroned(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dethroned.iter().cloned().collect();
        names.sort();
        names
    }
}
