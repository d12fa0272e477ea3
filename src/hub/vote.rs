/// Dethrone vote: the single in-flight majority ballot against a
/// coordinator.
///
/// A vote is in progress exactly while the yes side is non-empty; the
/// opener's ballot counts as the first yes. Resolution compares each side
/// against the *current* member count, so the margin needed to win floats
/// as members join and leave while the vote is open.
use std::collections::HashSet;

use tracing::info;

use super::authority::Authority;
use super::error::HubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ballot {
    Yes,
    No,
}

impl Ballot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

/// Result of checking an open vote against the current membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No majority yet (or no vote at all).
    Pending,
    /// Yes side won; the target loses coordinator status.
    Dethroned(String),
    /// No side won; the target keeps coordinator status.
    Reigns(String),
}

/// Strict majority of `members`, using integer halving.
pub const fn is_majority(votes: usize, members: usize) -> bool {
    votes > members / 2
}

#[derive(Debug, Default)]
pub struct VoteSession {
    target: Option<String>,
    yes: HashSet<String>,
    no: HashSet<String>,
}

impl VoteSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_progress(&self) -> bool {
        !self.yes.is_empty()
    }

    /// Target of the running (or last resolved) vote.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn tally(&self, ballot: Ballot) -> usize {
        match ballot {
            Ballot::Yes => self.yes.len(),
            Ballot::No => self.no.len(),
        }
    }

    /// Start a vote against coordinator `target`; `requester` votes yes.
    pub fn open(
        &mut self,
        authority: &Authority,
        requester: &str,
        target: &str,
    ) -> Result<(), HubError> {
        if self.is_in_progress() {
            return Err(HubError::AlreadyInProgress);
        }
        if !authority.is_coordinator(target) {
            return Err(HubError::NotCoordinator);
        }

        self.target = Some(target.to_owned());
        self.no.clear();
        self.yes.insert(requester.to_owned());
        info!(requester, target, "dethrone vote opened");
        Ok(())
    }

    /// Record a ballot. Returns the new count on that side.
    ///
    /// A member may vote once per side; the yes and no sides are tracked
    /// independently.
    pub fn cast(&mut self, voter: &str, ballot: Ballot) -> Result<usize, HubError> {
        if !self.is_in_progress() {
            return Err(HubError::NoActiveVote);
        }
        let side = match ballot {
            Ballot::Yes => &mut self.yes,
            Ballot::No => &mut self.no,
        };
        if !side.insert(voter.to_owned()) {
            return Err(HubError::AlreadyVoted);
        }
        Ok(side.len())
    }

    pub fn cast_yes(&mut self, voter: &str) -> Result<usize, HubError> {
        self.cast(voter, Ballot::Yes)
    }

    pub fn cast_no(&mut self, voter: &str) -> Result<usize, HubError> {
        self.cast(voter, Ballot::No)
    }

    /// Settle the vote if either side holds a strict majority of
    /// `member_count`. Ballots are cleared on resolution.
    pub fn resolve(&mut self, member_count: usize) -> Resolution {
        if !self.is_in_progress() {
            return Resolution::Pending;
        }
        let Some(target) = self.target.clone() else {
            return Resolution::Pending;
        };

        let resolution = if is_majority(self.yes.len(), member_count) {
            Resolution::Dethroned(target)
        } else if is_majority(self.no.len(), member_count) {
            Resolution::Reigns(target)
        } else {
            return Resolution::Pending;
        };

        info!(?resolution, member_count, "dethrone vote resolved");
        self.yes.clear();
        self.no.clear();
        resolution
    }

    /// Remove a departing member's ballots.
    ///
    /// If that empties the yes side the vote is over without a result, and
    /// any remaining no ballots are discarded with it.
    pub fn withdraw(&mut self, name: &str) {
        let was_open = self.is_in_progress();
        self.yes.remove(name);
        self.no.remove(name);
        if was_open && !self.is_in_progress() {
            self.no.clear();
            info!(name, "dethrone vote dissolved, last yes voter left");
        }
    }
}
