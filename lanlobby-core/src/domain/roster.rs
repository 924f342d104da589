use crate::domain::{Member, MemberId};
use std::net::IpAddr;

/// Authoritative member table, kept in join order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    /// Members in the order they joined
    members: Vec<Member>,

    /// Upper bound on `members.len()`
    max_members: usize,
}

/// Errors that can occur in roster operations
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("Roster is full (max {max} members)")]
    Full { max: usize },

    #[error("Member already in roster: {0}")]
    DuplicateMember(MemberId),

    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),
}

impl Roster {
    pub fn new(max_members: usize) -> Self {
        Self {
            members: Vec::new(),
            max_members,
        }
    }

    // ===== Queries =====

    pub fn max_members(&self) -> usize {
        self.max_members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_members
    }

    /// All members in join order
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn get(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id() == id)
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    // ===== Mutation (host only) =====

    /// Append a newly connected peer, unnamed and with zero RTT
    pub fn admit(&mut self, id: MemberId, address: IpAddr) -> Result<&Member, RosterError> {
        if self.contains(id) {
            return Err(RosterError::DuplicateMember(id));
        }

        if self.is_full() {
            return Err(RosterError::Full {
                max: self.max_members,
            });
        }

        self.members.push(Member::new(id, address));
        tracing::debug!(member = %id, size = self.members.len(), "member admitted");

        // Just pushed
        Ok(&self.members[self.members.len() - 1])
    }

    /// Complete the name handshake for a member
    pub fn assign_name(&mut self, id: MemberId, display_name: &str) -> Result<(), RosterError> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or(RosterError::MemberNotFound(id))?;

        member.set_display_name(display_name.to_string());
        Ok(())
    }

    /// Store a fresh latency measurement; returns false if the member is gone
    pub fn record_rtt(&mut self, id: MemberId, millis: u32) -> bool {
        match self.members.iter_mut().find(|m| m.id() == id) {
            Some(member) => {
                member.set_rtt_millis(millis);
                true
            }
            None => false,
        }
    }

    /// Remove a member by identifier, preserving the order of the others
    pub fn remove(&mut self, id: MemberId) -> Option<Member> {
        let index = self.members.iter().position(|m| m.id() == id)?;
        Some(self.members.remove(index))
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}
