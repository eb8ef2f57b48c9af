//! Consistent-hash ring with virtual nodes.
//!
//! Each member is placed on a 64-bit circle `virtual_nodes` times; a key is
//! owned by the first point at or after its own hash, wrapping around. Adding
//! or removing a member only moves the keys adjacent to its points.

use std::collections::{BTreeMap, BTreeSet};

/// Address of a ring member (`host:port`).
pub type Member = String;

/// Position of `bytes` on the ring: the first 8 bytes of their blake3 digest.
fn point(bytes: &[u8]) -> u64 {
    let digest = blake3::hash(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_be_bytes(head)
}

/// Ring over a set of members.
#[derive(Debug, Clone)]
pub struct HashRing {
    virtual_nodes: u32,
    points: BTreeMap<u64, Member>,
    members: BTreeSet<Member>,
}

impl HashRing {
    /// Empty ring placing each member `virtual_nodes` times (at least once).
    pub fn new(virtual_nodes: u32) -> Self {
        Self {
            virtual_nodes: virtual_nodes.max(1),
            points: BTreeMap::new(),
            members: BTreeSet::new(),
        }
    }

    /// Ring holding `members`.
    pub fn with_members<I, S>(virtual_nodes: u32, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Member>,
    {
        let mut ring = Self::new(virtual_nodes);
        for member in members {
            ring.add(member.into());
        }
        ring
    }

    /// Place `member` on the ring. Returns `false` if it was already there.
    pub fn add(&mut self, member: Member) -> bool {
        if !self.members.insert(member.clone()) {
            return false;
        }
        self.place(&member);
        true
    }

    /// Remove `member`. Returns `false` if it was not on the ring.
    pub fn remove(&mut self, member: &str) -> bool {
        if !self.members.remove(member) {
            return false;
        }
        self.points.retain(|_, owner| owner != member);
        // Re-place the others in case they lost a collided point.
        let others: Vec<Member> = self.members.iter().cloned().collect();
        for other in &others {
            self.place(other);
        }
        true
    }

    fn place(&mut self, member: &str) {
        for replica in 0..self.virtual_nodes {
            let position = point(format!("{member}#{replica}").as_bytes());
            // On a collision the smallest address keeps the point, whatever the insertion order.
            self.points
                .entry(position)
                .and_modify(|owner| {
                    if member < owner.as_str() {
                        *owner = member.to_string();
                    }
                })
                .or_insert_with(|| member.to_string());
        }
    }

    /// Current members, sorted.
    pub fn members(&self) -> &BTreeSet<Member> {
        &self.members
    }

    /// Whether `member` is on the ring.
    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    /// Member owning `key`, or `None` on an empty ring.
    pub fn owner_of(&self, key: &str) -> Option<&str> {
        let position = point(key.as_bytes());
        self.points
            .range(position..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, member)| member.as_str())
    }
}
