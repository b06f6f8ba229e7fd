//! # Partition assignment table.
//!
//! Externally supplied `partition → [(member, priority)]` mapping and the
//! per-partition metadata a distribution produces from it.

use std::collections::BTreeMap;

/// Cluster member identifier.
pub type MemberId = u32;

/// Partition identifier.
pub type PartitionId = u32;

/// A member assigned to a partition with its priority (higher wins).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberPriority {
    /// Assigned member.
    pub member: MemberId,
    /// Priority for becoming primary.
    pub priority: u32,
}

/// Fixed assignment of members (with priorities) to partitions.
///
/// # Example
/// ```
/// use streamvisor::AssignmentTable;
///
/// let table = AssignmentTable::new()
///     .assign(1, 10, 3)
///     .assign(1, 11, 1)
///     .assign(2, 11, 2);
///
/// assert_eq!(table.partitions().collect::<Vec<_>>(), vec![1, 2]);
/// assert_eq!(table.members_of(1).len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssignmentTable {
    partitions: BTreeMap<PartitionId, BTreeMap<MemberId, u32>>,
}

impl AssignmentTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `member` to `partition`; a repeated assignment replaces the priority.
    pub fn assign(mut self, partition: PartitionId, member: MemberId, priority: u32) -> Self {
        self.insert(partition, member, priority);
        self
    }

    /// In-place form of [`assign`](Self::assign).
    pub fn insert(&mut self, partition: PartitionId, member: MemberId, priority: u32) {
        self.partitions
            .entry(partition)
            .or_default()
            .insert(member, priority);
    }

    /// Partition ids in ascending order.
    pub fn partitions(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.partitions.keys().copied()
    }

    /// Members of `partition` in ascending member order.
    pub fn members_of(&self, partition: PartitionId) -> Vec<MemberPriority> {
        self.partitions
            .get(&partition)
            .map(|members| {
                members
                    .iter()
                    .map(|(&member, &priority)| MemberPriority { member, priority })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// True if no partition is assigned.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

impl FromIterator<(PartitionId, MemberId, u32)> for AssignmentTable {
    fn from_iter<I: IntoIterator<Item = (PartitionId, MemberId, u32)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (partition, member, priority) in iter {
            table.insert(partition, member, priority);
        }
        table
    }
}

/// Distribution result for one partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionMetadata {
    /// Partition id.
    pub partition: PartitionId,
    /// Replicas ordered by descending priority, then ascending member id.
    pub members: Vec<MemberPriority>,
    /// Unique top-priority member; `None` when the top priority is shared.
    pub primary: Option<MemberId>,
}

impl PartitionMetadata {
    /// Member ids in replica order.
    pub fn member_ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.members.iter().map(|m| m.member)
    }

    /// True if `member` replicates this partition.
    pub fn contains(&self, member: MemberId) -> bool {
        self.members.iter().any(|m| m.member == member)
    }

    /// Priority of `member`, if it replicates this partition.
    pub fn priority_of(&self, member: MemberId) -> Option<u32> {
        self.members
            .iter()
            .find(|m| m.member == member)
            .map(|m| m.priority)
    }
}
