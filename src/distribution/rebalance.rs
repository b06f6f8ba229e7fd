//! # Rebalance planning.
//!
//! Turns two distributions into the minimal ordered list of operations that moves
//! the cluster from the old one to the new one:
//!
//! ```text
//! for partition in ascending order:
//!     Join          for members only in new     (ascending member)
//!     BecomePrimary if new primary is set and differs from old
//!     Leave         for members only in old     (ascending member)
//! ```
//!
//! Members present in both with the same role produce nothing. A primary that
//! becomes unset (tie) produces no operation.

use std::collections::{BTreeMap, BTreeSet};

use super::assignment::{MemberId, PartitionId, PartitionMetadata};

/// One step of a rebalance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RebalanceOperation {
    /// `member` starts replicating `partition`.
    Join {
        /// Partition id.
        partition: PartitionId,
        /// Joining member.
        member: MemberId,
    },
    /// `member` becomes primary of `partition`.
    BecomePrimary {
        /// Partition id.
        partition: PartitionId,
        /// New primary.
        member: MemberId,
    },
    /// `member` stops replicating `partition`.
    Leave {
        /// Partition id.
        partition: PartitionId,
        /// Leaving member.
        member: MemberId,
    },
}

impl RebalanceOperation {
    /// Partition the operation applies to.
    pub fn partition(&self) -> PartitionId {
        match *self {
            RebalanceOperation::Join { partition, .. }
            | RebalanceOperation::BecomePrimary { partition, .. }
            | RebalanceOperation::Leave { partition, .. } => partition,
        }
    }
}

/// Plans the operations that move `old` to `new`.
///
/// # Example
/// ```
/// use streamvisor::{MemberPriority, PartitionMetadata, RebalanceOperation, plan_rebalance};
///
/// let replica = |member, priority| MemberPriority { member, priority };
/// let old = vec![PartitionMetadata { partition: 1, members: vec![replica(1, 2), replica(2, 1)], primary: Some(1) }];
/// let new = vec![PartitionMetadata { partition: 1, members: vec![replica(3, 2), replica(2, 1)], primary: Some(3) }];
///
/// assert_eq!(
///     plan_rebalance(&old, &new),
///     vec![
///         RebalanceOperation::Join { partition: 1, member: 3 },
///         RebalanceOperation::BecomePrimary { partition: 1, member: 3 },
///         RebalanceOperation::Leave { partition: 1, member: 1 },
///     ]
/// );
/// ```
pub fn plan_rebalance(
    old: &[PartitionMetadata],
    new: &[PartitionMetadata],
) -> Vec<RebalanceOperation> {
    let old = index(old);
    let new = index(new);
    let partitions: BTreeSet<PartitionId> = old.keys().chain(new.keys()).copied().collect();

    let mut ops = Vec::new();
    for partition in partitions {
        let (old_members, old_primary) = members(old.get(&partition).copied());
        let (new_members, new_primary) = members(new.get(&partition).copied());

        ops.extend(
            new_members
                .difference(&old_members)
                .map(|&member| RebalanceOperation::Join { partition, member }),
        );
        if let Some(member) = new_primary {
            if old_primary != Some(member) {
                ops.push(RebalanceOperation::BecomePrimary { partition, member });
            }
        }
        ops.extend(
            old_members
                .difference(&new_members)
                .map(|&member| RebalanceOperation::Leave { partition, member }),
        );
    }
    ops
}

fn index(list: &[PartitionMetadata]) -> BTreeMap<PartitionId, &PartitionMetadata> {
    list.iter().map(|p| (p.partition, p)).collect()
}

fn members(meta: Option<&PartitionMetadata>) -> (BTreeSet<MemberId>, Option<MemberId>) {
    match meta {
        Some(meta) => (meta.member_ids().collect(), meta.primary),
        None => (BTreeSet::new(), None),
    }
}
