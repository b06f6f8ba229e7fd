//! # Partition distributor.
//!
//! For every partition of the [`AssignmentTable`], in ascending order:
//! 1. every assigned member must be live, else [`DistributionError::MissingMembers`];
//! 2. the member count must equal the replication factor, else
//!    [`DistributionError::ReplicationFactorMismatch`];
//! 3. the primary is the unique highest-priority member, or `None` on a tie.

use std::collections::BTreeSet;

use super::assignment::{AssignmentTable, MemberId, MemberPriority, PartitionMetadata};
use crate::error::DistributionError;

/// Distributes partitions of a fixed assignment table over live members.
#[derive(Clone, Debug)]
pub struct PartitionDistributor {
    table: AssignmentTable,
}

impl PartitionDistributor {
    /// Creates a distributor for `table`.
    pub fn new(table: AssignmentTable) -> Self {
        Self { table }
    }

    /// The assignment table.
    pub fn table(&self) -> &AssignmentTable {
        &self.table
    }

    /// Validates the table against `members` and computes per-partition metadata.
    ///
    /// # Errors
    /// The first invalid partition (in ascending order) is reported.
    pub fn distribute_partitions(
        &self,
        members: &[MemberId],
        replication_factor: usize,
    ) -> Result<Vec<PartitionMetadata>, DistributionError> {
        let live: BTreeSet<MemberId> = members.iter().copied().collect();

        self.table
            .partitions()
            .map(|partition| {
                let mut assigned = self.table.members_of(partition);

                let missing: Vec<MemberId> = assigned
                    .iter()
                    .map(|m| m.member)
                    .filter(|m| !live.contains(m))
                    .collect();
                if !missing.is_empty() {
                    return Err(DistributionError::MissingMembers { partition, missing });
                }
                if assigned.len() != replication_factor {
                    return Err(DistributionError::ReplicationFactorMismatch {
                        partition,
                        expected: replication_factor,
                        actual: assigned.len(),
                    });
                }

                assigned.sort_by(|a, b| {
                    b.priority
                        .cmp(&a.priority)
                        .then(a.member.cmp(&b.member))
                });
                let primary = primary_of(&assigned);
                Ok(PartitionMetadata {
                    partition,
                    members: assigned,
                    primary,
                })
            })
            .collect()
    }
}

/// Unique top-priority member of a list sorted by descending priority.
fn primary_of(sorted: &[MemberPriority]) -> Option<MemberId> {
    match sorted {
        [] => None,
        [only] => Some(only.member),
        [first, second, ..] if first.priority > second.priority => Some(first.member),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AssignmentTable {
        AssignmentTable::from_iter([
            (2, 30, 1),
            (2, 10, 3),
            (2, 20, 2),
            (1, 20, 5),
            (1, 10, 5),
            (1, 30, 1),
        ])
    }

    #[test]
    fn test_distribution_is_deterministic_and_ordered() {
        let d = PartitionDistributor::new(table());
        let first = d.distribute_partitions(&[30, 10, 20], 3).unwrap();
        let second = d.distribute_partitions(&[20, 30, 10], 3).unwrap();
        assert_eq!(first, second);

        assert_eq!(
            first.iter().map(|p| p.partition).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(first[1].member_ids().collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(first[1].primary, Some(10));
    }

    #[test]
    fn test_tied_top_priority_leaves_primary_unset() {
        let d = PartitionDistributor::new(table());
        let out = d.distribute_partitions(&[10, 20, 30], 3).unwrap();
        assert_eq!(out[0].primary, None);
        // tie broken by member id for ordering only
        assert_eq!(out[0].member_ids().collect::<Vec<_>>(), vec![10, 20, 30]);
    }

    #[test]
    fn test_missing_members_are_rejected() {
        let d = PartitionDistributor::new(table());
        let err = d.distribute_partitions(&[10, 40], 3).unwrap_err();
        assert_eq!(
            err,
            DistributionError::MissingMembers {
                partition: 1,
                missing: vec![20, 30],
            }
        );
    }

    #[test]
    fn test_replication_mismatch_is_rejected() {
        let d = PartitionDistributor::new(table().assign(3, 10, 1));
        let err = d.distribute_partitions(&[10, 20, 30], 3).unwrap_err();
        assert_eq!(
            err,
            DistributionError::ReplicationFactorMismatch {
                partition: 3,
                expected: 3,
                actual: 1,
            }
        );
    }

    #[test]
    fn test_single_replica_is_primary() {
        let d = PartitionDistributor::new(AssignmentTable::new().assign(7, 1, 0));
        let out = d.distribute_partitions(&[1], 1).unwrap();
        assert_eq!(out[0].primary, Some(1));
    }
}
