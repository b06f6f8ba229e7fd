//! Partition-to-member assignment.
//!
//! - [`AssignmentTable`]: fixed, externally supplied `partition → [(member, priority)]`;
//! - [`PartitionDistributor`]: validates the table against the live members and
//!   picks each partition's primary;
//! - [`plan_rebalance`]: minimal ordered join/primary/leave operations between two
//!   distributions.
//!
//! Everything here is deterministic: ordered maps throughout, ties never resolved
//! by guessing.

mod assignment;
mod distributor;
mod rebalance;

pub use assignment::{AssignmentTable, MemberId, MemberPriority, PartitionId, PartitionMetadata};
pub use distributor::PartitionDistributor;
pub use rebalance::{RebalanceOperation, plan_rebalance};
