//! Move-based reordering of one partition.

use shared::{
    domain::{OpeningId, VariationId},
    protocol::PositionAssignment,
};

/// Ids that can be renumbered inside a partition.
pub trait PartitionId: Copy + Eq {
    fn raw(self) -> i64;
}

impl PartitionId for OpeningId {
    fn raw(self) -> i64 {
        self.0
    }
}

impl PartitionId for VariationId {
    fn raw(self) -> i64 {
        self.0
    }
}

impl PartitionId for i64 {
    fn raw(self) -> i64 {
        self
    }
}

/// Removes `source` and reinserts it at the index `target` occupied.
///
/// Returns `None` when either id is missing or both are the same.
pub fn move_id<T: PartitionId>(ids: &[T], source: T, target: T) -> Option<Vec<T>> {
    if source == target {
        return None;
    }
    let from = ids.iter().position(|id| *id == source)?;
    let to = ids.iter().position(|id| *id == target)?;

    let mut ordered = ids.to_vec();
    let moved = ordered.remove(from);
    ordered.insert(to, moved);
    Some(ordered)
}

/// Dense `0..n-1` positions for the given order.
pub fn dense_positions<T: PartitionId>(ordered_ids: &[T]) -> Vec<PositionAssignment> {
    ordered_ids
        .iter()
        .zip(0_i64..)
        .map(|(id, position)| PositionAssignment {
            id: id.raw(),
            position,
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/reorder_tests.rs"]
mod tests;
