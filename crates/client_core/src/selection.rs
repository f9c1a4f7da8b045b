use std::collections::BTreeSet;

use shared::{
    domain::{OpeningId, VariationId},
    protocol::BatchDeleteRequest,
};

/// Multi-select state for batch deletion. Selecting an opening implies
/// all of its variations without ever recording them individually.
#[derive(Debug, Clone, Default)]
pub struct SelectionCoordinator {
    active: bool,
    openings: BTreeSet<OpeningId>,
    variations: BTreeSet<VariationId>,
}

/// How a confirmed deletion is sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteDispatch {
    Opening(OpeningId),
    Variation(VariationId),
    Batch(BatchDeleteRequest),
}

impl SelectionCoordinator {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn enter_selection_mode(&mut self) {
        self.active = true;
    }

    pub fn exit_selection_mode(&mut self) {
        self.active = false;
        self.openings.clear();
        self.variations.clear();
    }

    pub fn toggle_group(&mut self, opening_id: OpeningId) {
        if !self.active {
            return;
        }
        if !self.openings.remove(&opening_id) {
            self.openings.insert(opening_id);
        }
    }

    /// No-op while the parent opening is selected.
    pub fn toggle_item(&mut self, variation_id: VariationId, parent: OpeningId) {
        if !self.active || self.openings.contains(&parent) {
            return;
        }
        if !self.variations.remove(&variation_id) {
            self.variations.insert(variation_id);
        }
    }

    pub fn is_group_selected(&self, opening_id: OpeningId) -> bool {
        self.openings.contains(&opening_id)
    }

    pub fn is_item_selected(&self, variation_id: VariationId) -> bool {
        self.variations.contains(&variation_id)
    }

    pub fn effective_selection_count(&self) -> usize {
        self.openings.len() + self.variations.len()
    }

    pub fn build_delete_payload(&self) -> BatchDeleteRequest {
        BatchDeleteRequest {
            openings: self.openings.iter().copied().collect(),
            variations: self.variations.iter().copied().collect(),
        }
    }

    pub fn delete_dispatch(&self) -> Option<DeleteDispatch> {
        match (self.openings.len(), self.variations.len()) {
            (0, 0) => None,
            (1, 0) => self.openings.first().copied().map(DeleteDispatch::Opening),
            (0, 1) => self.variations.first().copied().map(DeleteDispatch::Variation),
            _ => Some(DeleteDispatch::Batch(self.build_delete_payload())),
        }
    }
}

pub fn is_effectively_selected(
    variation_id: VariationId,
    parent: OpeningId,
    selection: &SelectionCoordinator,
) -> bool {
    selection.is_group_selected(parent) || selection.is_item_selected(variation_id)
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
