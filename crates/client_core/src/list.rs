use std::collections::BTreeSet;

use shared::domain::{Opening, OpeningId, Side, VariationId};

use crate::{
    drag::DragTracker,
    reorder::{move_id, PartitionId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragItem {
    Opening(OpeningId),
    Variation {
        id: VariationId,
        opening_id: OpeningId,
    },
}

/// One independently ordered group of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Side(Side),
    Opening(OpeningId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderCommit {
    pub partition: Partition,
    pub ordered_ids: Vec<i64>,
}

/// Display state of the two-level opening/variation list.
#[derive(Debug, Clone, Default)]
pub struct OrderedHierarchicalList {
    expanded: BTreeSet<OpeningId>,
    drag: DragTracker<DragItem>,
}

impl OrderedHierarchicalList {
    pub fn toggle_expand(&mut self, opening_id: OpeningId) {
        if !self.expanded.remove(&opening_id) {
            self.expanded.insert(opening_id);
        }
    }

    pub fn is_expanded(&self, opening_id: OpeningId) -> bool {
        self.expanded.contains(&opening_id)
    }

    pub fn drag(&self) -> &DragTracker<DragItem> {
        &self.drag
    }

    pub fn press(&mut self, item: DragItem, x: f64, y: f64) -> bool {
        self.drag.press(item, x, y)
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) -> bool {
        self.drag.pointer_moved(x, y)
    }

    pub fn begin_drag(&mut self, item: DragItem) -> bool {
        self.drag.start(item)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /// Drops the active drag onto `over`.
    ///
    /// Openings only reorder within their side, variations only within
    /// their parent. Everything else, including drops while selecting or
    /// without edit rights, ends the drag without a commit.
    pub fn complete_drag(
        &mut self,
        openings: &[Opening],
        over: DragItem,
        selection_active: bool,
        can_drag: bool,
    ) -> Option<ReorderCommit> {
        let dragged = self.drag.release()?;
        if selection_active || !can_drag {
            return None;
        }

        match (dragged, over) {
            (DragItem::Opening(source), DragItem::Opening(target)) => {
                let side = openings.iter().find(|o| o.id == source)?.side;
                let ids: Vec<OpeningId> = openings_for_side(openings, side)
                    .iter()
                    .map(|o| o.id)
                    .collect();
                let ordered = move_id(&ids, source, target)?;
                Some(ReorderCommit {
                    partition: Partition::Side(side),
                    ordered_ids: ordered.into_iter().map(PartitionId::raw).collect(),
                })
            }
            (
                DragItem::Variation {
                    id: source,
                    opening_id,
                },
                DragItem::Variation {
                    id: target,
                    opening_id: target_parent,
                },
            ) if opening_id == target_parent => {
                let parent = openings.iter().find(|o| o.id == opening_id)?;
                let ordered = move_id(&sorted_variation_ids(parent), source, target)?;
                Some(ReorderCommit {
                    partition: Partition::Opening(opening_id),
                    ordered_ids: ordered.into_iter().map(PartitionId::raw).collect(),
                })
            }
            _ => None,
        }
    }
}

/// Openings of one side in display order. Pure; the view mode only decides
/// which sides are rendered.
pub fn openings_for_side(openings: &[Opening], side: Side) -> Vec<&Opening> {
    let mut matching: Vec<&Opening> = openings.iter().filter(|o| o.side == side).collect();
    matching.sort_by_key(|o| (o.position, o.id));
    matching
}

pub fn sorted_variation_ids(opening: &Opening) -> Vec<VariationId> {
    let mut variations: Vec<_> = opening.variations.iter().collect();
    variations.sort_by_key(|v| (v.position, v.id));
    variations.into_iter().map(|v| v.id).collect()
}

/// Writes `ordered_ids` back into the snapshot as dense positions.
pub fn apply_order(openings: &mut [Opening], partition: Partition, ordered_ids: &[i64]) {
    let index_of = |raw: i64| ordered_ids.iter().position(|id| *id == raw);
    match partition {
        Partition::Side(side) => {
            for opening in openings.iter_mut().filter(|o| o.side == side) {
                if let Some(index) = index_of(opening.id.0) {
                    opening.position = index as i64;
                }
            }
        }
        Partition::Opening(opening_id) => {
            if let Some(opening) = openings.iter_mut().find(|o| o.id == opening_id) {
                for variation in opening.variations.iter_mut() {
                    if let Some(index) = index_of(variation.id.0) {
                        variation.position = index as i64;
                    }
                }
                opening.variations.sort_by_key(|v| (v.position, v.id));
            }
        }
    }
}

/// Current order of a partition, as raw ids.
pub fn partition_order(openings: &[Opening], partition: Partition) -> Vec<i64> {
    match partition {
        Partition::Side(side) => openings_for_side(openings, side)
            .iter()
            .map(|o| o.id.0)
            .collect(),
        Partition::Opening(opening_id) => openings
            .iter()
            .find(|o| o.id == opening_id)
            .map(|o| sorted_variation_ids(o).into_iter().map(|id| id.0).collect())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
