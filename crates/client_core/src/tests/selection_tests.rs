use super::*;

fn active() -> SelectionCoordinator {
    let mut selection = SelectionCoordinator::default();
    selection.enter_selection_mode();
    selection
}

#[test]
fn item_toggle_under_selected_group_is_a_no_op() {
    let mut selection = active();
    selection.toggle_group(OpeningId(1));
    selection.toggle_item(VariationId(10), OpeningId(1));

    assert!(!selection.is_item_selected(VariationId(10)));
    assert!(is_effectively_selected(VariationId(10), OpeningId(1), &selection));
    assert_eq!(selection.effective_selection_count(), 1);
}

#[test]
fn payload_lists_exactly_the_selected_entities() {
    let mut selection = active();
    selection.toggle_group(OpeningId(2));
    selection.toggle_group(OpeningId(1));
    selection.toggle_item(VariationId(5), OpeningId(3));

    assert_eq!(
        selection.build_delete_payload(),
        BatchDeleteRequest {
            openings: vec![OpeningId(1), OpeningId(2)],
            variations: vec![VariationId(5)],
        }
    );
    assert_eq!(selection.effective_selection_count(), 3);
}

#[test]
fn group_toggle_leaves_item_ids_alone() {
    let mut selection = active();
    selection.toggle_item(VariationId(5), OpeningId(3));
    selection.toggle_group(OpeningId(3));
    assert!(selection.is_item_selected(VariationId(5)));
    selection.toggle_group(OpeningId(3));
    assert!(!selection.is_group_selected(OpeningId(3)));
    assert!(selection.is_item_selected(VariationId(5)));
}

#[test]
fn exiting_clears_both_sets() {
    let mut selection = active();
    selection.toggle_group(OpeningId(1));
    selection.toggle_item(VariationId(9), OpeningId(4));
    selection.exit_selection_mode();

    assert!(!selection.is_active());
    assert_eq!(selection.effective_selection_count(), 0);
    assert!(selection.build_delete_payload().is_empty());
}

#[test]
fn toggles_outside_selection_mode_are_ignored() {
    let mut selection = SelectionCoordinator::default();
    selection.toggle_group(OpeningId(1));
    selection.toggle_item(VariationId(2), OpeningId(3));
    assert_eq!(selection.effective_selection_count(), 0);
}

#[test]
fn dispatch_picks_single_or_batch_delete() {
    let mut selection = active();
    assert_eq!(selection.delete_dispatch(), None);

    selection.toggle_group(OpeningId(1));
    assert_eq!(
        selection.delete_dispatch(),
        Some(DeleteDispatch::Opening(OpeningId(1)))
    );

    selection.toggle_group(OpeningId(1));
    selection.toggle_item(VariationId(4), OpeningId(2));
    assert_eq!(
        selection.delete_dispatch(),
        Some(DeleteDispatch::Variation(VariationId(4)))
    );

    selection.toggle_group(OpeningId(1));
    assert_eq!(
        selection.delete_dispatch(),
        Some(DeleteDispatch::Batch(BatchDeleteRequest {
            openings: vec![OpeningId(1)],
            variations: vec![VariationId(4)],
        }))
    );
}
