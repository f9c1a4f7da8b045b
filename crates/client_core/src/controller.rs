//! View state of the repertoire page and the intents it dispatches.

use std::collections::HashMap;

use shared::{
    domain::{Opening, OpeningId, Side, VariationId},
    protocol::{
        ListScope, OpeningsQuery, ReorderOpeningsRequest, ReorderVariationsRequest, VariationForm,
    },
};
use tracing::{debug, info, warn};

use crate::{
    api::{ApiFailure, RepertoireApi},
    drag::DragState,
    error::UiError,
    list::{
        apply_order, openings_for_side, partition_order, DragItem, OrderedHierarchicalList,
        Partition, ReorderCommit,
    },
    reorder::dense_positions,
    selection::{DeleteDispatch, SelectionCoordinator},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerMode {
    /// Signed in and looking at one's own repertoire.
    Owner,
    /// Browsing the public repertoire; edits need the admin password.
    Guest { admin_unlocked: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Split,
    Single(Side),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    AdminPasswordRequired,
    AwaitingConfirmation,
    /// Validation or backend failure; the banner holds the message.
    Rejected,
    Ignored,
}

/// A mutating intent parked until the admin password is entered.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    CreateOpening(VariationForm),
    EditVariation(VariationId, VariationForm),
    RenameOpening(OpeningId, String),
    ToggleFavorite(OpeningId),
    Delete(DeleteDispatch),
    Reorder(ReorderCommit),
}

/// Handle for one optimistic reorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderTicket {
    pub partition: Partition,
    pub generation: u64,
    snapshot: Vec<i64>,
}

pub struct RepertoireController<A: RepertoireApi> {
    api: A,
    viewer: ViewerMode,
    view_mode: ViewMode,
    favorites_only: bool,
    openings: Vec<Opening>,
    list: OrderedHierarchicalList,
    selection: SelectionCoordinator,
    banner: Option<UiError>,
    notice: Option<String>,
    pending_action: Option<PendingAction>,
    pending_delete: Option<DeleteDispatch>,
    generations: HashMap<Partition, u64>,
}

impl<A: RepertoireApi> RepertoireController<A> {
    pub fn new(api: A, viewer: ViewerMode) -> Self {
        Self {
            api,
            viewer,
            view_mode: ViewMode::Split,
            favorites_only: false,
            openings: Vec::new(),
            list: OrderedHierarchicalList::default(),
            selection: SelectionCoordinator::default(),
            banner: None,
            notice: None,
            pending_action: None,
            pending_delete: None,
            generations: HashMap::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn openings(&self) -> &[Opening] {
        &self.openings
    }

    pub fn opening(&self, opening_id: OpeningId) -> Option<&Opening> {
        self.openings.iter().find(|o| o.id == opening_id)
    }

    pub fn viewer(&self) -> ViewerMode {
        self.viewer
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn favorites_only(&self) -> bool {
        self.favorites_only
    }

    pub fn list(&self) -> &OrderedHierarchicalList {
        &self.list
    }

    pub fn selection(&self) -> &SelectionCoordinator {
        &self.selection
    }

    pub fn banner(&self) -> Option<&UiError> {
        self.banner.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending_action.as_ref()
    }

    pub fn pending_delete(&self) -> Option<&DeleteDispatch> {
        self.pending_delete.as_ref()
    }

    pub fn can_mutate(&self) -> bool {
        match self.viewer {
            ViewerMode::Owner => true,
            ViewerMode::Guest { admin_unlocked } => admin_unlocked,
        }
    }

    pub fn can_drag(&self) -> bool {
        self.can_mutate() && !self.selection.is_active()
    }

    /// The favorites view holds only part of each side, so openings stay
    /// put there; variations always carry their full sibling list.
    pub fn can_drag_item(&self, item: DragItem) -> bool {
        self.can_drag() && !(self.favorites_only && matches!(item, DragItem::Opening(_)))
    }

    pub fn visible_sides(&self) -> Vec<Side> {
        match self.view_mode {
            ViewMode::Split => Side::ALL.to_vec(),
            ViewMode::Single(side) => vec![side],
        }
    }

    pub fn openings_for_side(&self, side: Side) -> Vec<&Opening> {
        openings_for_side(&self.openings, side)
    }

    /// Replaces the snapshot with a fresh listing. Failures keep the stale
    /// snapshot.
    pub async fn refresh(&mut self) {
        let query = OpeningsQuery {
            mode: match self.viewer {
                ViewerMode::Owner => ListScope::Private,
                ViewerMode::Guest { .. } => ListScope::Public,
            },
            favorites: self.favorites_only,
        };
        match self.api.list_openings(query).await {
            Ok(openings) => self.openings = openings,
            Err(error) => warn!(%error, "failed to fetch openings; keeping previous list"),
        }
    }

    pub fn toggle_expand(&mut self, opening_id: OpeningId) {
        self.list.toggle_expand(opening_id);
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
    }

    pub async fn set_favorites_only(&mut self, favorites_only: bool) {
        if self.favorites_only != favorites_only {
            self.list.cancel_drag();
            self.favorites_only = favorites_only;
            self.refresh().await;
        }
    }

    pub fn enter_selection_mode(&mut self) {
        self.list.cancel_drag();
        self.selection.enter_selection_mode();
    }

    pub fn exit_selection_mode(&mut self) {
        self.selection.exit_selection_mode();
    }

    pub fn toggle_group_selection(&mut self, opening_id: OpeningId) {
        self.selection.toggle_group(opening_id);
    }

    pub fn toggle_item_selection(&mut self, variation_id: VariationId) {
        let parent = self
            .openings
            .iter()
            .find(|o| o.variation(variation_id).is_some())
            .map(|o| o.id);
        if let Some(parent) = parent {
            self.selection.toggle_item(variation_id, parent);
        }
    }

    pub fn dismiss_error(&mut self) {
        self.banner = None;
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn request_delete_opening(&mut self, opening_id: OpeningId) -> ActionOutcome {
        self.request_delete(DeleteDispatch::Opening(opening_id))
    }

    pub fn request_delete_variation(&mut self, variation_id: VariationId) -> ActionOutcome {
        self.request_delete(DeleteDispatch::Variation(variation_id))
    }

    pub fn request_batch_delete(&mut self) -> ActionOutcome {
        match self.selection.delete_dispatch() {
            Some(dispatch) => self.request_delete(dispatch),
            None => ActionOutcome::Ignored,
        }
    }

    fn request_delete(&mut self, dispatch: DeleteDispatch) -> ActionOutcome {
        if let Some(outcome) = self.gate(PendingAction::Delete(dispatch.clone())) {
            return outcome;
        }
        self.pending_delete = Some(dispatch);
        ActionOutcome::AwaitingConfirmation
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub async fn confirm_delete(&mut self) -> ActionOutcome {
        let Some(dispatch) = self.pending_delete.take() else {
            return ActionOutcome::Ignored;
        };
        debug!(?dispatch, "dispatching delete");
        let result = match &dispatch {
            DeleteDispatch::Opening(opening_id) => self.api.delete_opening(*opening_id).await,
            DeleteDispatch::Variation(variation_id) => {
                self.api.delete_variation(*variation_id).await
            }
            DeleteDispatch::Batch(request) => self.api.batch_delete(request).await.map(drop),
        };
        match result {
            Ok(()) => {
                self.selection.exit_selection_mode();
                self.refresh().await;
                ActionOutcome::Applied
            }
            Err(failure) => self.fail(&failure),
        }
    }

    pub async fn submit_new_opening(&mut self, form: VariationForm) -> ActionOutcome {
        if form.moves.trim().is_empty() {
            return self.invalid("Moves are required");
        }
        if form.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return self.invalid("Opening name is required");
        }
        if form.side.is_none() {
            return self.invalid("Side is required");
        }
        if let Some(outcome) = self.gate(PendingAction::CreateOpening(form.clone())) {
            return outcome;
        }

        debug!(name = ?form.name, "creating opening");
        match self.api.create_opening(form).await {
            Ok(opening) => {
                info!(opening_id = opening.id.0, "opening saved");
                self.refresh().await;
                if !self.list.is_expanded(opening.id) {
                    self.list.toggle_expand(opening.id);
                }
                ActionOutcome::Applied
            }
            Err(failure) => self.fail(&failure),
        }
    }

    pub async fn submit_variation_edit(
        &mut self,
        variation_id: VariationId,
        form: VariationForm,
    ) -> ActionOutcome {
        if form.moves.trim().is_empty() {
            return self.invalid("Moves are required");
        }
        if let Some(outcome) = self.gate(PendingAction::EditVariation(variation_id, form.clone())) {
            return outcome;
        }

        match self.api.update_variation(variation_id, form).await {
            Ok(updated) => {
                if let Some(slot) = self.openings.iter_mut().find(|o| o.id == updated.id) {
                    *slot = updated;
                } else {
                    self.refresh().await;
                }
                ActionOutcome::Applied
            }
            Err(failure) => self.fail(&failure),
        }
    }

    pub async fn rename_opening(&mut self, opening_id: OpeningId, name: &str) -> ActionOutcome {
        let name = name.trim();
        if name.is_empty() {
            return self.invalid("New opening name is required");
        }
        if let Some(outcome) = self.gate(PendingAction::RenameOpening(opening_id, name.to_string())) {
            return outcome;
        }

        match self.api.rename_opening(opening_id, name).await {
            Ok(renamed) => {
                if let Some(slot) = self.openings.iter_mut().find(|o| o.id == renamed.id) {
                    slot.name = renamed.name;
                }
                ActionOutcome::Applied
            }
            Err(failure) => self.fail(&failure),
        }
    }

    pub async fn toggle_favorite(&mut self, opening_id: OpeningId) -> ActionOutcome {
        if let Some(outcome) = self.gate(PendingAction::ToggleFavorite(opening_id)) {
            return outcome;
        }

        match self.api.toggle_favorite(opening_id).await {
            Ok(response) => {
                if let Some(opening) = self.openings.iter_mut().find(|o| o.id == opening_id) {
                    opening.is_favorite = response.is_favorite;
                }
                if self.favorites_only && !response.is_favorite {
                    self.openings.retain(|o| o.id != opening_id);
                }
                ActionOutcome::Applied
            }
            Err(failure) => self.fail(&failure),
        }
    }

    /// Copies public openings into the signed-in user's repertoire.
    pub async fn import_public(&mut self, opening_ids: &[OpeningId]) -> ActionOutcome {
        if opening_ids.is_empty() {
            return ActionOutcome::Ignored;
        }
        match self.api.import_openings(opening_ids).await {
            Ok(response) => {
                info!(imported = response.imported, "import finished");
                self.notice = Some(response.message);
                self.selection.exit_selection_mode();
                ActionOutcome::Applied
            }
            Err(failure) => self.fail(&failure),
        }
    }

    /// Unlocks admin mode and runs the parked intent, if any.
    pub async fn unlock_admin(&mut self, password: &str) -> ActionOutcome {
        if let Err(failure) = self.api.verify_admin(password).await {
            return self.fail(&failure);
        }
        self.viewer = ViewerMode::Guest {
            admin_unlocked: true,
        };
        self.banner = None;

        match self.pending_action.take() {
            Some(action) => self.run(action).await,
            None => ActionOutcome::Applied,
        }
    }

    pub fn cancel_admin_prompt(&mut self) {
        self.pending_action = None;
    }

    pub async fn exit_admin(&mut self) -> ActionOutcome {
        if let Err(failure) = self.api.exit_admin().await {
            return self.fail(&failure);
        }
        if let ViewerMode::Guest { .. } = self.viewer {
            self.viewer = ViewerMode::Guest {
                admin_unlocked: false,
            };
        }
        ActionOutcome::Applied
    }

    pub fn press(&mut self, item: DragItem, x: f64, y: f64) -> bool {
        self.can_drag_item(item) && self.list.press(item, x, y)
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) -> bool {
        self.list.pointer_moved(x, y)
    }

    pub fn cancel_drag(&mut self) {
        self.list.cancel_drag();
    }

    /// Starts a drag without pointer travel.
    pub fn begin_drag(&mut self, item: DragItem) -> bool {
        self.can_drag_item(item) && self.list.begin_drag(item)
    }

    /// Drops the active drag onto `over` and persists the resulting order.
    pub async fn drop_on(&mut self, over: DragItem) -> ActionOutcome {
        let selection_active = self.selection.is_active();
        let can_drag = match self.list.drag().state() {
            DragState::Pending { item, .. } | DragState::Dragging { item } => {
                self.can_drag_item(item)
            }
            DragState::Idle => self.can_drag(),
        };
        match self
            .list
            .complete_drag(&self.openings, over, selection_active, can_drag)
        {
            Some(commit) => self.reorder(commit).await,
            None => ActionOutcome::Ignored,
        }
    }

    /// Applies `commit` optimistically and persists it.
    pub async fn reorder(&mut self, commit: ReorderCommit) -> ActionOutcome {
        if self.favorites_only && matches!(commit.partition, Partition::Side(_)) {
            return self.invalid("Openings cannot be reordered while only favorites are shown");
        }
        if let Some(outcome) = self.gate(PendingAction::Reorder(commit.clone())) {
            return outcome;
        }
        let ticket = self.begin_reorder(&commit);
        let result = self.persist_order(&commit).await;
        self.finish_reorder(ticket, result)
    }

    pub fn begin_reorder(&mut self, commit: &ReorderCommit) -> ReorderTicket {
        let snapshot = partition_order(&self.openings, commit.partition);
        let generation = self.generations.entry(commit.partition).or_insert(0);
        *generation += 1;
        let ticket = ReorderTicket {
            partition: commit.partition,
            generation: *generation,
            snapshot,
        };
        apply_order(&mut self.openings, commit.partition, &commit.ordered_ids);
        ticket
    }

    /// Settles a reorder. Responses superseded by a newer reorder of the
    /// same partition are ignored; a failure of the newest one restores
    /// the order seen before it began.
    pub fn finish_reorder(
        &mut self,
        ticket: ReorderTicket,
        result: Result<(), ApiFailure>,
    ) -> ActionOutcome {
        let latest = self.generations.get(&ticket.partition).copied();
        if latest != Some(ticket.generation) {
            debug!(generation = ticket.generation, "ignoring superseded reorder response");
            return ActionOutcome::Ignored;
        }
        match result {
            Ok(()) => ActionOutcome::Applied,
            Err(failure) => {
                apply_order(&mut self.openings, ticket.partition, &ticket.snapshot);
                self.fail(&failure)
            }
        }
    }

    async fn persist_order(&self, commit: &ReorderCommit) -> Result<(), ApiFailure> {
        let positions = dense_positions(&commit.ordered_ids);
        match commit.partition {
            Partition::Side(side) => {
                self.api
                    .reorder_openings(&ReorderOpeningsRequest { side, positions })
                    .await
            }
            Partition::Opening(opening_id) => {
                self.api
                    .reorder_variations(opening_id, &ReorderVariationsRequest { positions })
                    .await
            }
        }
    }

    async fn run(&mut self, action: PendingAction) -> ActionOutcome {
        match action {
            PendingAction::CreateOpening(form) => self.submit_new_opening(form).await,
            PendingAction::EditVariation(variation_id, form) => {
                self.submit_variation_edit(variation_id, form).await
            }
            PendingAction::RenameOpening(opening_id, name) => {
                self.rename_opening(opening_id, &name).await
            }
            PendingAction::ToggleFavorite(opening_id) => self.toggle_favorite(opening_id).await,
            PendingAction::Delete(dispatch) => self.request_delete(dispatch),
            PendingAction::Reorder(commit) => self.reorder(commit).await,
        }
    }

    fn gate(&mut self, action: PendingAction) -> Option<ActionOutcome> {
        if self.can_mutate() {
            return None;
        }
        debug!(?action, "parking action until admin password is entered");
        self.pending_action = Some(action);
        Some(ActionOutcome::AdminPasswordRequired)
    }

    fn invalid(&mut self, message: &str) -> ActionOutcome {
        self.banner = Some(UiError::validation(message));
        ActionOutcome::Rejected
    }

    fn fail(&mut self, failure: &ApiFailure) -> ActionOutcome {
        warn!(error = %failure, "request failed");
        self.banner = Some(UiError::from_failure(failure));
        ActionOutcome::Rejected
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
