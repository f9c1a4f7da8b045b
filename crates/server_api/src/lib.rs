use std::collections::{BTreeSet, HashSet};

use shared::{
    domain::{
        analysis_link, normalize_tutorials, Opening, OpeningId, UserId, VariationId,
        DEFAULT_VARIATION_NAME,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        BatchDeleteRequest, FavoriteResponse, ImportRequest, ImportResponse, ListScope,
        MessageResponse, OpeningsQuery, PositionAssignment, ReorderOpeningsRequest,
        ReorderVariationsRequest, VariationForm,
    },
};
use storage::{ImageChange, NewVariation, Storage, StoredSession, VariationChanges};
use tracing::{error, info, warn};

pub mod auth;
pub mod uploads;

pub use uploads::UploadStore;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub uploads: UploadStore,
    pub admin_password: Option<String>,
}

/// The caller of an operation, as resolved from its session cookie.
#[derive(Debug, Clone, Default)]
pub struct Requester {
    pub session: Option<StoredSession>,
}

impl Requester {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_session(session: StoredSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.session.as_ref().and_then(|s| s.user_id)
    }

    pub fn is_admin_mode(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_admin_mode)
    }

    /// Owned openings belong to their owner; public ones need admin mode.
    pub fn can_edit(&self, owner: Option<UserId>) -> bool {
        match owner {
            Some(owner) => self.user_id() == Some(owner),
            None => self.is_admin_mode(),
        }
    }

    pub fn can_create(&self) -> bool {
        self.user_id().is_some() || self.is_admin_mode()
    }
}

pub async fn list_openings(
    ctx: &ApiContext,
    requester: &Requester,
    query: OpeningsQuery,
) -> Result<Vec<Opening>, ApiError> {
    let owner = match (query.mode, requester.user_id()) {
        (ListScope::Private, Some(user_id)) => Some(user_id),
        _ => None,
    };
    ctx.storage
        .list_openings(owner, query.favorites)
        .await
        .map_err(internal)
}

/// Adds a variation, creating its opening first when the requester has no
/// opening of that name on that side yet.
pub async fn create_opening(
    ctx: &ApiContext,
    requester: &Requester,
    form: VariationForm,
) -> Result<Opening, ApiError> {
    if !requester.can_create() {
        return Err(ApiError::forbidden(
            "Permission denied. Login or enter admin password.",
        ));
    }

    let name = form.name.as_deref().map(str::trim).unwrap_or_default();
    let moves = form.moves.trim();
    let (Some(side), false, false) = (form.side, name.is_empty(), moves.is_empty()) else {
        return Err(ApiError::validation("Name, Side, and Moves are required"));
    };
    let variation_name = variation_name_or_default(form.variation_name.as_deref());
    let owner = requester.user_id();

    let existing = ctx
        .storage
        .find_opening(owner, name, side)
        .await
        .map_err(internal)?;
    let opening_id = match existing {
        Some(opening_id) => {
            ensure_unique_variation(ctx, opening_id, name, variation_name, moves, None).await?;
            opening_id
        }
        None => ctx
            .storage
            .create_opening(owner, name, side)
            .await
            .map_err(internal)?,
    };

    let image_filename = match &form.image {
        Some(image) => ctx
            .uploads
            .save(owner, &image.filename, &image.bytes)
            .await
            .map_err(internal)?,
        None => None,
    };
    let tutorials = normalize_tutorials(&form.tutorials);
    let link = analysis_link(moves);

    let inserted = ctx
        .storage
        .insert_variation(NewVariation {
            opening_id,
            name: variation_name,
            moves,
            lichess_link: &link,
            image_filename: image_filename.as_deref(),
            notes: non_blank(form.notes.as_deref()),
            tutorials: &tutorials,
        })
        .await;
    if let Err(err) = inserted {
        if existing.is_none() {
            if let Err(cleanup) = ctx.storage.delete_opening(opening_id).await {
                warn!(opening_id = opening_id.0, error = %cleanup, "failed to remove empty opening");
            }
        }
        if let Some(filename) = &image_filename {
            ctx.uploads.remove(filename).await;
        }
        return Err(internal(err));
    }

    info!(opening_id = opening_id.0, side = %side, "variation added");
    load_opening(ctx, opening_id).await
}

pub async fn rename_opening(
    ctx: &ApiContext,
    requester: &Requester,
    opening_id: OpeningId,
    new_name: &str,
) -> Result<Opening, ApiError> {
    let record = editable_opening(ctx, requester, opening_id).await?;
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }

    let clash = ctx
        .storage
        .find_opening(record.owner, new_name, record.side)
        .await
        .map_err(internal)?;
    if clash.is_some_and(|id| id != opening_id) {
        return Err(ApiError::conflict("Opening with this name already exists"));
    }

    ctx.storage
        .rename_opening(opening_id, new_name)
        .await
        .map_err(internal)?;
    load_opening(ctx, opening_id).await
}

pub async fn toggle_favorite(
    ctx: &ApiContext,
    requester: &Requester,
    opening_id: OpeningId,
) -> Result<FavoriteResponse, ApiError> {
    editable_opening(ctx, requester, opening_id).await?;
    let is_favorite = ctx
        .storage
        .toggle_favorite(opening_id)
        .await
        .map_err(internal)?;
    Ok(FavoriteResponse { is_favorite })
}

/// Rewrites a variation's content. The opening (and so the side) it belongs
/// to never changes.
pub async fn update_variation(
    ctx: &ApiContext,
    requester: &Requester,
    variation_id: VariationId,
    form: VariationForm,
) -> Result<Opening, ApiError> {
    let variation = ctx
        .storage
        .variation_record(variation_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Variation not found"))?;
    let opening = editable_opening(ctx, requester, variation.opening_id).await?;

    let moves = form.moves.trim();
    if moves.is_empty() {
        return Err(ApiError::validation("Moves are required"));
    }
    let new_name = non_blank(form.variation_name.as_deref());
    ensure_unique_variation(
        ctx,
        opening.id,
        &opening.name,
        new_name.unwrap_or(&variation.name),
        moves,
        Some(variation_id),
    )
    .await?;

    let saved_image = match &form.image {
        Some(image) => ctx
            .uploads
            .save(opening.owner, &image.filename, &image.bytes)
            .await
            .map_err(internal)?,
        None => None,
    };
    let image = match (&saved_image, form.delete_image) {
        (Some(filename), _) => ImageChange::Replace(filename),
        (None, true) => ImageChange::Remove,
        (None, false) => ImageChange::Keep,
    };
    let tutorials = normalize_tutorials(&form.tutorials);
    let link = analysis_link(moves);

    let updated = ctx
        .storage
        .update_variation(
            variation_id,
            VariationChanges {
                name: new_name,
                moves,
                lichess_link: &link,
                notes: non_blank(form.notes.as_deref()),
                image,
                tutorials: &tutorials,
            },
        )
        .await;
    if let Err(err) = updated {
        if let Some(filename) = &saved_image {
            ctx.uploads.remove(filename).await;
        }
        return Err(internal(err));
    }

    if image != ImageChange::Keep {
        if let Some(previous) = variation.image_filename {
            release_images(ctx, vec![previous]).await;
        }
    }

    load_opening(ctx, opening.id).await
}

pub async fn delete_opening(
    ctx: &ApiContext,
    requester: &Requester,
    opening_id: OpeningId,
) -> Result<(), ApiError> {
    editable_opening(ctx, requester, opening_id).await?;
    let images = ctx
        .storage
        .delete_opening(opening_id)
        .await
        .map_err(internal)?;
    release_images(ctx, images).await;
    info!(opening_id = opening_id.0, "opening deleted");
    Ok(())
}

pub async fn delete_variation(
    ctx: &ApiContext,
    requester: &Requester,
    variation_id: VariationId,
) -> Result<(), ApiError> {
    let variation = ctx
        .storage
        .variation_record(variation_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Variation not found"))?;
    editable_opening(ctx, requester, variation.opening_id).await?;
    let images = ctx
        .storage
        .delete_variation(variation_id)
        .await
        .map_err(internal)?;
    release_images(ctx, images).await;
    info!(variation_id = variation_id.0, "variation deleted");
    Ok(())
}

/// Deletes every listed entity the requester may edit; the rest are skipped.
/// Opening deletions cascade to their variations server-side.
pub async fn batch_delete(
    ctx: &ApiContext,
    requester: &Requester,
    request: &BatchDeleteRequest,
) -> Result<MessageResponse, ApiError> {
    let openings = ctx
        .storage
        .opening_records(&dedup(&request.openings))
        .await
        .map_err(internal)?;
    let permitted_openings: Vec<OpeningId> = openings
        .iter()
        .filter(|record| requester.can_edit(record.owner))
        .map(|record| record.id)
        .collect();

    let variations = ctx
        .storage
        .variation_records(&dedup(&request.variations))
        .await
        .map_err(internal)?;
    let mut permitted_variations = Vec::with_capacity(variations.len());
    for variation in variations {
        let owner = ctx
            .storage
            .opening_record(variation.opening_id)
            .await
            .map_err(internal)?
            .map(|record| record.owner);
        if owner.is_some_and(|owner| requester.can_edit(owner)) {
            permitted_variations.push(variation.id);
        }
    }

    let images = ctx
        .storage
        .delete_many(&permitted_openings, &permitted_variations)
        .await
        .map_err(|err| {
            error!(error = %err, "batch delete rolled back");
            internal(err)
        })?;
    release_images(ctx, images).await;
    info!(
        openings = permitted_openings.len(),
        variations = permitted_variations.len(),
        "batch delete applied"
    );
    Ok(MessageResponse::new("Batch delete successful"))
}

/// Copies public openings into the requester's own repertoire.
pub async fn import_openings(
    ctx: &ApiContext,
    requester: &Requester,
    request: &ImportRequest,
) -> Result<ImportResponse, ApiError> {
    let user_id = requester
        .user_id()
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "Must be logged in to import"))?;

    let mut imported = 0;
    for opening_id in dedup(&request.opening_ids) {
        let Some(public) = ctx.storage.opening(opening_id).await.map_err(internal)? else {
            continue;
        };
        let is_public = ctx
            .storage
            .opening_record(opening_id)
            .await
            .map_err(internal)?
            .is_some_and(|record| record.owner.is_none());
        if !is_public {
            continue;
        }
        if ctx
            .storage
            .find_opening(Some(user_id), &public.name, public.side)
            .await
            .map_err(internal)?
            .is_some()
        {
            continue;
        }

        let mut copied_images = Vec::with_capacity(public.variations.len());
        for variation in &public.variations {
            let image_filename = match &variation.image_filename {
                Some(source) => match ctx.uploads.copy_for(Some(user_id), source).await {
                    Ok(copied) => copied,
                    Err(err) => {
                        release_copies(ctx, copied_images).await;
                        return Err(internal(err));
                    }
                },
                None => None,
            };
            copied_images.push(image_filename);
        }
        let variations: Vec<NewVariation<'_>> = public
            .variations
            .iter()
            .zip(&copied_images)
            .map(|(variation, image_filename)| NewVariation {
                opening_id: public.id,
                name: &variation.name,
                moves: &variation.moves,
                lichess_link: &variation.lichess_link,
                image_filename: image_filename.as_deref(),
                notes: variation.notes.as_deref(),
                tutorials: &variation.tutorials,
            })
            .collect();
        let copied = ctx
            .storage
            .create_opening_with_variations(Some(user_id), &public.name, public.side, &variations)
            .await;
        if let Err(err) = copied {
            error!(opening_id = opening_id.0, error = %err, "import copy rolled back");
            release_copies(ctx, copied_images).await;
            return Err(internal(err));
        }
        imported += 1;
    }

    info!(user_id = user_id.0, imported, "public openings imported");
    Ok(ImportResponse {
        imported,
        message: format!("Successfully imported {imported} openings"),
    })
}

async fn release_copies(ctx: &ApiContext, copied_images: Vec<Option<String>>) {
    for filename in copied_images.into_iter().flatten() {
        ctx.uploads.remove(&filename).await;
    }
}

/// Persists a full renumbering of one owner's openings on one side.
pub async fn reorder_openings(
    ctx: &ApiContext,
    requester: &Requester,
    request: &ReorderOpeningsRequest,
) -> Result<(), ApiError> {
    let first = request
        .positions
        .first()
        .ok_or_else(|| ApiError::validation("positions must not be empty"))?;
    let anchor = ctx
        .storage
        .opening_record(OpeningId(first.id))
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Opening not found"))?;
    if !requester.can_edit(anchor.owner) {
        return Err(ApiError::forbidden("Permission denied"));
    }

    let partition = ctx
        .storage
        .opening_ids_in_partition(anchor.owner, request.side)
        .await
        .map_err(internal)?;
    ensure_covers_partition(
        &request.positions,
        partition.iter().map(|id| id.0).collect(),
    )?;

    ctx.storage
        .reorder_openings(anchor.owner, request.side, &request.positions)
        .await
        .map_err(internal)
}

/// Persists a full renumbering of one opening's variations.
pub async fn reorder_variations(
    ctx: &ApiContext,
    requester: &Requester,
    opening_id: OpeningId,
    request: &ReorderVariationsRequest,
) -> Result<(), ApiError> {
    editable_opening(ctx, requester, opening_id).await?;
    let partition = ctx
        .storage
        .variation_ids_for_opening(opening_id)
        .await
        .map_err(internal)?;
    ensure_covers_partition(
        &request.positions,
        partition.iter().map(|id| id.0).collect(),
    )?;

    ctx.storage
        .reorder_variations(opening_id, &request.positions)
        .await
        .map_err(internal)
}

async fn editable_opening(
    ctx: &ApiContext,
    requester: &Requester,
    opening_id: OpeningId,
) -> Result<storage::OpeningRecord, ApiError> {
    let record = ctx
        .storage
        .opening_record(opening_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Opening not found"))?;
    if !requester.can_edit(record.owner) {
        return Err(ApiError::forbidden("Permission denied"));
    }
    Ok(record)
}

async fn load_opening(ctx: &ApiContext, opening_id: OpeningId) -> Result<Opening, ApiError> {
    ctx.storage
        .opening(opening_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Opening not found"))
}

async fn ensure_unique_variation(
    ctx: &ApiContext,
    opening_id: OpeningId,
    opening_name: &str,
    variation_name: &str,
    moves: &str,
    exclude: Option<VariationId>,
) -> Result<(), ApiError> {
    let named = ctx
        .storage
        .find_variation_named(opening_id, variation_name)
        .await
        .map_err(internal)?;
    if named.is_some_and(|v| Some(v.id) != exclude) {
        return Err(ApiError::conflict(format!(
            "Variation '{variation_name}' already exists."
        )));
    }

    let same_moves = ctx
        .storage
        .find_variation_with_moves(opening_id, moves)
        .await
        .map_err(internal)?;
    if let Some(existing) = same_moves.filter(|v| Some(v.id) != exclude) {
        return Err(ApiError::conflict(format!(
            "This moves sequence already exists in '{opening_name}' ({})",
            existing.name
        )));
    }
    Ok(())
}

/// Removes image files no variation references any more.
async fn release_images(ctx: &ApiContext, images: Vec<String>) {
    let unique: BTreeSet<String> = images.into_iter().collect();
    for filename in unique {
        match ctx.storage.count_image_references(&filename).await {
            Ok(0) => ctx.uploads.remove(&filename).await,
            Ok(_) => {}
            Err(error) => warn!(%filename, %error, "could not count image references"),
        }
    }
}

fn ensure_covers_partition(
    positions: &[PositionAssignment],
    partition: HashSet<i64>,
) -> Result<(), ApiError> {
    let submitted: HashSet<i64> = positions.iter().map(|p| p.id).collect();
    if submitted.len() != positions.len() {
        return Err(ApiError::validation("positions contain duplicate ids"));
    }
    if submitted != partition {
        return Err(ApiError::validation(
            "positions must list every member of the reordered partition exactly once",
        ));
    }
    Ok(())
}

fn variation_name_or_default(name: Option<&str>) -> &str {
    non_blank(name).unwrap_or(DEFAULT_VARIATION_NAME)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn dedup<T: Copy + Eq + std::hash::Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "internal error");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
