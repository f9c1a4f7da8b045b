use super::*;
use shared::{domain::Side, protocol::ImageUpload};
use tempfile::TempDir;

struct Fixture {
    ctx: ApiContext,
    _uploads: TempDir,
    _data: Option<TempDir>,
}

async fn setup() -> Fixture {
    let uploads = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    Fixture {
        ctx: ApiContext {
            storage,
            uploads: UploadStore::new(uploads.path()),
            admin_password: Some("letmein".into()),
        },
        _uploads: uploads,
        _data: None,
    }
}

/// A file-backed fixture, so a second connection can alter the schema.
async fn setup_on_disk() -> (Fixture, String) {
    let data = tempfile::tempdir().expect("tempdir");
    let uploads = tempfile::tempdir().expect("tempdir");
    let database_url = format!(
        "sqlite://{}",
        data.path()
            .join("repertoire.db")
            .to_string_lossy()
            .replace('\\', "/")
    );
    let storage = Storage::new(&database_url).await.expect("db");
    let fixture = Fixture {
        ctx: ApiContext {
            storage,
            uploads: UploadStore::new(uploads.path()),
            admin_password: Some("letmein".into()),
        },
        _uploads: uploads,
        _data: Some(data),
    };
    (fixture, database_url)
}

async fn execute_sql(database_url: &str, statement: &str) {
    let pool = sqlx::SqlitePool::connect(database_url).await.expect("connect");
    sqlx::query(statement).execute(&pool).await.expect("statement");
    pool.close().await;
}

/// Makes the database refuse variations whose moves read `reject me`.
async fn reject_marked_moves(database_url: &str, event: &str) {
    execute_sql(
        database_url,
        &format!(
            "CREATE TRIGGER reject_marked_moves BEFORE {event} ON variations
             WHEN NEW.moves = 'reject me'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END"
        ),
    )
    .await;
}

fn stored_uploads(ctx: &ApiContext) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(ctx.uploads.root()) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

async fn user(ctx: &ApiContext, name: &str) -> Requester {
    let id = ctx.storage.create_user(name, "hash").await.expect("user");
    let session = ctx.storage.create_session(Some(id), false).await.expect("session");
    Requester::from_session(session)
}

async fn admin_guest(ctx: &ApiContext) -> Requester {
    let session = ctx.storage.create_session(None, true).await.expect("session");
    Requester::from_session(session)
}

fn form(name: &str, side: Side, variation: Option<&str>, moves: &str) -> VariationForm {
    VariationForm {
        name: Some(name.into()),
        side: Some(side),
        moves: moves.into(),
        variation_name: variation.map(Into::into),
        ..VariationForm::default()
    }
}

fn png(name: &str) -> Option<ImageUpload> {
    Some(ImageUpload {
        filename: name.into(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    })
}

#[test]
fn permission_rule_follows_ownership_and_admin_mode() {
    let owner = UserId(1);
    let session = |user_id, admin| {
        Requester::from_session(StoredSession {
            token: "t".into(),
            user_id,
            is_admin_mode: admin,
        })
    };

    assert!(session(Some(owner), false).can_edit(Some(owner)));
    assert!(!session(Some(UserId(2)), true).can_edit(Some(owner)));
    assert!(!session(Some(owner), false).can_edit(None));
    assert!(session(None, true).can_edit(None));
    assert!(!Requester::anonymous().can_edit(None));

    assert!(session(Some(owner), false).can_create());
    assert!(session(None, true).can_create());
    assert!(!session(None, false).can_create());
}

#[tokio::test]
async fn anonymous_requesters_cannot_create() {
    let fx = setup().await;
    let err = create_opening(
        &fx.ctx,
        &Requester::anonymous(),
        form("Sicilian", Side::Black, None, "1. e4 c5"),
    )
    .await
    .expect_err("forbidden");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[tokio::test]
async fn create_requires_name_side_and_moves() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let mut missing_side = form("Sicilian", Side::Black, None, "1. e4 c5");
    missing_side.side = None;

    let err = create_opening(&fx.ctx, &alice, missing_side)
        .await
        .expect_err("validation");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, None, "   "))
        .await
        .expect_err("validation");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn create_reuses_opening_and_defaults_variation_name() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;

    let first = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, None, "1. e4 c5"))
        .await
        .expect("create");
    assert_eq!(first.variations[0].name, DEFAULT_VARIATION_NAME);
    assert_eq!(
        first.variations[0].lichess_link,
        "https://lichess.org/analysis/pgn/1.%20e4%20c5"
    );

    let second = create_opening(
        &fx.ctx,
        &alice,
        form("Sicilian", Side::Black, Some("Najdorf"), "1. e4 c5 2. Nf3 d6"),
    )
    .await
    .expect("create");
    assert_eq!(second.id, first.id);
    assert_eq!(second.variations.len(), 2);

    let listed = list_openings(
        &fx.ctx,
        &alice,
        OpeningsQuery {
            mode: ListScope::Private,
            favorites: false,
        },
    )
    .await
    .expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn duplicate_variation_names_and_moves_conflict() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, Some("Open"), "1. e4 c5 2. Nf3"))
        .await
        .expect("create");

    let err = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, Some("Open"), "1. e4 c5 2. c3"))
        .await
        .expect_err("duplicate name");
    assert_eq!(err.code, ErrorCode::Conflict);

    let err = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, Some("Other"), "1. e4 c5 2. Nf3"))
        .await
        .expect_err("duplicate moves");
    assert_eq!(err.code, ErrorCode::Conflict);
    assert!(err.message.contains("Open"));
}

#[tokio::test]
async fn private_listing_requires_a_user() {
    let fx = setup().await;
    let admin = admin_guest(&fx.ctx).await;
    let alice = user(&fx.ctx, "alice").await;
    create_opening(&fx.ctx, &admin, form("Italian", Side::White, None, "1. e4 e5 2. Nf3 Nc6 3. Bc4"))
        .await
        .expect("public");
    create_opening(&fx.ctx, &alice, form("London", Side::White, None, "1. d4 d5 2. Bf4"))
        .await
        .expect("private");

    let private = OpeningsQuery {
        mode: ListScope::Private,
        favorites: false,
    };
    let anonymous = list_openings(&fx.ctx, &Requester::anonymous(), private)
        .await
        .expect("list");
    assert_eq!(anonymous.len(), 1);
    assert_eq!(anonymous[0].name, "Italian");

    let mine = list_openings(&fx.ctx, &alice, private).await.expect("list");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].name, "London");
}

#[tokio::test]
async fn public_openings_need_admin_mode_to_edit() {
    let fx = setup().await;
    let admin = admin_guest(&fx.ctx).await;
    let alice = user(&fx.ctx, "alice").await;
    let public = create_opening(&fx.ctx, &admin, form("Italian", Side::White, None, "1. e4 e5"))
        .await
        .expect("public");

    let err = rename_opening(&fx.ctx, &alice, public.id, "Giuoco Piano")
        .await
        .expect_err("forbidden");
    assert_eq!(err.code, ErrorCode::Forbidden);

    let renamed = rename_opening(&fx.ctx, &admin, public.id, "Giuoco Piano")
        .await
        .expect("rename");
    assert_eq!(renamed.name, "Giuoco Piano");

    let err = delete_opening(&fx.ctx, &alice, public.id)
        .await
        .expect_err("forbidden");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[tokio::test]
async fn rename_rejects_clash_within_owner_and_side() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let sicilian = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, None, "1. e4 c5"))
        .await
        .expect("create");
    create_opening(&fx.ctx, &alice, form("French", Side::Black, None, "1. e4 e6"))
        .await
        .expect("create");
    create_opening(&fx.ctx, &alice, form("English", Side::White, None, "1. c4"))
        .await
        .expect("create");

    let err = rename_opening(&fx.ctx, &alice, sicilian.id, "French")
        .await
        .expect_err("clash");
    assert_eq!(err.code, ErrorCode::Conflict);

    rename_opening(&fx.ctx, &alice, sicilian.id, "English")
        .await
        .expect("other side is fine");
}

#[tokio::test]
async fn toggle_favorite_flips_flag() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let opening = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, None, "1. e4 c5"))
        .await
        .expect("create");

    let first = toggle_favorite(&fx.ctx, &alice, opening.id).await.expect("toggle");
    assert!(first.is_favorite);
    let second = toggle_favorite(&fx.ctx, &alice, opening.id).await.expect("toggle");
    assert!(!second.is_favorite);
}

#[tokio::test]
async fn update_variation_replaces_content_and_releases_old_image() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let mut create = form("Sicilian", Side::Black, None, "1. e4 c5");
    create.image = png("board.PNG");
    create.tutorials = vec![" https://a.example ".into(), "".into()];
    let opening = create_opening(&fx.ctx, &alice, create).await.expect("create");
    let variation = &opening.variations[0];
    let old_image = variation.image_filename.clone().expect("image saved");
    assert!(old_image.starts_with(&format!("u{}_img_", alice.user_id().expect("user").0)));
    assert_eq!(variation.tutorials, vec!["https://a.example".to_string()]);

    let updated = update_variation(
        &fx.ctx,
        &alice,
        variation.id,
        VariationForm {
            moves: "1. e4 c5 2. Nf3".into(),
            variation_name: Some("Open".into()),
            notes: Some("mainline".into()),
            image: png("new.gif"),
            ..VariationForm::default()
        },
    )
    .await
    .expect("update");

    let refreshed = updated.variation(variation.id).expect("variation");
    assert_eq!(refreshed.name, "Open");
    assert_eq!(refreshed.notes.as_deref(), Some("mainline"));
    assert!(refreshed.tutorials.is_empty());
    let new_image = refreshed.image_filename.clone().expect("new image");
    assert!(new_image.ends_with(".gif"));
    assert!(fx.ctx.uploads.read(&old_image).await.expect("read").is_none());
    assert!(fx.ctx.uploads.read(&new_image).await.expect("read").is_some());

    let cleared = update_variation(
        &fx.ctx,
        &alice,
        variation.id,
        VariationForm {
            moves: "1. e4 c5 2. Nf3".into(),
            delete_image: true,
            ..VariationForm::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(cleared.variations[0].image_filename, None);
    assert_eq!(cleared.variations[0].name, "Open");
    assert!(fx.ctx.uploads.read(&new_image).await.expect("read").is_none());
}

#[tokio::test]
async fn unsupported_image_extensions_are_ignored() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let mut create = form("Sicilian", Side::Black, None, "1. e4 c5");
    create.image = png("notes.txt");

    let opening = create_opening(&fx.ctx, &alice, create).await.expect("create");
    assert_eq!(opening.variations[0].image_filename, None);
}

#[tokio::test]
async fn update_may_keep_own_moves_but_not_copy_a_sibling() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, Some("Open"), "1. e4 c5 2. Nf3"))
        .await
        .expect("create");
    let opening = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, Some("Alapin"), "1. e4 c5 2. c3"))
        .await
        .expect("create");
    let alapin = opening.variations[1].id;

    update_variation(
        &fx.ctx,
        &alice,
        alapin,
        VariationForm {
            moves: "1. e4 c5 2. c3".into(),
            ..VariationForm::default()
        },
    )
    .await
    .expect("unchanged moves");

    let err = update_variation(
        &fx.ctx,
        &alice,
        alapin,
        VariationForm {
            moves: "1. e4 c5 2. Nf3".into(),
            ..VariationForm::default()
        },
    )
    .await
    .expect_err("sibling moves");
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[tokio::test]
async fn batch_delete_cascades_and_skips_foreign_entities() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let bob = user(&fx.ctx, "bob").await;
    create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, None, "1. e4 c5"))
        .await
        .expect("create");
    let sicilian = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, Some("Alapin"), "1. e4 c5 2. c3"))
        .await
        .expect("create");
    create_opening(&fx.ctx, &alice, form("London", Side::White, Some("Main"), "1. d4 d5 2. Bf4"))
        .await
        .expect("create");
    let london = create_opening(&fx.ctx, &alice, form("London", Side::White, Some("Jobava"), "1. d4 d5 2. Nc3"))
        .await
        .expect("create");
    let foreign = create_opening(&fx.ctx, &bob, form("French", Side::Black, None, "1. e4 e6"))
        .await
        .expect("create");

    let request = BatchDeleteRequest {
        openings: vec![sicilian.id, foreign.id],
        variations: vec![london.variations[1].id],
    };
    let response = batch_delete(&fx.ctx, &alice, &request).await.expect("batch");
    assert_eq!(response.message, "Batch delete successful");

    assert!(fx.ctx.storage.opening(sicilian.id).await.expect("load").is_none());
    assert!(fx.ctx.storage.opening(foreign.id).await.expect("load").is_some());
    let london = fx.ctx.storage.opening(london.id).await.expect("load").expect("exists");
    assert_eq!(london.variations.len(), 1);
    assert_eq!(london.variations[0].name, "Main");
    assert_eq!(fx.ctx.storage.count_variations().await.expect("count"), 2);
}

#[tokio::test]
async fn shared_image_survives_until_last_reference_is_gone() {
    let fx = setup().await;
    let admin = admin_guest(&fx.ctx).await;
    let mut create = form("Italian", Side::White, None, "1. e4 e5 2. Nf3 Nc6 3. Bc4");
    create.image = png("italian.png");
    let public = create_opening(&fx.ctx, &admin, create).await.expect("create");
    let image = public.variations[0].image_filename.clone().expect("image");

    // A second variation pointing at the same file.
    fx.ctx
        .storage
        .insert_variation(NewVariation {
            opening_id: public.id,
            name: "Evans",
            moves: "1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. b4",
            lichess_link: "link",
            image_filename: Some(&image),
            notes: None,
            tutorials: &[],
        })
        .await
        .expect("insert");

    delete_variation(&fx.ctx, &admin, public.variations[0].id)
        .await
        .expect("delete");
    assert!(fx.ctx.uploads.read(&image).await.expect("read").is_some());

    delete_opening(&fx.ctx, &admin, public.id).await.expect("delete");
    assert!(fx.ctx.uploads.read(&image).await.expect("read").is_none());
}

#[tokio::test]
async fn import_copies_public_openings_once() {
    let fx = setup().await;
    let admin = admin_guest(&fx.ctx).await;
    let alice = user(&fx.ctx, "alice").await;
    let mut create = form("Italian", Side::White, None, "1. e4 e5 2. Nf3 Nc6 3. Bc4");
    create.image = png("italian.jpg");
    create.tutorials = vec!["https://t.example".into()];
    let public = create_opening(&fx.ctx, &admin, create).await.expect("create");
    let private = create_opening(&fx.ctx, &alice, form("London", Side::White, None, "1. d4"))
        .await
        .expect("create");

    let err = import_openings(
        &fx.ctx,
        &admin,
        &ImportRequest {
            opening_ids: vec![public.id],
        },
    )
    .await
    .expect_err("guest cannot import");
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let request = ImportRequest {
        opening_ids: vec![public.id, private.id, OpeningId(999)],
    };
    let first = import_openings(&fx.ctx, &alice, &request).await.expect("import");
    assert_eq!(first.imported, 1);
    assert_eq!(first.message, "Successfully imported 1 openings");

    let again = import_openings(&fx.ctx, &alice, &request).await.expect("import");
    assert_eq!(again.imported, 0);

    let mine = fx
        .ctx
        .storage
        .list_openings(alice.user_id(), false)
        .await
        .expect("list");
    let copy = mine.iter().find(|o| o.name == "Italian").expect("copied");
    assert_ne!(copy.id, public.id);
    let copied = &copy.variations[0];
    assert_eq!(copied.tutorials, vec!["https://t.example".to_string()]);
    let copied_image = copied.image_filename.clone().expect("image copied");
    assert_ne!(Some(&copied_image), public.variations[0].image_filename.as_ref());
    assert!(fx.ctx.uploads.read(&copied_image).await.expect("read").is_some());
}

#[tokio::test]
async fn reorder_openings_requires_the_whole_partition() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let mut ids = Vec::new();
    for (name, moves) in [("Sicilian", "1. e4 c5"), ("French", "1. e4 e6"), ("Caro-Kann", "1. e4 c6")] {
        let opening = create_opening(&fx.ctx, &alice, form(name, Side::Black, None, moves))
            .await
            .expect("create");
        ids.push(opening.id);
    }

    let partial = ReorderOpeningsRequest {
        side: Side::Black,
        positions: vec![
            PositionAssignment { id: ids[1].0, position: 0 },
            PositionAssignment { id: ids[0].0, position: 1 },
        ],
    };
    let err = reorder_openings(&fx.ctx, &alice, &partial)
        .await
        .expect_err("partial");
    assert_eq!(err.code, ErrorCode::Validation);

    let duplicated = ReorderOpeningsRequest {
        side: Side::Black,
        positions: vec![
            PositionAssignment { id: ids[0].0, position: 0 },
            PositionAssignment { id: ids[0].0, position: 1 },
            PositionAssignment { id: ids[2].0, position: 2 },
        ],
    };
    let err = reorder_openings(&fx.ctx, &alice, &duplicated)
        .await
        .expect_err("duplicate");
    assert_eq!(err.code, ErrorCode::Validation);

    let full = ReorderOpeningsRequest {
        side: Side::Black,
        positions: vec![
            PositionAssignment { id: ids[2].0, position: 0 },
            PositionAssignment { id: ids[0].0, position: 1 },
            PositionAssignment { id: ids[1].0, position: 2 },
        ],
    };
    reorder_openings(&fx.ctx, &alice, &full).await.expect("reorder");
    let order = fx
        .ctx
        .storage
        .opening_ids_in_partition(alice.user_id(), Side::Black)
        .await
        .expect("ids");
    assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
}

#[tokio::test]
async fn reorder_variations_checks_permission_and_membership() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let bob = user(&fx.ctx, "bob").await;
    create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, Some("Open"), "1. e4 c5 2. Nf3"))
        .await
        .expect("create");
    let opening = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, Some("Alapin"), "1. e4 c5 2. c3"))
        .await
        .expect("create");
    let [open, alapin] = [opening.variations[0].id, opening.variations[1].id];
    let request = ReorderVariationsRequest {
        positions: vec![
            PositionAssignment { id: alapin.0, position: 0 },
            PositionAssignment { id: open.0, position: 1 },
        ],
    };

    let err = reorder_variations(&fx.ctx, &bob, opening.id, &request)
        .await
        .expect_err("forbidden");
    assert_eq!(err.code, ErrorCode::Forbidden);

    reorder_variations(&fx.ctx, &alice, opening.id, &request)
        .await
        .expect("reorder");
    let reloaded = fx.ctx.storage.opening(opening.id).await.expect("load").expect("exists");
    assert_eq!(reloaded.variation_ids(), vec![alapin, open]);
}

#[tokio::test]
async fn missing_entities_report_not_found() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let err = delete_variation(&fx.ctx, &alice, VariationId(42))
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::NotFound);
    let err = toggle_favorite(&fx.ctx, &alice, OpeningId(42))
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn failed_update_discards_the_new_image() {
    let (fx, database_url) = setup_on_disk().await;
    let alice = user(&fx.ctx, "alice").await;
    let opening = create_opening(&fx.ctx, &alice, form("Sicilian", Side::Black, None, "1. e4 c5"))
        .await
        .expect("create");
    reject_marked_moves(&database_url, "UPDATE").await;

    let err = update_variation(
        &fx.ctx,
        &alice,
        opening.variations[0].id,
        VariationForm {
            moves: "reject me".into(),
            image: png("board.png"),
            ..VariationForm::default()
        },
    )
    .await
    .expect_err("update rejected");
    assert_eq!(err.code, ErrorCode::Internal);
    assert!(stored_uploads(&fx.ctx).is_empty());

    let unchanged = fx
        .ctx
        .storage
        .opening(opening.id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(unchanged.variations[0].moves, "1. e4 c5");
}

#[tokio::test]
async fn failed_import_leaves_no_partial_copy() {
    let (fx, database_url) = setup_on_disk().await;
    let admin = admin_guest(&fx.ctx).await;
    let alice = user(&fx.ctx, "alice").await;
    let mut main_line = form("Italian", Side::White, Some("Main"), "1. e4 e5 2. Nf3 Nc6 3. Bc4");
    main_line.image = png("italian.png");
    let public = create_opening(&fx.ctx, &admin, main_line).await.expect("create");
    create_opening(&fx.ctx, &admin, form("Italian", Side::White, Some("Marked"), "reject me"))
        .await
        .expect("second variation");
    assert_eq!(stored_uploads(&fx.ctx).len(), 1);

    reject_marked_moves(&database_url, "INSERT").await;
    let request = ImportRequest {
        opening_ids: vec![public.id],
    };
    let err = import_openings(&fx.ctx, &alice, &request)
        .await
        .expect_err("copy rejected");
    assert_eq!(err.code, ErrorCode::Internal);
    let mine = fx
        .ctx
        .storage
        .list_openings(alice.user_id(), false)
        .await
        .expect("list");
    assert!(mine.is_empty());
    assert_eq!(stored_uploads(&fx.ctx).len(), 1);

    execute_sql(&database_url, "DROP TRIGGER reject_marked_moves").await;
    let retried = import_openings(&fx.ctx, &alice, &request).await.expect("import");
    assert_eq!(retried.imported, 1);
    let mine = fx
        .ctx
        .storage
        .list_openings(alice.user_id(), false)
        .await
        .expect("list");
    assert_eq!(mine[0].variations.len(), 2);
}

#[tokio::test]
async fn favorites_listing_is_partial_so_reorders_need_the_whole_side() {
    let fx = setup().await;
    let alice = user(&fx.ctx, "alice").await;
    let mut ids = Vec::new();
    for (name, moves) in [("London", "1. d4 d5 2. Bf4"), ("Catalan", "1. d4 Nf6 2. c4 e6 3. g3"), ("English", "1. c4")] {
        let opening = create_opening(&fx.ctx, &alice, form(name, Side::White, None, moves))
            .await
            .expect("create");
        ids.push(opening.id);
    }
    for id in [ids[0], ids[2]] {
        toggle_favorite(&fx.ctx, &alice, id).await.expect("favorite");
    }

    let favorites = list_openings(
        &fx.ctx,
        &alice,
        OpeningsQuery {
            mode: ListScope::Private,
            favorites: true,
        },
    )
    .await
    .expect("list");
    let listed: Vec<OpeningId> = favorites.iter().map(|o| o.id).collect();
    assert_eq!(listed, vec![ids[0], ids[2]]);

    let favorites_only = ReorderOpeningsRequest {
        side: Side::White,
        positions: vec![
            PositionAssignment { id: ids[2].0, position: 0 },
            PositionAssignment { id: ids[0].0, position: 1 },
        ],
    };
    let err = reorder_openings(&fx.ctx, &alice, &favorites_only)
        .await
        .expect_err("partial side");
    assert_eq!(err.code, ErrorCode::Validation);

    let whole_side = ReorderOpeningsRequest {
        side: Side::White,
        positions: vec![
            PositionAssignment { id: ids[2].0, position: 0 },
            PositionAssignment { id: ids[0].0, position: 1 },
            PositionAssignment { id: ids[1].0, position: 2 },
        ],
    };
    reorder_openings(&fx.ctx, &alice, &whole_side).await.expect("reorder");
}
