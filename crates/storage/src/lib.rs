use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{Opening, OpeningId, Side, UserId, Variation, VariationId},
    protocol::PositionAssignment,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub user_id: Option<UserId>,
    pub is_admin_mode: bool,
}

/// Opening header without its variations; `owner` is `None` for public openings.
#[derive(Debug, Clone)]
pub struct OpeningRecord {
    pub id: OpeningId,
    pub owner: Option<UserId>,
    pub name: String,
    pub side: Side,
    pub is_favorite: bool,
    pub position: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VariationRecord {
    pub id: VariationId,
    pub opening_id: OpeningId,
    pub name: String,
    pub moves: String,
    pub image_filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewVariation<'a> {
    pub opening_id: OpeningId,
    pub name: &'a str,
    pub moves: &'a str,
    pub lichess_link: &'a str,
    pub image_filename: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub tutorials: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageChange<'a> {
    Keep,
    Replace(&'a str),
    Remove,
}

#[derive(Debug, Clone)]
pub struct VariationChanges<'a> {
    pub name: Option<&'a str>,
    pub moves: &'a str,
    pub lichess_link: &'a str,
    pub notes: Option<&'a str>,
    pub image: ImageChange<'a>,
    pub tutorials: &'a [String],
}

const OPENING_COLUMNS: &str = "id, user_id, name, side, is_favorite, position, updated_at";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every pooled connection to `:memory:` would open its own empty database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<UserId> {
        let rec = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?) RETURNING id")
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to create user '{username}'"))?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| user_from_row(&r)))
    }

    pub async fn user_by_id(&self, user_id: UserId) -> Result<Option<StoredUser>> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| user_from_row(&r)))
    }

    pub async fn update_user(
        &self,
        user_id: UserId,
        username: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users
             SET username = COALESCE(?, username), password_hash = COALESCE(?, password_hash)
             WHERE id = ?",
        )
        .bind(username)
        .bind(password_hash)
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<(UserId, String)>> {
        let rows = sqlx::query("SELECT id, username FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (UserId(r.get::<i64, _>(0)), r.get::<String, _>(1)))
            .collect())
    }

    pub async fn create_session(
        &self,
        user_id: Option<UserId>,
        is_admin_mode: bool,
    ) -> Result<StoredSession> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id, is_admin_mode) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id.map(|id| id.0))
            .bind(is_admin_mode)
            .execute(&self.pool)
            .await
            .context("failed to create session")?;
        Ok(StoredSession {
            token,
            user_id,
            is_admin_mode,
        })
    }

    pub async fn session(&self, token: &str) -> Result<Option<StoredSession>> {
        let row = sqlx::query("SELECT token, user_id, is_admin_mode FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| StoredSession {
            token: r.get::<String, _>(0),
            user_id: r.get::<Option<i64>, _>(1).map(UserId),
            is_admin_mode: r.get::<bool, _>(2),
        }))
    }

    pub async fn update_session(
        &self,
        token: &str,
        user_id: Option<UserId>,
        is_admin_mode: bool,
    ) -> Result<()> {
        sqlx::query("UPDATE sessions SET user_id = ?, is_admin_mode = ? WHERE token = ?")
            .bind(user_id.map(|id| id.0))
            .bind(is_admin_mode)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lists an owner's openings (`None` = public) with nested variations,
    /// ordered white before black, then by position.
    pub async fn list_openings(
        &self,
        owner: Option<UserId>,
        favorites_only: bool,
    ) -> Result<Vec<Opening>> {
        let owner_id = owner.map(|id| id.0);
        let opening_rows = sqlx::query(&format!(
            "SELECT {OPENING_COLUMNS} FROM openings
             WHERE user_id IS ? AND (? = 0 OR is_favorite = 1)
             ORDER BY CASE side WHEN 'white' THEN 0 ELSE 1 END, position, id"
        ))
        .bind(owner_id)
        .bind(favorites_only)
        .fetch_all(&self.pool)
        .await?;

        let variation_rows = sqlx::query(
            "SELECT v.id, v.opening_id, v.name, v.moves, v.lichess_link, v.image_filename, v.notes, v.position, v.updated_at
             FROM variations v
             INNER JOIN openings o ON o.id = v.opening_id
             WHERE o.user_id IS ?
             ORDER BY v.position, v.id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let tutorial_rows = sqlx::query(
            "SELECT t.variation_id, t.url
             FROM tutorial_links t
             INNER JOIN variations v ON v.id = t.variation_id
             INNER JOIN openings o ON o.id = v.opening_id
             WHERE o.user_id IS ?
             ORDER BY t.position, t.id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        assemble_openings(opening_rows, variation_rows, tutorial_rows)
    }

    pub async fn opening(&self, opening_id: OpeningId) -> Result<Option<Opening>> {
        let Some(opening_row) = sqlx::query(&format!(
            "SELECT {OPENING_COLUMNS} FROM openings WHERE id = ?"
        ))
        .bind(opening_id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let variation_rows = sqlx::query(
            "SELECT id, opening_id, name, moves, lichess_link, image_filename, notes, position, updated_at
             FROM variations WHERE opening_id = ?
             ORDER BY position, id",
        )
        .bind(opening_id.0)
        .fetch_all(&self.pool)
        .await?;

        let tutorial_rows = sqlx::query(
            "SELECT t.variation_id, t.url
             FROM tutorial_links t
             INNER JOIN variations v ON v.id = t.variation_id
             WHERE v.opening_id = ?
             ORDER BY t.position, t.id",
        )
        .bind(opening_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut openings = assemble_openings(vec![opening_row], variation_rows, tutorial_rows)?;
        Ok(openings.pop())
    }

    pub async fn opening_record(&self, opening_id: OpeningId) -> Result<Option<OpeningRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {OPENING_COLUMNS} FROM openings WHERE id = ?"
        ))
        .bind(opening_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| opening_record_from_row(&r)).transpose()
    }

    pub async fn opening_records(&self, opening_ids: &[OpeningId]) -> Result<Vec<OpeningRecord>> {
        let mut records = Vec::with_capacity(opening_ids.len());
        for opening_id in opening_ids {
            if let Some(record) = self.opening_record(*opening_id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub async fn find_opening(
        &self,
        owner: Option<UserId>,
        name: &str,
        side: Side,
    ) -> Result<Option<OpeningId>> {
        let row = sqlx::query("SELECT id FROM openings WHERE user_id IS ? AND name = ? AND side = ?")
            .bind(owner.map(|id| id.0))
            .bind(name)
            .bind(side.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| OpeningId(r.get::<i64, _>(0))))
    }

    /// Inserts an opening at the end of its owner/side partition.
    pub async fn create_opening(
        &self,
        owner: Option<UserId>,
        name: &str,
        side: Side,
    ) -> Result<OpeningId> {
        let mut tx = self.pool.begin().await?;
        let opening_id = insert_opening_row(&mut tx, owner, name, side, Utc::now()).await?;
        tx.commit().await?;
        Ok(opening_id)
    }

    pub async fn rename_opening(&self, opening_id: OpeningId, name: &str) -> Result<()> {
        sqlx::query("UPDATE openings SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(opening_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Flips the favorite flag and returns its new value.
    pub async fn toggle_favorite(&self, opening_id: OpeningId) -> Result<bool> {
        let row = sqlx::query(
            "UPDATE openings SET is_favorite = 1 - is_favorite, updated_at = ?
             WHERE id = ?
             RETURNING is_favorite",
        )
        .bind(Utc::now())
        .bind(opening_id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| anyhow!("opening {opening_id} not found"))?;
        Ok(row.get::<bool, _>(0))
    }

    /// Deletes an opening and its variations, returning the image filenames
    /// the removed variations referenced.
    pub async fn delete_opening(&self, opening_id: OpeningId) -> Result<Vec<String>> {
        self.delete_many(&[opening_id], &[]).await
    }

    pub async fn delete_variation(&self, variation_id: VariationId) -> Result<Vec<String>> {
        self.delete_many(&[], &[variation_id]).await
    }

    /// Deletes the given variations and openings (cascading) in one transaction.
    pub async fn delete_many(
        &self,
        opening_ids: &[OpeningId],
        variation_ids: &[VariationId],
    ) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        let mut images = Vec::new();

        for variation_id in variation_ids {
            let row = sqlx::query("DELETE FROM variations WHERE id = ? RETURNING image_filename")
                .bind(variation_id.0)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(image) = row.and_then(|r| r.get::<Option<String>, _>(0)) {
                images.push(image);
            }
        }

        for opening_id in opening_ids {
            let rows = sqlx::query(
                "SELECT image_filename FROM variations WHERE opening_id = ? AND image_filename IS NOT NULL",
            )
            .bind(opening_id.0)
            .fetch_all(&mut *tx)
            .await?;
            images.extend(rows.into_iter().map(|r| r.get::<String, _>(0)));

            sqlx::query("DELETE FROM openings WHERE id = ?")
                .bind(opening_id.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await.context("failed to commit deletion")?;
        Ok(images)
    }

    pub async fn variation_record(
        &self,
        variation_id: VariationId,
    ) -> Result<Option<VariationRecord>> {
        let row = sqlx::query(
            "SELECT id, opening_id, name, moves, image_filename FROM variations WHERE id = ?",
        )
        .bind(variation_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| variation_record_from_row(&r)))
    }

    pub async fn variation_records(
        &self,
        variation_ids: &[VariationId],
    ) -> Result<Vec<VariationRecord>> {
        let mut records = Vec::with_capacity(variation_ids.len());
        for variation_id in variation_ids {
            if let Some(record) = self.variation_record(*variation_id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub async fn find_variation_named(
        &self,
        opening_id: OpeningId,
        name: &str,
    ) -> Result<Option<VariationRecord>> {
        let row = sqlx::query(
            "SELECT id, opening_id, name, moves, image_filename FROM variations
             WHERE opening_id = ? AND name = ?",
        )
        .bind(opening_id.0)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| variation_record_from_row(&r)))
    }

    pub async fn find_variation_with_moves(
        &self,
        opening_id: OpeningId,
        moves: &str,
    ) -> Result<Option<VariationRecord>> {
        let row = sqlx::query(
            "SELECT id, opening_id, name, moves, image_filename FROM variations
             WHERE opening_id = ? AND moves = ?",
        )
        .bind(opening_id.0)
        .bind(moves)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| variation_record_from_row(&r)))
    }

    /// Inserts a variation at the end of its opening, together with its tutorials.
    pub async fn insert_variation(&self, new: NewVariation<'_>) -> Result<VariationId> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let variation_id = insert_variation_row(&mut tx, &new, now).await?;
        touch_opening(&mut tx, new.opening_id, now).await?;
        tx.commit().await?;
        Ok(variation_id)
    }

    /// Creates an opening together with all of its variations. Either the
    /// whole copy lands or nothing does. `opening_id` of each variation is
    /// ignored.
    pub async fn create_opening_with_variations(
        &self,
        owner: Option<UserId>,
        name: &str,
        side: Side,
        variations: &[NewVariation<'_>],
    ) -> Result<OpeningId> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let opening_id = insert_opening_row(&mut tx, owner, name, side, now).await?;
        for variation in variations {
            let new = NewVariation {
                opening_id,
                ..variation.clone()
            };
            insert_variation_row(&mut tx, &new, now).await?;
        }
        tx.commit().await?;
        Ok(opening_id)
    }

    pub async fn update_variation(
        &self,
        variation_id: VariationId,
        changes: VariationChanges<'_>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let (set_image, image) = match changes.image {
            ImageChange::Keep => (false, None),
            ImageChange::Replace(filename) => (true, Some(filename)),
            ImageChange::Remove => (true, None),
        };
        let row = sqlx::query(
            "UPDATE variations
             SET name = COALESCE(?, name),
                 moves = ?,
                 lichess_link = ?,
                 notes = ?,
                 image_filename = CASE WHEN ? THEN ? ELSE image_filename END,
                 updated_at = ?
             WHERE id = ?
             RETURNING opening_id",
        )
        .bind(changes.name)
        .bind(changes.moves)
        .bind(changes.lichess_link)
        .bind(changes.notes)
        .bind(set_image)
        .bind(image)
        .bind(now)
        .bind(variation_id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| anyhow!("variation {variation_id} not found"))?;
        let opening_id = OpeningId(row.get::<i64, _>(0));

        replace_tutorials(&mut tx, variation_id, changes.tutorials).await?;
        touch_opening(&mut tx, opening_id, now).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn count_image_references(&self, filename: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM variations WHERE image_filename = ?")
            .bind(filename)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn opening_ids_in_partition(
        &self,
        owner: Option<UserId>,
        side: Side,
    ) -> Result<Vec<OpeningId>> {
        let rows = sqlx::query(
            "SELECT id FROM openings WHERE user_id IS ? AND side = ? ORDER BY position, id",
        )
        .bind(owner.map(|id| id.0))
        .bind(side.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| OpeningId(r.get::<i64, _>(0)))
            .collect())
    }

    pub async fn variation_ids_for_opening(&self, opening_id: OpeningId) -> Result<Vec<VariationId>> {
        let rows = sqlx::query("SELECT id FROM variations WHERE opening_id = ? ORDER BY position, id")
            .bind(opening_id.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| VariationId(r.get::<i64, _>(0)))
            .collect())
    }

    pub async fn reorder_openings(
        &self,
        owner: Option<UserId>,
        side: Side,
        positions: &[PositionAssignment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        for assignment in positions {
            sqlx::query(
                "UPDATE openings SET position = ?, updated_at = ?
                 WHERE id = ? AND user_id IS ? AND side = ?",
            )
            .bind(assignment.position)
            .bind(now)
            .bind(assignment.id)
            .bind(owner.map(|id| id.0))
            .bind(side.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await.context("failed to commit opening order")?;
        Ok(())
    }

    pub async fn reorder_variations(
        &self,
        opening_id: OpeningId,
        positions: &[PositionAssignment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        for assignment in positions {
            sqlx::query(
                "UPDATE variations SET position = ?, updated_at = ? WHERE id = ? AND opening_id = ?",
            )
            .bind(assignment.position)
            .bind(now)
            .bind(assignment.id)
            .bind(opening_id.0)
            .execute(&mut *tx)
            .await?;
        }
        touch_opening(&mut tx, opening_id, now).await?;
        tx.commit().await.context("failed to commit variation order")?;
        Ok(())
    }

    pub async fn count_variations(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM variations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn insert_opening_row(
    tx: &mut Transaction<'_, Sqlite>,
    owner: Option<UserId>,
    name: &str,
    side: Side,
    now: DateTime<Utc>,
) -> Result<OpeningId> {
    let rec = sqlx::query(
        "INSERT INTO openings (user_id, name, side, is_favorite, position, updated_at)
         VALUES (?1, ?2, ?3, 0,
                 (SELECT COALESCE(MAX(position), -1) + 1 FROM openings WHERE user_id IS ?1 AND side = ?3),
                 ?4)
         RETURNING id",
    )
    .bind(owner.map(|id| id.0))
    .bind(name)
    .bind(side.as_str())
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("failed to create opening '{name}'"))?;
    Ok(OpeningId(rec.get::<i64, _>(0)))
}

async fn insert_variation_row(
    tx: &mut Transaction<'_, Sqlite>,
    new: &NewVariation<'_>,
    now: DateTime<Utc>,
) -> Result<VariationId> {
    let rec = sqlx::query(
        "INSERT INTO variations (opening_id, name, moves, lichess_link, image_filename, notes, position, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                 (SELECT COALESCE(MAX(position), -1) + 1 FROM variations WHERE opening_id = ?1),
                 ?7)
         RETURNING id",
    )
    .bind(new.opening_id.0)
    .bind(new.name)
    .bind(new.moves)
    .bind(new.lichess_link)
    .bind(new.image_filename)
    .bind(new.notes)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert variation")?;
    let variation_id = VariationId(rec.get::<i64, _>(0));
    replace_tutorials(tx, variation_id, new.tutorials).await?;
    Ok(variation_id)
}

async fn replace_tutorials(
    tx: &mut Transaction<'_, Sqlite>,
    variation_id: VariationId,
    tutorials: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM tutorial_links WHERE variation_id = ?")
        .bind(variation_id.0)
        .execute(&mut **tx)
        .await?;
    for (position, url) in tutorials.iter().enumerate() {
        sqlx::query("INSERT INTO tutorial_links (variation_id, url, position) VALUES (?, ?, ?)")
            .bind(variation_id.0)
            .bind(url)
            .bind(position as i64)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn touch_opening(
    tx: &mut Transaction<'_, Sqlite>,
    opening_id: OpeningId,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE openings SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(opening_id.0)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn user_from_row(row: &SqliteRow) -> StoredUser {
    StoredUser {
        id: UserId(row.get::<i64, _>(0)),
        username: row.get::<String, _>(1),
        password_hash: row.get::<String, _>(2),
    }
}

fn parse_side(raw: &str) -> Result<Side> {
    raw.parse::<Side>()
        .map_err(|e| anyhow!("corrupt side column: {e}"))
}

fn opening_record_from_row(row: &SqliteRow) -> Result<OpeningRecord> {
    Ok(OpeningRecord {
        id: OpeningId(row.get::<i64, _>(0)),
        owner: row.get::<Option<i64>, _>(1).map(UserId),
        name: row.get::<String, _>(2),
        side: parse_side(&row.get::<String, _>(3))?,
        is_favorite: row.get::<bool, _>(4),
        position: row.get::<i64, _>(5),
        updated_at: row.get::<DateTime<Utc>, _>(6),
    })
}

fn variation_record_from_row(row: &SqliteRow) -> VariationRecord {
    VariationRecord {
        id: VariationId(row.get::<i64, _>(0)),
        opening_id: OpeningId(row.get::<i64, _>(1)),
        name: row.get::<String, _>(2),
        moves: row.get::<String, _>(3),
        image_filename: row.get::<Option<String>, _>(4),
    }
}

fn assemble_openings(
    opening_rows: Vec<SqliteRow>,
    variation_rows: Vec<SqliteRow>,
    tutorial_rows: Vec<SqliteRow>,
) -> Result<Vec<Opening>> {
    let mut tutorials: HashMap<i64, Vec<String>> = HashMap::new();
    for row in tutorial_rows {
        tutorials
            .entry(row.get::<i64, _>(0))
            .or_default()
            .push(row.get::<String, _>(1));
    }

    let mut variations: HashMap<i64, Vec<Variation>> = HashMap::new();
    for row in variation_rows {
        let id = row.get::<i64, _>(0);
        let opening_id = row.get::<i64, _>(1);
        variations.entry(opening_id).or_default().push(Variation {
            id: VariationId(id),
            opening_id: OpeningId(opening_id),
            name: row.get::<String, _>(2),
            moves: row.get::<String, _>(3),
            lichess_link: row.get::<String, _>(4),
            image_filename: row.get::<Option<String>, _>(5),
            tutorials: tutorials.remove(&id).unwrap_or_default(),
            notes: row.get::<Option<String>, _>(6),
            position: row.get::<i64, _>(7),
            updated_at: row.get::<DateTime<Utc>, _>(8),
        });
    }

    opening_rows
        .iter()
        .map(|row| {
            let record = opening_record_from_row(row)?;
            Ok(Opening {
                id: record.id,
                name: record.name,
                side: record.side,
                is_favorite: record.is_favorite,
                position: record.position,
                updated_at: record.updated_at,
                variations: variations.remove(&record.id.0).unwrap_or_default(),
            })
        })
        .collect()
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
