//! Channel repository for database operations

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::{Sqlite, Transaction};

use crate::db::models::{into_channels, ChannelRow};
use crate::db::RepositoryError;
use crate::models::Channel;

type Result<T> = std::result::Result<T, RepositoryError>;

/// Insert (or replace on id conflict) a channel on an open connection.
/// A zero id lets SQLite assign one.
async fn insert_on(conn: &mut SqliteConnection, channel: &Channel) -> Result<i64> {
    let id = (channel.id > 0).then_some(channel.id);

    let result = sqlx::query(
        r#"
        INSERT OR REPLACE INTO channels (id, name, description, url, category, logo_url, is_live,
                                         is_favorite, group_title, tvg_id, tvg_logo, tvg_name,
                                         language, country, is_active, sort_order, last_watched,
                                         added_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(id)
    .bind(&channel.name)
    .bind(&channel.description)
    .bind(&channel.url)
    .bind(&channel.category)
    .bind(&channel.logo_url)
    .bind(channel.is_live)
    .bind(channel.is_favorite)
    .bind(&channel.group_title)
    .bind(&channel.tvg_id)
    .bind(&channel.tvg_logo)
    .bind(&channel.tvg_name)
    .bind(&channel.language)
    .bind(&channel.country)
    .bind(channel.is_active)
    .bind(channel.sort_order)
    .bind(channel.last_watched)
    .bind(channel.added_date)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn update_on(conn: &mut SqliteConnection, channel: &Channel) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE channels SET
            name = $2, description = $3, url = $4, category = $5, logo_url = $6, is_live = $7,
            is_favorite = $8, group_title = $9, tvg_id = $10, tvg_logo = $11, tvg_name = $12,
            language = $13, country = $14, is_active = $15, sort_order = $16,
            last_watched = $17, added_date = $18
        WHERE id = $1
        "#,
    )
    .bind(channel.id)
    .bind(&channel.name)
    .bind(&channel.description)
    .bind(&channel.url)
    .bind(&channel.category)
    .bind(&channel.logo_url)
    .bind(channel.is_live)
    .bind(channel.is_favorite)
    .bind(&channel.group_title)
    .bind(&channel.tvg_id)
    .bind(&channel.tvg_logo)
    .bind(&channel.tvg_name)
    .bind(&channel.language)
    .bind(&channel.country)
    .bind(channel.is_active)
    .bind(channel.sort_order)
    .bind(channel.last_watched)
    .bind(channel.added_date)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}

/// Transactional batch writer for bulk channel imports.
/// Nothing is visible to readers until `finish` commits.
pub struct ChannelWriter {
    tx: Transaction<'static, Sqlite>,
    inserted: usize,
    updated: usize,
}

impl ChannelWriter {
    /// Open a transaction
    pub async fn begin(pool: &SqlitePool) -> Result<Self> {
        let tx = pool.begin().await?;
        Ok(Self {
            tx,
            inserted: 0,
            updated: 0,
        })
    }

    /// Remove every channel inside the transaction
    pub async fn delete_all(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM channels")
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert(&mut self, channel: &Channel) -> Result<i64> {
        let id = insert_on(&mut self.tx, channel).await?;
        self.inserted += 1;
        Ok(id)
    }

    pub async fn update(&mut self, channel: &Channel) -> Result<()> {
        update_on(&mut self.tx, channel).await?;
        self.updated += 1;
        Ok(())
    }

    /// Commit and return (inserted, updated) counts
    pub async fn finish(self) -> Result<(usize, usize)> {
        self.tx.commit().await?;
        Ok((self.inserted, self.updated))
    }
}

/// All active channels in display order
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<Channel>> {
    let rows = sqlx::query_as::<_, ChannelRow>(
        "SELECT * FROM channels WHERE is_active = 1 ORDER BY sort_order, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(into_channels(rows))
}

pub async fn get_by_category(pool: &SqlitePool, category: &str) -> Result<Vec<Channel>> {
    let rows = sqlx::query_as::<_, ChannelRow>(
        "SELECT * FROM channels WHERE category = $1 AND is_active = 1 ORDER BY sort_order, id",
    )
    .bind(category)
    .fetch_all(pool)
    .await?;

    Ok(into_channels(rows))
}

/// Favorites, most recently watched first
pub async fn get_favorites(pool: &SqlitePool) -> Result<Vec<Channel>> {
    let rows = sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT * FROM channels
        WHERE is_favorite = 1 AND is_active = 1
        ORDER BY last_watched DESC, sort_order, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(into_channels(rows))
}

pub async fn get_recently_watched(pool: &SqlitePool, limit: i64) -> Result<Vec<Channel>> {
    let rows = sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT * FROM channels
        WHERE last_watched > 0 AND is_active = 1
        ORDER BY last_watched DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(into_channels(rows))
}

/// Search name and description; names starting with the query rank first,
/// then display order
pub async fn search(pool: &SqlitePool, query: &str) -> Result<Vec<Channel>> {
    let rows = sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT * FROM channels
        WHERE is_active = 1
          AND (name LIKE '%' || $1 || '%' OR description LIKE '%' || $1 || '%')
        ORDER BY CASE WHEN name LIKE $1 || '%' THEN 1 ELSE 2 END, sort_order, id
        "#,
    )
    .bind(query)
    .fetch_all(pool)
    .await?;

    Ok(into_channels(rows))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Channel>> {
    let row = sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(Channel::from))
}

pub async fn find_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Channel>> {
    let row = sqlx::query_as::<_, ChannelRow>(
        "SELECT * FROM channels WHERE url = $1 ORDER BY id LIMIT 1",
    )
    .bind(url)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Channel::from))
}

/// Distinct categories of active channels, sorted
pub async fn get_categories(pool: &SqlitePool) -> Result<Vec<String>> {
    let categories = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT category FROM channels WHERE is_active = 1 ORDER BY category",
    )
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

/// Insert a channel, replacing any row with the same id
pub async fn insert(pool: &SqlitePool, channel: &Channel) -> Result<i64> {
    let mut conn = pool.acquire().await?;
    insert_on(&mut conn, channel).await
}

/// Insert a batch in one transaction
pub async fn insert_many(pool: &SqlitePool, channels: &[Channel]) -> Result<usize> {
    if channels.is_empty() {
        return Ok(0);
    }

    let mut writer = ChannelWriter::begin(pool).await?;
    for channel in channels {
        writer.insert(channel).await?;
    }
    let (inserted, _) = writer.finish().await?;

    Ok(inserted)
}

pub async fn update(pool: &SqlitePool, channel: &Channel) -> Result<()> {
    let mut conn = pool.acquire().await?;
    update_on(&mut conn, channel).await
}

/// Update a batch in one transaction
pub async fn update_many(pool: &SqlitePool, channels: &[Channel]) -> Result<usize> {
    if channels.is_empty() {
        return Ok(0);
    }

    let mut writer = ChannelWriter::begin(pool).await?;
    for channel in channels {
        writer.update(channel).await?;
    }
    let (_, updated) = writer.finish().await?;

    Ok(updated)
}

/// Delete every channel and insert the new list atomically
pub async fn replace_all(pool: &SqlitePool, channels: &[Channel]) -> Result<usize> {
    let mut writer = ChannelWriter::begin(pool).await?;
    writer.delete_all().await?;
    for channel in channels {
        writer.insert(channel).await?;
    }
    let (inserted, _) = writer.finish().await?;

    Ok(inserted)
}

/// Hide a channel without deleting it
pub async fn deactivate(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE channels SET is_active = 0 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM channels WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM channels").execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn set_favorite(pool: &SqlitePool, id: i64, is_favorite: bool) -> Result<()> {
    let result = sqlx::query("UPDATE channels SET is_favorite = $2 WHERE id = $1")
        .bind(id)
        .bind(is_favorite)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

pub async fn update_last_watched(pool: &SqlitePool, id: i64, timestamp: i64) -> Result<()> {
    let result = sqlx::query("UPDATE channels SET last_watched = $2 WHERE id = $1")
        .bind(id)
        .bind(timestamp)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

pub async fn update_sort_order(pool: &SqlitePool, id: i64, sort_order: i32) -> Result<()> {
    let result = sqlx::query("UPDATE channels SET sort_order = $2 WHERE id = $1")
        .bind(id)
        .bind(sort_order)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

pub async fn count_active(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels WHERE is_active = 1")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Active channels streaming from `url`
pub async fn count_with_url(pool: &SqlitePool, url: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels WHERE url = $1 AND is_active = 1")
        .bind(url)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Active channels grouped for reordering: category, then sort order
pub async fn get_all_for_reordering(pool: &SqlitePool) -> Result<Vec<Channel>> {
    let rows = sqlx::query_as::<_, ChannelRow>(
        "SELECT * FROM channels WHERE is_active = 1 ORDER BY category, sort_order, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(into_channels(rows))
}
