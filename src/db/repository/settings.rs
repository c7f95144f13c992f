//! Settings repository: persisted user preferences as key/value rows

use sqlx::sqlite::SqlitePool;

use crate::db::RepositoryError;

type Result<T> = std::result::Result<T, RepositoryError>;

pub const KEY_PLAYLIST_URL: &str = "playlist_url";
pub const KEY_USERNAME: &str = "username";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_USE_AUTHENTICATION: &str = "use_authentication";
pub const KEY_LAST_WATCHED_CHANNEL_ID: &str = "last_watched_channel_id";
pub const KEY_FIRST_LAUNCH: &str = "first_launch";
pub const KEY_LAST_PLAYLIST_HASH: &str = "last_playlist_hash";

pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES ($1, $2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn clear_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM settings").execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn playlist_url(pool: &SqlitePool) -> Result<String> {
    Ok(get(pool, KEY_PLAYLIST_URL).await?.unwrap_or_default())
}

pub async fn set_playlist_url(pool: &SqlitePool, url: &str) -> Result<()> {
    set(pool, KEY_PLAYLIST_URL, url).await
}

/// Stored (username, password), empty strings when unset
pub async fn credentials(pool: &SqlitePool) -> Result<(String, String)> {
    let username = get(pool, KEY_USERNAME).await?.unwrap_or_default();
    let password = get(pool, KEY_PASSWORD).await?.unwrap_or_default();
    Ok((username, password))
}

pub async fn set_credentials(pool: &SqlitePool, username: &str, password: &str) -> Result<()> {
    set(pool, KEY_USERNAME, username).await?;
    set(pool, KEY_PASSWORD, password).await
}

pub async fn use_authentication(pool: &SqlitePool) -> Result<bool> {
    Ok(get(pool, KEY_USE_AUTHENTICATION).await?.as_deref() == Some("true"))
}

pub async fn set_use_authentication(pool: &SqlitePool, enabled: bool) -> Result<()> {
    set(pool, KEY_USE_AUTHENTICATION, if enabled { "true" } else { "false" }).await
}

pub async fn last_watched_channel_id(pool: &SqlitePool) -> Result<Option<i64>> {
    Ok(get(pool, KEY_LAST_WATCHED_CHANNEL_ID)
        .await?
        .and_then(|v| v.parse().ok()))
}

pub async fn set_last_watched_channel_id(pool: &SqlitePool, id: i64) -> Result<()> {
    set(pool, KEY_LAST_WATCHED_CHANNEL_ID, &id.to_string()).await
}

pub async fn clear_last_watched_channel_id(pool: &SqlitePool) -> Result<()> {
    remove(pool, KEY_LAST_WATCHED_CHANNEL_ID).await
}

/// True until explicitly cleared
pub async fn is_first_launch(pool: &SqlitePool) -> Result<bool> {
    Ok(get(pool, KEY_FIRST_LAUNCH).await?.as_deref() != Some("false"))
}

pub async fn set_first_launch(pool: &SqlitePool, first_launch: bool) -> Result<()> {
    set(pool, KEY_FIRST_LAUNCH, if first_launch { "true" } else { "false" }).await
}

pub async fn last_playlist_hash(pool: &SqlitePool) -> Result<Option<String>> {
    get(pool, KEY_LAST_PLAYLIST_HASH).await
}

pub async fn set_last_playlist_hash(pool: &SqlitePool, hash: &str) -> Result<()> {
    set(pool, KEY_LAST_PLAYLIST_HASH, hash).await
}
