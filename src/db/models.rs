//! Database row types for SQLite
//!
//! These types map directly to database rows and convert to the
//! domain types in models/channel.rs

use sqlx::FromRow;

use crate::models::Channel;

/// Channel row from database
#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub url: String,
    pub category: String,
    pub logo_url: Option<String>,
    pub is_live: bool,
    pub is_favorite: bool,
    pub group_title: Option<String>,
    pub tvg_id: Option<String>,
    pub tvg_logo: Option<String>,
    pub tvg_name: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub last_watched: i64,
    pub added_date: i64,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Channel {
            id: row.id,
            name: row.name,
            description: row.description,
            url: row.url,
            category: row.category,
            logo_url: row.logo_url,
            is_live: row.is_live,
            is_favorite: row.is_favorite,
            group_title: row.group_title,
            tvg_id: row.tvg_id,
            tvg_logo: row.tvg_logo,
            tvg_name: row.tvg_name,
            language: row.language,
            country: row.country,
            is_active: row.is_active,
            sort_order: row.sort_order,
            last_watched: row.last_watched,
            added_date: row.added_date,
        }
    }
}

/// Convert a batch of rows to domain channels
pub fn into_channels(rows: Vec<ChannelRow>) -> Vec<Channel> {
    rows.into_iter().map(Channel::from).collect()
}
