use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category assigned to channels without a group
pub const DEFAULT_CATEGORY: &str = "Geral";

/// Pseudo-category that selects every channel
pub const ALL_CATEGORIES: &str = "Todos";

/// Category assigned to entries flagged with `radio="true"`
pub const RADIO_CATEGORY: &str = "Rádio";

/// Current time as Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A playable IPTV channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub is_live: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvg_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvg_logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvg_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    /// Unix millis of the last playback, 0 if never watched
    #[serde(default)]
    pub last_watched: i64,
    pub added_date: i64,
}

impl Channel {
    /// New active live channel with defaults for everything but name and URL
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            url: url.into(),
            category: DEFAULT_CATEGORY.to_string(),
            logo_url: None,
            is_live: true,
            is_favorite: false,
            group_title: None,
            tvg_id: None,
            tvg_logo: None,
            tvg_name: None,
            language: None,
            country: None,
            is_active: true,
            sort_order: 0,
            last_watched: 0,
            added_date: now_millis(),
        }
    }

    /// Name shown to the user: `tvg-name` when present, otherwise the title
    pub fn display_name(&self) -> &str {
        match self.tvg_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.name,
        }
    }

    /// Logo shown to the user: `tvg-logo` when present, otherwise the logo URL
    pub fn display_logo(&self) -> Option<&str> {
        match self.tvg_logo.as_deref() {
            Some(logo) if !logo.trim().is_empty() => Some(logo),
            _ => self.logo_url.as_deref(),
        }
    }

    /// Whether the channel can be played
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.url.trim().is_empty() && self.is_active
    }

    pub fn toggled_favorite(&self) -> Self {
        Self {
            is_favorite: !self.is_favorite,
            ..self.clone()
        }
    }

    pub fn marked_as_watched(&self) -> Self {
        Self {
            last_watched: now_millis(),
            ..self.clone()
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Channel(id={}, name='{}', category='{}', isLive={}, sortOrder={})",
            self.id, self.name, self.category, self.is_live, self.sort_order
        )
    }
}

/// Free channels bundled with the app, used when the store is empty
pub fn default_channels() -> Vec<Channel> {
    let entry = |id: i64, name: &str, description: &str, url: &str, category: &str, logo: &str, country: &str| Channel {
        id,
        description: description.to_string(),
        category: category.to_string(),
        logo_url: Some(logo.to_string()),
        country: Some(country.to_string()),
        language: Some("English".to_string()),
        sort_order: id as i32,
        ..Channel::new(name, url)
    };

    vec![
        entry(
            1,
            "Red Bull TV",
            "Esportes radicais e eventos",
            "https://rbmn-live.akamaized.net/hls/live/590964/BoRB-AT/master.m3u8",
            "Esportes",
            "https://i.imgur.com/BcXewtB.png",
            "Austria",
        ),
        entry(
            2,
            "RT News",
            "Russia Today - Notícias 24/7",
            "https://rt-glb.rttv.com/live/rtnews/playlist.m3u8",
            "Notícias",
            "https://i.imgur.com/QX5hWvW.png",
            "Russia",
        ),
        entry(
            3,
            "Al Jazeera English",
            "Canal de notícias internacional",
            "https://live-hls-web-aje.getaj.net/AJE/index.m3u8",
            "Notícias",
            "https://i.imgur.com/7V012zQ.png",
            "Qatar",
        ),
        entry(
            4,
            "Fashion TV",
            "Moda e estilo de vida",
            "https://fashiontv-fashiontv-1-eu.rakuten.wurl.tv/playlist.m3u8",
            "Estilo",
            "https://i.imgur.com/fYQkS6L.png",
            "France",
        ),
        entry(
            5,
            "Bloomberg TV",
            "Notícias financeiras",
            "https://bloomberg.com/media-manifest/streams/phoenix-us.m3u8",
            "Economia",
            "https://i.imgur.com/OuogLHX.png",
            "USA",
        ),
    ]
}

/// Default channels grouped by category
pub fn default_channels_by_category() -> BTreeMap<String, Vec<Channel>> {
    group_by_category(default_channels())
}

/// Distinct, sorted categories of the default channels
pub fn default_categories() -> Vec<String> {
    default_channels_by_category().into_keys().collect()
}

/// Group channels by category, categories sorted alphabetically
pub fn group_by_category(channels: Vec<Channel>) -> BTreeMap<String, Vec<Channel>> {
    let mut grouped: BTreeMap<String, Vec<Channel>> = BTreeMap::new();
    for channel in channels {
        grouped.entry(channel.category.clone()).or_default().push(channel);
    }
    grouped
}

/// Playlist statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistStats {
    pub total_channels: usize,
    pub categories: BTreeMap<String, usize>,
    pub countries: Vec<String>,
    pub languages: Vec<String>,
    pub live_channels: usize,
    pub vod_channels: usize,
}

impl PlaylistStats {
    /// Aggregate stats over a channel list
    pub fn from_channels(channels: &[Channel]) -> Self {
        let mut stats = PlaylistStats {
            total_channels: channels.len(),
            ..Default::default()
        };

        for channel in channels {
            *stats.categories.entry(channel.category.clone()).or_insert(0) += 1;

            if let Some(country) = &channel.country {
                if !stats.countries.contains(country) {
                    stats.countries.push(country.clone());
                }
            }
            if let Some(language) = &channel.language {
                if !stats.languages.contains(language) {
                    stats.languages.push(language.clone());
                }
            }

            if channel.is_live {
                stats.live_channels += 1;
            } else {
                stats.vod_channels += 1;
            }
        }

        stats
    }

    pub fn has_valid_data(&self) -> bool {
        self.total_channels > 0
    }

    /// Human readable summary, e.g. "3 canais em 2 categorias (todos ao vivo)"
    pub fn summary(&self) -> String {
        let mut out = format!("{} canais", self.total_channels);
        if !self.categories.is_empty() {
            out.push_str(&format!(" em {} categorias", self.categories.len()));
        }
        if !self.countries.is_empty() {
            out.push_str(&format!(", {} países", self.countries.len()));
        }
        if self.live_channels > 0 && self.vod_channels > 0 {
            out.push_str(&format!(
                " ({} ao vivo, {} VOD)",
                self.live_channels, self.vod_channels
            ));
        } else if self.live_channels > 0 {
            out.push_str(" (todos ao vivo)");
        } else if self.vod_channels > 0 {
            out.push_str(" (todos VOD)");
        }
        out
    }
}

/// Outcome of a playlist update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistUpdateResult {
    pub success: bool,
    pub total_channels: usize,
    pub new_channels: usize,
    pub updated_channels: usize,
    pub categories_count: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// SHA-1 of the imported playlist text
    pub content_hash: String,
}

impl PlaylistUpdateResult {
    /// Failed update carrying the user-facing error text
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: error.clone(),
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn has_new_content(&self) -> bool {
        self.new_channels > 0 || self.updated_channels > 0
    }
}

/// Result of probing a playlist URL
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistTestResult {
    pub success: bool,
    pub http_code: u16,
    pub http_message: String,
    pub response_time_ms: u64,
    pub content_type: String,
    pub content_length: i64,
    pub server_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub has_valid_content: bool,
    pub content_preview: String,
    pub estimated_channels: usize,
}

impl Default for PlaylistTestResult {
    fn default() -> Self {
        Self {
            success: false,
            http_code: 0,
            http_message: String::new(),
            response_time_ms: 0,
            content_type: String::new(),
            content_length: -1,
            server_info: String::new(),
            error: None,
            has_valid_content: false,
            content_preview: String::new(),
            estimated_channels: 0,
        }
    }
}

impl PlaylistTestResult {
    pub fn is_accessible(&self) -> bool {
        self.success && self.http_code == 200
    }

    pub fn is_playlist_valid(&self) -> bool {
        self.is_accessible() && self.has_valid_content
    }

    pub fn summary(&self) -> String {
        if !self.success {
            if self.http_code > 0 {
                return format!("HTTP {} - {}", self.http_code, self.http_message);
            }
            return self
                .error
                .clone()
                .unwrap_or_else(|| "Erro de conexão".to_string());
        }
        if !self.is_accessible() {
            return format!("HTTP {} - {}", self.http_code, self.http_message);
        }
        if !self.has_valid_content {
            return "URL acessível mas não é uma playlist M3U válida".to_string();
        }
        format!(
            "Playlist válida com aproximadamente {} canais",
            self.estimated_channels
        )
    }
}

/// Browsing filter combining category, favorites, live-only and text search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFilter {
    pub category: String,
    pub only_favorites: bool,
    pub only_live: bool,
    pub search_query: String,
}

impl Default for ChannelFilter {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            only_favorites: false,
            only_live: false,
            search_query: String::new(),
        }
    }
}

impl ChannelFilter {
    pub fn matches(&self, channel: &Channel) -> bool {
        let category_match = self.category == ALL_CATEGORIES || channel.category == self.category;
        let favorite_match = !self.only_favorites || channel.is_favorite;
        let live_match = !self.only_live || channel.is_live;

        let query = self.search_query.trim().to_lowercase();
        let search_match = query.is_empty()
            || channel.name.to_lowercase().contains(&query)
            || channel.description.to_lowercase().contains(&query);

        category_match && favorite_match && live_match && search_match
    }
}
