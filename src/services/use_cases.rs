//! Use cases consumed by the view model and the CLI

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{Channel, ChannelFilter, PlaylistUpdateResult, ALL_CATEGORIES};
use crate::services::channel_repository::ChannelRepository;
use crate::services::xtream::{validate_credentials, XtreamCredentials, XtreamError};

/// Channel browsing with filtering and sorting
#[derive(Clone)]
pub struct GetChannels {
    repository: ChannelRepository,
}

impl GetChannels {
    pub fn new(repository: ChannelRepository) -> Self {
        Self { repository }
    }

    pub async fn all(&self) -> Result<Vec<Channel>> {
        self.repository.all_channels().await
    }

    /// "Todos" or a blank category selects every channel
    pub async fn by_category(&self, category: &str) -> Result<Vec<Channel>> {
        if category == ALL_CATEGORIES || category.trim().is_empty() {
            self.repository.all_channels().await
        } else {
            self.repository.channels_by_category(category).await
        }
    }

    pub async fn favorites(&self) -> Result<Vec<Channel>> {
        self.repository.favorite_channels().await
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Channel>> {
        self.repository.recently_watched(limit).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Channel>> {
        self.repository.search(query).await
    }

    pub async fn grouped_by_category(&self) -> Result<BTreeMap<String, Vec<Channel>>> {
        self.repository.channels_grouped_by_category().await
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        self.repository.categories().await
    }

    pub async fn filtered(&self, filter: &ChannelFilter) -> Result<Vec<Channel>> {
        let channels = self.repository.all_channels().await?;
        Ok(channels.into_iter().filter(|c| filter.matches(c)).collect())
    }
}

/// Playlist import and store maintenance
#[derive(Clone)]
pub struct UpdatePlaylist {
    repository: ChannelRepository,
}

impl UpdatePlaylist {
    pub fn new(repository: ChannelRepository) -> Self {
        Self { repository }
    }

    pub async fn from_url(
        &self,
        url: &str,
        username: &str,
        password: &str,
        replace_existing: bool,
    ) -> Result<PlaylistUpdateResult> {
        self.repository
            .update_playlist_from_url(url, username, password, replace_existing)
            .await
    }

    /// Import the M3U Plus playlist of an Xtream Codes account.
    ///
    /// The account is checked first: an inactive account aborts the import,
    /// other validation failures only warn since some panels disable the
    /// Player API while still serving playlists.
    pub async fn from_xtream(
        &self,
        host: &str,
        username: &str,
        password: &str,
        replace_existing: bool,
    ) -> Result<PlaylistUpdateResult> {
        let creds = XtreamCredentials::new(host, username, password);

        match validate_credentials(self.repository.playlist_service().client(), &creds).await {
            Ok(auth) => {
                tracing::info!(server = %creds.server, status = %auth.user_info.status, "Xtream account validated");
            }
            Err(e @ XtreamError::AccountInactive(_)) => {
                return Err(e).context("Conta Xtream inválida");
            }
            Err(e) => {
                tracing::warn!(server = %creds.server, "Xtream validation failed, fetching playlist anyway: {}", e);
            }
        }

        self.repository
            .update_playlist_from_url(&creds.playlist_url(), "", "", replace_existing)
            .await
    }

    pub async fn from_content(&self, content: &str, replace_existing: bool) -> Result<PlaylistUpdateResult> {
        self.repository
            .update_playlist_from_content(content, replace_existing)
            .await
    }

    pub async fn from_file(&self, path: &Path, replace_existing: bool) -> Result<PlaylistUpdateResult> {
        self.repository.import_playlist_file(path, replace_existing).await
    }

    pub async fn initialize_default_channels(&self) -> Result<bool> {
        self.repository.initialize_default_channels_if_needed().await
    }

    pub async fn clear_all_channels(&self) -> Result<u64> {
        self.repository.delete_all_channels().await
    }
}
