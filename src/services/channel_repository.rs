//! Channel repository: single access point combining the local store,
//! the playlist fetcher and the M3U parser.
//!
//! Every write bumps a revision published on a `watch` channel so views can
//! re-query after changes.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::watch;

use crate::db::repository::{channels, settings, ChannelWriter};
use crate::models::{
    default_channels, group_by_category, now_millis, Channel, PlaylistStats, PlaylistUpdateResult,
};
use crate::services::m3u_parser::{hash_content, M3UParser};
use crate::services::playlist_service::PlaylistService;

#[derive(Clone)]
pub struct ChannelRepository {
    pool: SqlitePool,
    playlist_service: PlaylistService,
    parser: M3UParser,
    revision: Arc<watch::Sender<u64>>,
}

impl ChannelRepository {
    pub fn new(pool: SqlitePool, playlist_service: PlaylistService) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            pool,
            playlist_service,
            parser: M3UParser::new(),
            revision: Arc::new(revision),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn playlist_service(&self) -> &PlaylistService {
        &self.playlist_service
    }

    /// Receiver that observes a new revision after every write
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn notify_changed(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    // ---- reads ----

    pub async fn all_channels(&self) -> Result<Vec<Channel>> {
        Ok(channels::get_all(&self.pool).await?)
    }

    pub async fn channels_by_category(&self, category: &str) -> Result<Vec<Channel>> {
        Ok(channels::get_by_category(&self.pool, category).await?)
    }

    pub async fn favorite_channels(&self) -> Result<Vec<Channel>> {
        Ok(channels::get_favorites(&self.pool).await?)
    }

    pub async fn recently_watched(&self, limit: i64) -> Result<Vec<Channel>> {
        Ok(channels::get_recently_watched(&self.pool, limit).await?)
    }

    /// Blank queries match nothing
    pub async fn search(&self, query: &str) -> Result<Vec<Channel>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(channels::search(&self.pool, query).await?)
    }

    pub async fn channel_by_id(&self, id: i64) -> Result<Option<Channel>> {
        Ok(channels::find_by_id(&self.pool, id).await?)
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        Ok(channels::get_categories(&self.pool).await?)
    }

    pub async fn active_count(&self) -> Result<i64> {
        Ok(channels::count_active(&self.pool).await?)
    }

    pub async fn has_channels(&self) -> Result<bool> {
        Ok(self.active_count().await? > 0)
    }

    pub async fn channels_grouped_by_category(&self) -> Result<BTreeMap<String, Vec<Channel>>> {
        Ok(group_by_category(self.all_channels().await?))
    }

    // ---- writes ----

    pub async fn insert_channel(&self, channel: &Channel) -> Result<i64> {
        let id = channels::insert(&self.pool, channel).await?;
        self.notify_changed();
        Ok(id)
    }

    pub async fn insert_channels(&self, list: &[Channel]) -> Result<usize> {
        let count = channels::insert_many(&self.pool, list).await?;
        self.notify_changed();
        Ok(count)
    }

    pub async fn update_channel(&self, channel: &Channel) -> Result<()> {
        channels::update(&self.pool, channel)
            .await
            .with_context(|| format!("Failed to update channel {}", channel.id))?;
        self.notify_changed();
        Ok(())
    }

    pub async fn toggle_favorite(&self, id: i64, is_favorite: bool) -> Result<()> {
        channels::set_favorite(&self.pool, id, is_favorite)
            .await
            .with_context(|| format!("Failed to set favorite on channel {}", id))?;
        self.notify_changed();
        Ok(())
    }

    /// Stamp the channel as watched now and remember it as the last one played
    pub async fn mark_channel_as_watched(&self, id: i64) -> Result<()> {
        channels::update_last_watched(&self.pool, id, now_millis())
            .await
            .with_context(|| format!("Failed to mark channel {} as watched", id))?;
        settings::set_last_watched_channel_id(&self.pool, id).await?;
        self.notify_changed();
        Ok(())
    }

    pub async fn delete_channel(&self, id: i64) -> Result<()> {
        channels::delete(&self.pool, id)
            .await
            .with_context(|| format!("Failed to delete channel {}", id))?;
        self.notify_changed();
        Ok(())
    }

    pub async fn delete_all_channels(&self) -> Result<u64> {
        let removed = channels::delete_all(&self.pool).await?;
        self.notify_changed();
        Ok(removed)
    }

    /// Seed the bundled free channels when the store is empty.
    /// Returns whether anything was inserted.
    pub async fn initialize_default_channels_if_needed(&self) -> Result<bool> {
        if self.active_count().await? > 0 {
            return Ok(false);
        }

        let defaults = default_channels();
        tracing::info!("Store empty, seeding {} default channels", defaults.len());
        self.insert_channels(&defaults).await?;
        Ok(true)
    }

    // ---- playlist import ----

    /// Download, parse and store a remote playlist
    pub async fn update_playlist_from_url(
        &self,
        url: &str,
        username: &str,
        password: &str,
        replace_existing: bool,
    ) -> Result<PlaylistUpdateResult> {
        let content = self
            .playlist_service
            .fetch_playlist(url, username, password)
            .await
            .context("Failed to fetch playlist")?;

        let parsed = self.parser.parse(&content).context("Failed to parse playlist")?;

        self.store_playlist(
            parsed,
            hash_content(&content),
            replace_existing,
            "Playlist atualizada com sucesso",
        )
        .await
    }

    /// Parse and store playlist text supplied directly
    pub async fn update_playlist_from_content(
        &self,
        content: &str,
        replace_existing: bool,
    ) -> Result<PlaylistUpdateResult> {
        if !self.parser.is_valid_m3u(content) {
            bail!("Conteúdo M3U inválido");
        }

        let parsed = self.parser.parse(content).context("Failed to parse playlist")?;

        self.store_playlist(parsed, hash_content(content), replace_existing, "Playlist atualizada")
            .await
    }

    /// Stream a local playlist file through the parser and store it
    pub async fn import_playlist_file(
        &self,
        path: &Path,
        replace_existing: bool,
    ) -> Result<PlaylistUpdateResult> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open playlist file {}", path.display()))?;

        let parsed = self
            .parser
            .parse_reader(BufReader::new(file))
            .await
            .with_context(|| format!("Failed to parse playlist file {}", path.display()))?;

        self.store_playlist(
            parsed.channels,
            parsed.content_hash,
            replace_existing,
            "Playlist importada",
        )
        .await
    }

    async fn store_playlist(
        &self,
        parsed: Vec<Channel>,
        content_hash: String,
        replace_existing: bool,
        message_prefix: &str,
    ) -> Result<PlaylistUpdateResult> {
        if parsed.is_empty() {
            bail!("Nenhum canal encontrado na playlist");
        }

        if settings::last_playlist_hash(&self.pool).await?.as_deref() == Some(content_hash.as_str()) {
            tracing::info!("Playlist content unchanged since last import");
        }

        let stats = PlaylistStats::from_channels(&parsed);

        let (new_channels, updated_channels) = if replace_existing {
            let inserted = channels::replace_all(&self.pool, &parsed)
                .await
                .context("Failed to replace channels")?;
            // Ids are reassigned, the remembered one may now name another stream
            settings::clear_last_watched_channel_id(&self.pool).await?;
            (inserted, 0)
        } else {
            self.merge(parsed).await.context("Failed to merge channels")?
        };

        settings::set_last_playlist_hash(&self.pool, &content_hash).await?;
        self.notify_changed();

        tracing::info!(
            total = stats.total_channels,
            new = new_channels,
            updated = updated_channels,
            replace = replace_existing,
            "Playlist stored"
        );

        Ok(PlaylistUpdateResult {
            success: true,
            total_channels: stats.total_channels,
            new_channels,
            updated_channels,
            categories_count: stats.categories.len(),
            message: format!("{}: {}", message_prefix, stats.summary()),
            error: None,
            content_hash,
        })
    }

    /// Update channels whose URL is already stored, insert the rest.
    /// User state (favorite, last watched, order) survives the update.
    async fn merge(&self, parsed: Vec<Channel>) -> Result<(usize, usize)> {
        let mut planned = Vec::with_capacity(parsed.len());
        for channel in parsed {
            let existing = channels::find_by_url(&self.pool, &channel.url).await?;
            planned.push((channel, existing));
        }

        let mut writer = ChannelWriter::begin(&self.pool).await?;
        for (channel, existing) in planned {
            match existing {
                Some(existing) => {
                    writer
                        .update(&Channel {
                            id: existing.id,
                            is_favorite: existing.is_favorite,
                            last_watched: existing.last_watched,
                            sort_order: existing.sort_order,
                            added_date: existing.added_date,
                            is_active: true,
                            ..channel
                        })
                        .await?;
                }
                None => {
                    writer.insert(&Channel { id: 0, ..channel }).await?;
                }
            }
        }

        Ok(writer.finish().await?)
    }

    // ---- navigation ----

    async fn navigation_list(&self, category: Option<&str>) -> Result<Vec<Channel>> {
        match category {
            Some(category) => self.channels_by_category(category).await,
            None => self.all_channels().await,
        }
    }

    /// Channel after `current_id`, wrapping to the first
    pub async fn next_channel(&self, current_id: i64, category: Option<&str>) -> Result<Option<Channel>> {
        let list = self.navigation_list(category).await?;
        let next = match list.iter().position(|c| c.id == current_id) {
            Some(idx) if idx + 1 < list.len() => list.get(idx + 1),
            _ => list.first(),
        };
        Ok(next.cloned())
    }

    /// Channel before `current_id`, wrapping to the last
    pub async fn previous_channel(&self, current_id: i64, category: Option<&str>) -> Result<Option<Channel>> {
        let list = self.navigation_list(category).await?;
        let previous = match list.iter().position(|c| c.id == current_id) {
            Some(idx) if idx > 0 => list.get(idx - 1),
            _ => list.last(),
        };
        Ok(previous.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::pool::test_pool;
    use std::io::Write;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAYLIST: &str = "#EXTM3U\n\
#EXTINF:-1 group-title=\"News\",Alpha\nhttp://s/alpha\n\
#EXTINF:-1 group-title=\"News\",Beta\nhttp://s/beta\n\
#EXTINF:120 group-title=\"Movies\",Gamma\nhttp://s/gamma\n";

    async fn repository() -> ChannelRepository {
        let config = Config::for_tests();
        ChannelRepository::new(test_pool().await, PlaylistService::new(&config).unwrap())
    }

    fn names(list: &[Channel]) -> Vec<&str> {
        list.iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initialize_defaults_only_when_empty() {
        let repo = repository().await;

        assert!(repo.initialize_default_channels_if_needed().await.unwrap());
        assert_eq!(repo.active_count().await.unwrap(), 5);
        assert!(!repo.initialize_default_channels_if_needed().await.unwrap());
        assert_eq!(repo.active_count().await.unwrap(), 5);

        let grouped = repo.channels_grouped_by_category().await.unwrap();
        let keys: Vec<&String> = grouped.keys().collect();
        assert_eq!(keys, vec!["Economia", "Esportes", "Estilo", "Notícias"]);
    }

    #[tokio::test]
    async fn test_update_from_content_replace() {
        let repo = repository().await;
        repo.initialize_default_channels_if_needed().await.unwrap();

        let result = repo.update_playlist_from_content(PLAYLIST, true).await.unwrap();
        assert!(result.success);
        assert_eq!(result.total_channels, 3);
        assert_eq!(result.new_channels, 3);
        assert_eq!(result.updated_channels, 0);
        assert_eq!(result.categories_count, 2);
        assert_eq!(result.content_hash, hash_content(PLAYLIST));
        assert!(result.message.starts_with("Playlist atualizada: 3 canais em 2 categorias"));

        let all = repo.all_channels().await.unwrap();
        assert_eq!(names(&all), vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(
            settings::last_playlist_hash(repo.pool()).await.unwrap(),
            Some(hash_content(PLAYLIST))
        );
    }

    #[tokio::test]
    async fn test_update_from_content_rejects_invalid() {
        let repo = repository().await;
        let err = repo
            .update_playlist_from_content("not a playlist", true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Conteúdo M3U inválido");
        assert_eq!(repo.active_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_merge_keeps_user_state() {
        let repo = repository().await;
        repo.update_playlist_from_content(PLAYLIST, true).await.unwrap();

        let beta = repo.search("Beta").await.unwrap().remove(0);
        repo.toggle_favorite(beta.id, true).await.unwrap();
        repo.mark_channel_as_watched(beta.id).await.unwrap();

        let updated = "#EXTM3U\n\
#EXTINF:-1 group-title=\"Headlines\",Beta HD\nhttp://s/beta\n\
#EXTINF:-1,Delta\nhttp://s/delta\n";
        let result = repo.update_playlist_from_content(updated, false).await.unwrap();
        assert_eq!(result.new_channels, 1);
        assert_eq!(result.updated_channels, 1);
        assert!(result.has_new_content());

        assert_eq!(repo.active_count().await.unwrap(), 4);
        let merged = repo.channel_by_id(beta.id).await.unwrap().unwrap();
        assert_eq!(merged.name, "Beta HD");
        assert_eq!(merged.category, "Headlines");
        assert!(merged.is_favorite);
        assert!(merged.last_watched > 0);
    }

    #[tokio::test]
    async fn test_replace_forgets_last_watched_merge_keeps_it() {
        let repo = repository().await;
        repo.update_playlist_from_content(PLAYLIST, true).await.unwrap();
        let beta = repo.search("Beta").await.unwrap().remove(0);
        repo.mark_channel_as_watched(beta.id).await.unwrap();

        repo.update_playlist_from_content(PLAYLIST, false).await.unwrap();
        assert_eq!(
            settings::last_watched_channel_id(repo.pool()).await.unwrap(),
            Some(beta.id)
        );

        repo.update_playlist_from_content(PLAYLIST, true).await.unwrap();
        assert_eq!(settings::last_watched_channel_id(repo.pool()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_merge_reactivates_inactive_channel() {
        let repo = repository().await;
        repo.update_playlist_from_content(PLAYLIST, true).await.unwrap();
        let gamma = repo.search("Gamma").await.unwrap().remove(0);

        channels::deactivate(repo.pool(), gamma.id).await.unwrap();
        assert_eq!(repo.active_count().await.unwrap(), 2);

        let result = repo.update_playlist_from_content(PLAYLIST, false).await.unwrap();
        assert_eq!(result.new_channels, 0);
        assert_eq!(result.updated_channels, 3);

        let restored = repo.channel_by_id(gamma.id).await.unwrap().unwrap();
        assert!(restored.is_active);
        assert_eq!(repo.active_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_from_url() {
        let server = MockServer::start().await;
        Mock::given(path("/list.m3u"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
            .mount(&server)
            .await;

        let repo = repository().await;
        let result = repo
            .update_playlist_from_url(&format!("{}/list.m3u", server.uri()), "", "", true)
            .await
            .unwrap();

        assert_eq!(result.total_channels, 3);
        assert!(result.message.starts_with("Playlist atualizada com sucesso: "));
        assert_eq!(repo.categories().await.unwrap(), vec!["Movies", "News"]);
    }

    #[tokio::test]
    async fn test_update_from_url_failure_keeps_store() {
        let server = MockServer::start().await;
        Mock::given(path("/list.m3u"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let repo = repository().await;
        repo.initialize_default_channels_if_needed().await.unwrap();

        let err = repo
            .update_playlist_from_url(&format!("{}/list.m3u", server.uri()), "", "", true)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("404"));
        assert_eq!(repo.active_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_import_playlist_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PLAYLIST.as_bytes()).unwrap();

        let repo = repository().await;
        let result = repo.import_playlist_file(file.path(), true).await.unwrap();
        assert_eq!(result.total_channels, 3);
        assert_eq!(result.content_hash, hash_content(PLAYLIST));

        let missing = repo
            .import_playlist_file(Path::new("/nonexistent/list.m3u"), true)
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_next_and_previous_wrap() {
        let repo = repository().await;
        repo.update_playlist_from_content(PLAYLIST, true).await.unwrap();
        let all = repo.all_channels().await.unwrap();
        let (alpha, beta, gamma) = (all[0].id, all[1].id, all[2].id);

        let next = |id| repo.next_channel(id, None);
        assert_eq!(next(alpha).await.unwrap().unwrap().id, beta);
        assert_eq!(next(gamma).await.unwrap().unwrap().id, alpha);
        assert_eq!(next(999).await.unwrap().unwrap().id, alpha);

        let prev = |id| repo.previous_channel(id, None);
        assert_eq!(prev(beta).await.unwrap().unwrap().id, alpha);
        assert_eq!(prev(alpha).await.unwrap().unwrap().id, gamma);
        assert_eq!(prev(999).await.unwrap().unwrap().id, gamma);

        let in_news = repo.next_channel(beta, Some("News")).await.unwrap().unwrap();
        assert_eq!(in_news.id, alpha);
        assert!(repo.next_channel(alpha, Some("Nothing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writes_publish_revisions() {
        let repo = repository().await;
        let mut rx = repo.subscribe();
        let start = *rx.borrow_and_update();

        repo.initialize_default_channels_if_needed().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update() > start);

        repo.search("anything").await.unwrap();
        assert!(!rx.has_changed().unwrap());

        repo.delete_all_channels().await.unwrap();
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_search_and_mark_watched() {
        let repo = repository().await;
        repo.initialize_default_channels_if_needed().await.unwrap();

        assert!(repo.search("   ").await.unwrap().is_empty());
        let found = repo.search("bloomberg").await.unwrap();
        assert_eq!(names(&found), vec!["Bloomberg TV"]);

        repo.mark_channel_as_watched(found[0].id).await.unwrap();
        assert_eq!(
            settings::last_watched_channel_id(repo.pool()).await.unwrap(),
            Some(found[0].id)
        );
        assert_eq!(names(&repo.recently_watched(10).await.unwrap()), vec!["Bloomberg TV"]);

        assert!(repo.mark_channel_as_watched(999).await.is_err());
    }
}
