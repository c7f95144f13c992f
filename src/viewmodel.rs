//! Main screen state holder.
//!
//! State lives in `watch` channels; front-ends subscribe and render whatever
//! the latest value is.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::db::repository::settings;
use crate::models::{Channel, PlaylistUpdateResult};
use crate::services::channel_repository::ChannelRepository;
use crate::services::player::{Player, PlayerEvent};
use crate::services::use_cases::UpdatePlaylist;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub is_loading: bool,
    pub error: Option<String>,
    pub message: Option<String>,
    pub show_settings: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub is_playing: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub volume: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_loading: false,
            error: None,
            volume: 1.0,
        }
    }
}

/// User-facing text of an error chain: the innermost cause
fn user_message(err: &anyhow::Error) -> String {
    err.root_cause().to_string()
}

pub struct MainViewModel {
    repository: ChannelRepository,
    update_playlist: UpdatePlaylist,
    player: Mutex<Box<dyn Player>>,
    ui_state: watch::Sender<UiState>,
    player_state: watch::Sender<PlayerState>,
    current_channel: watch::Sender<Option<Channel>>,
    channels: watch::Sender<Vec<Channel>>,
}

impl MainViewModel {
    pub fn new(repository: ChannelRepository, player: Box<dyn Player>) -> Self {
        Self {
            update_playlist: UpdatePlaylist::new(repository.clone()),
            repository,
            player: Mutex::new(player),
            ui_state: watch::channel(UiState::default()).0,
            player_state: watch::channel(PlayerState::default()).0,
            current_channel: watch::channel(None).0,
            channels: watch::channel(Vec::new()).0,
        }
    }

    pub fn ui_state(&self) -> watch::Receiver<UiState> {
        self.ui_state.subscribe()
    }

    pub fn player_state(&self) -> watch::Receiver<PlayerState> {
        self.player_state.subscribe()
    }

    pub fn current_channel(&self) -> watch::Receiver<Option<Channel>> {
        self.current_channel.subscribe()
    }

    pub fn channels(&self) -> watch::Receiver<Vec<Channel>> {
        self.channels.subscribe()
    }

    fn current(&self) -> Option<Channel> {
        self.current_channel.borrow().clone()
    }

    /// Seed defaults on an empty store, load the list and pick a channel
    pub async fn initialize_app(&self) {
        self.ui_state.send_modify(|s| s.is_loading = true);

        let outcome = async {
            if !self.repository.has_channels().await? {
                self.update_playlist.initialize_default_channels().await?;
                info!("Default channels initialized");
            } else {
                debug!("Channels already stored");
            }
            self.reload_channels().await
        }
        .await;

        match outcome {
            Ok(()) => self.ui_state.send_modify(|s| s.is_loading = false),
            Err(e) => {
                error!("Failed to initialize app: {:#}", e);
                self.ui_state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(format!("Erro ao carregar canais: {}", user_message(&e)));
                });
            }
        }
    }

    /// Re-read the channel list. Auto-selects a channel when none is current
    /// (the last watched one if still present, else the first) and drops a
    /// current channel that no longer exists.
    async fn reload_channels(&self) -> Result<()> {
        let list = self.repository.all_channels().await?;

        if let Some(current) = self.current() {
            // A replaced playlist may reuse ids for different streams
            if !list.iter().any(|c| c.id == current.id && c.url == current.url) {
                debug!("Current channel {} no longer stored", current.id);
                self.current_channel.send_replace(None);
            }
        }

        let pick = if self.current().is_none() && !list.is_empty() {
            let last = settings::last_watched_channel_id(self.repository.pool()).await?;
            last.and_then(|id| list.iter().find(|c| c.id == id))
                .or_else(|| list.first())
                .cloned()
        } else {
            None
        };

        self.channels.send_replace(list);

        if let Some(channel) = pick {
            self.select_channel(channel).await;
        }
        Ok(())
    }

    /// Follow repository writes until the repository is dropped
    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let vm = Arc::clone(self);
        let mut revisions = self.repository.subscribe();
        tokio::spawn(async move {
            while revisions.changed().await.is_ok() {
                if let Err(e) = vm.reload_channels().await {
                    error!("Failed to reload channels: {:#}", e);
                }
            }
        })
    }

    pub async fn select_channel(&self, channel: Channel) {
        info!("Selecting channel: {} - URL: {}", channel.name, channel.url);

        self.player_state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
        self.current_channel.send_replace(Some(channel.clone()));

        if let Err(e) = self.repository.mark_channel_as_watched(channel.id).await {
            error!("Failed to select channel: {:#}", e);
            self.player_state.send_modify(|s| {
                s.is_loading = false;
                s.is_playing = false;
                s.error = Some(format!("Erro ao carregar canal: {}", user_message(&e)));
            });
            return;
        }

        let loaded = self.player.lock().await.load(&channel.url);
        match loaded {
            Ok(()) => self.player_state.send_modify(|s| {
                s.is_loading = false;
                s.is_playing = true;
                s.error = None;
            }),
            Err(e) => self.on_player_error(e.to_string()),
        }
    }

    /// Import a playlist URL, replacing the stored channels, and remember it
    pub async fn update_playlist(&self, url: &str, username: &str, password: &str) -> PlaylistUpdateResult {
        info!("Updating playlist");
        self.ui_state.send_modify(|s| s.is_loading = true);

        match self.update_playlist.from_url(url, username, password, true).await {
            Ok(result) => {
                info!("Playlist updated: {} channels", result.total_channels);
                self.ui_state.send_modify(|s| {
                    s.is_loading = false;
                    s.message = Some(format!("{} canais carregados com sucesso", result.total_channels));
                    s.show_settings = false;
                });

                if let Err(e) = self.save_playlist_settings(url, username, password).await {
                    error!("Failed to save playlist settings: {:#}", e);
                }
                if let Err(e) = self.reload_channels().await {
                    error!("Failed to reload channels: {:#}", e);
                }
                result
            }
            Err(e) => {
                error!("Playlist update failed: {:#}", e);
                let message = user_message(&e);
                self.ui_state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(message.clone());
                });
                PlaylistUpdateResult::failure(message)
            }
        }
    }

    async fn save_playlist_settings(&self, url: &str, username: &str, password: &str) -> Result<()> {
        let pool = self.repository.pool();
        settings::set_playlist_url(pool, url).await?;
        if !username.trim().is_empty() && !password.trim().is_empty() {
            settings::set_credentials(pool, username, password).await?;
            settings::set_use_authentication(pool, true).await?;
        }
        Ok(())
    }

    pub async fn toggle_play_pause(&self) {
        let playing = !self.player_state.borrow().is_playing;
        self.player_state.send_modify(|s| s.is_playing = playing);

        let result = self.player.lock().await.set_playing(playing);
        if let Err(e) = result {
            self.on_player_error(e.to_string());
        }
    }

    pub async fn stop_playback(&self) {
        self.player.lock().await.stop();
        self.player_state.send_modify(|s| s.is_playing = false);
        self.current_channel.send_replace(None);
    }

    pub async fn next_channel(&self) {
        let Some(current) = self.current() else { return };
        match self.repository.next_channel(current.id, None).await {
            Ok(Some(next)) => self.select_channel(next).await,
            Ok(None) => {}
            Err(e) => error!("Failed to find next channel: {:#}", e),
        }
    }

    pub async fn previous_channel(&self) {
        let Some(current) = self.current() else { return };
        match self.repository.previous_channel(current.id, None).await {
            Ok(Some(previous)) => self.select_channel(previous).await,
            Ok(None) => {}
            Err(e) => error!("Failed to find previous channel: {:#}", e),
        }
    }

    pub fn open_settings(&self) {
        self.ui_state.send_modify(|s| s.show_settings = true);
    }

    pub fn close_settings(&self) {
        self.ui_state.send_modify(|s| s.show_settings = false);
    }

    pub fn clear_message(&self) {
        self.ui_state.send_modify(|s| {
            s.error = None;
            s.message = None;
        });
    }

    pub async fn refresh_data(&self) {
        match self.repository.active_count().await {
            Ok(count) => debug!("Data refreshed: {} channels", count),
            Err(e) => error!("Failed to refresh data: {:#}", e),
        }
        if let Err(e) = self.reload_channels().await {
            error!("Failed to reload channels: {:#}", e);
        }
    }

    /// Persist the current channel as the last one watched
    pub async fn save_current_state(&self) {
        if let Some(channel) = self.current() {
            if let Err(e) = settings::set_last_watched_channel_id(self.repository.pool(), channel.id).await {
                error!("Failed to save state: {:#}", e);
            }
        }
    }

    /// OK / Enter on the remote
    pub async fn handle_select_action(&self) {
        if self.current().is_some() {
            self.toggle_play_pause().await;
        }
    }

    /// Back on the remote: close settings first, then stop playback
    pub async fn handle_back_action(&self) {
        if self.ui_state.borrow().show_settings {
            self.close_settings();
        } else if self.current().is_some() {
            self.stop_playback().await;
        }
    }

    pub fn on_player_error(&self, error: String) {
        error!("Player error: {}", error);
        self.player_state.send_modify(|s| {
            s.is_loading = false;
            s.is_playing = false;
            s.error = Some(error);
        });
    }

    pub fn on_player_ready(&self) {
        debug!("Player ready");
        self.player_state.send_modify(|s| {
            s.is_loading = false;
            s.is_playing = true;
            s.error = None;
        });
    }

    /// Dispatch a player notification. A stream that ends advances to the
    /// next channel.
    pub async fn handle_player_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::Ready => self.on_player_ready(),
            PlayerEvent::Buffering => self.player_state.send_modify(|s| s.is_loading = true),
            PlayerEvent::Ended => self.next_channel().await,
            PlayerEvent::Error(message) => self.on_player_error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::pool::test_pool;
    use crate::services::player::PlayerError;
    use crate::services::playlist_service::PlaylistService;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every call instead of launching anything
    #[derive(Clone, Default)]
    struct FakePlayer {
        calls: Arc<StdMutex<Vec<String>>>,
        fail_load: bool,
    }

    impl Player for FakePlayer {
        fn load(&mut self, url: &str) -> Result<(), PlayerError> {
            self.calls.lock().unwrap().push(format!("load {}", url));
            if self.fail_load {
                return Err(PlayerError::NothingLoaded);
            }
            Ok(())
        }

        fn set_playing(&mut self, playing: bool) -> Result<(), PlayerError> {
            self.calls.lock().unwrap().push(format!("playing {}", playing));
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push("stop".to_string());
        }
    }

    async fn view_model(player: FakePlayer) -> MainViewModel {
        let config = Config::for_tests();
        let repository = ChannelRepository::new(test_pool().await, PlaylistService::new(&config).unwrap());
        MainViewModel::new(repository, Box::new(player))
    }

    #[tokio::test]
    async fn test_initialize_app_seeds_and_selects_first() {
        let player = FakePlayer::default();
        let vm = view_model(player.clone()).await;

        vm.initialize_app().await;

        assert_eq!(vm.channels().borrow().len(), 5);
        let current = vm.current_channel().borrow().clone().unwrap();
        assert_eq!(current.name, "Red Bull TV");
        assert!(vm.player_state().borrow().is_playing);
        assert!(!vm.ui_state().borrow().is_loading);
        assert_eq!(player.calls.lock().unwrap()[0], format!("load {}", current.url));
    }

    #[tokio::test]
    async fn test_initialize_app_restores_last_watched() {
        let vm = view_model(FakePlayer::default()).await;
        vm.initialize_app().await;

        let bloomberg = vm
            .channels()
            .borrow()
            .iter()
            .find(|c| c.name == "Bloomberg TV")
            .cloned()
            .unwrap();
        vm.select_channel(bloomberg.clone()).await;
        vm.stop_playback().await;
        assert!(vm.current_channel().borrow().is_none());

        vm.refresh_data().await;
        assert_eq!(vm.current_channel().borrow().as_ref().map(|c| c.id), Some(bloomberg.id));
    }

    #[tokio::test]
    async fn test_navigation_and_remote_actions() {
        let player = FakePlayer::default();
        let vm = view_model(player.clone()).await;
        vm.initialize_app().await;

        vm.next_channel().await;
        assert_eq!(vm.current_channel().borrow().as_ref().unwrap().name, "RT News");
        vm.previous_channel().await;
        vm.previous_channel().await;
        assert_eq!(vm.current_channel().borrow().as_ref().unwrap().name, "Bloomberg TV");

        vm.handle_select_action().await;
        assert!(!vm.player_state().borrow().is_playing);
        vm.handle_select_action().await;
        assert!(vm.player_state().borrow().is_playing);

        vm.open_settings();
        vm.handle_back_action().await;
        assert!(!vm.ui_state().borrow().show_settings);
        assert!(vm.current_channel().borrow().is_some());

        vm.handle_back_action().await;
        assert!(vm.current_channel().borrow().is_none());
        assert!(!vm.player_state().borrow().is_playing);

        let calls = player.calls.lock().unwrap().clone();
        assert!(calls.contains(&"playing false".to_string()));
        assert!(calls.contains(&"playing true".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("stop"));
    }

    #[tokio::test]
    async fn test_player_events() {
        let vm = view_model(FakePlayer::default()).await;
        vm.initialize_app().await;

        vm.handle_player_event(PlayerEvent::Error("codec".to_string())).await;
        let state = vm.player_state().borrow().clone();
        assert!(!state.is_playing);
        assert_eq!(state.error.as_deref(), Some("codec"));

        vm.handle_player_event(PlayerEvent::Buffering).await;
        assert!(vm.player_state().borrow().is_loading);
        vm.handle_player_event(PlayerEvent::Ready).await;
        let state = vm.player_state().borrow().clone();
        assert!(state.is_playing && !state.is_loading && state.error.is_none());
        assert_eq!(state.volume, 1.0);

        vm.handle_player_event(PlayerEvent::Ended).await;
        assert_eq!(vm.current_channel().borrow().as_ref().unwrap().name, "RT News");
    }

    #[tokio::test]
    async fn test_load_failure_sets_player_error() {
        let vm = view_model(FakePlayer {
            fail_load: true,
            ..Default::default()
        })
        .await;
        vm.initialize_app().await;

        let state = vm.player_state().borrow().clone();
        assert!(!state.is_playing);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_update_playlist_success_saves_settings() {
        let server = MockServer::start().await;
        Mock::given(path("/list.m3u"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "#EXTM3U\n#EXTINF:-1,One\nhttp://s/1\n#EXTINF:-1,Two\nhttp://s/2\n",
            ))
            .mount(&server)
            .await;

        let vm = view_model(FakePlayer::default()).await;
        vm.initialize_app().await;
        vm.open_settings();

        let url = format!("{}/list.m3u", server.uri());
        let result = vm.update_playlist(&url, "user", "pass").await;
        assert!(result.success);

        let ui = vm.ui_state().borrow().clone();
        assert_eq!(ui.message.as_deref(), Some("2 canais carregados com sucesso"));
        assert!(!ui.show_settings);

        let names: Vec<String> = vm.channels().borrow().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["One", "Two"]);
        // the replaced list starts over at its first channel
        assert_eq!(vm.current_channel().borrow().as_ref().unwrap().name, "One");

        let pool = vm.repository.pool();
        assert_eq!(settings::playlist_url(pool).await.unwrap(), url);
        assert_eq!(
            settings::credentials(pool).await.unwrap(),
            ("user".to_string(), "pass".to_string())
        );
        assert!(settings::use_authentication(pool).await.unwrap());

        vm.clear_message();
        assert!(vm.ui_state().borrow().message.is_none());
    }

    #[tokio::test]
    async fn test_replaced_playlist_does_not_restore_stale_id() {
        let vm = view_model(FakePlayer::default()).await;
        vm.initialize_app().await;

        let bloomberg = vm
            .channels()
            .borrow()
            .iter()
            .find(|c| c.name == "Bloomberg TV")
            .cloned()
            .unwrap();
        vm.select_channel(bloomberg).await;
        vm.stop_playback().await;

        let playlist = "#EXTM3U\n\
#EXTINF:-1,A\nhttp://s/a\n#EXTINF:-1,B\nhttp://s/b\n#EXTINF:-1,C\nhttp://s/c\n\
#EXTINF:-1,D\nhttp://s/d\n#EXTINF:-1,E\nhttp://s/e\n#EXTINF:-1,F\nhttp://s/f\n";
        vm.repository.update_playlist_from_content(playlist, true).await.unwrap();

        vm.refresh_data().await;
        let current = vm.current_channel().borrow().clone().unwrap();
        assert_eq!(current.name, "A");
        assert_eq!(current.url, "http://s/a");
    }

    #[tokio::test]
    async fn test_update_playlist_failure() {
        let server = MockServer::start().await;
        Mock::given(path("/list.m3u"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let vm = view_model(FakePlayer::default()).await;
        let result = vm
            .update_playlist(&format!("{}/list.m3u", server.uri()), "", "")
            .await;

        assert!(!result.success);
        let ui = vm.ui_state().borrow().clone();
        assert_eq!(ui.error.as_deref(), Some("Playlist não encontrada (404). Verifique a URL."));
        assert!(!ui.is_loading);
        assert_eq!(settings::playlist_url(vm.repository.pool()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_spawn_sync_follows_repository_writes() {
        let vm = Arc::new(view_model(FakePlayer::default()).await);
        let handle = vm.spawn_sync();
        let mut channels = vm.channels();

        vm.repository.initialize_default_channels_if_needed().await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while channels.borrow_and_update().len() != 5 {
                channels.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        handle.abort();
    }
}
