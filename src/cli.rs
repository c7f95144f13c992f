//! Command line front-end

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::db::health_check;
use crate::db::repository::settings;
use crate::models::{Channel, ChannelFilter, PlaylistStats, PlaylistUpdateResult, ALL_CATEGORIES};
use crate::services::channel_repository::ChannelRepository;
use crate::services::player::ExternalPlayer;
use crate::services::playlist_service::{redact, PlaylistService};
use crate::services::use_cases::{GetChannels, UpdatePlaylist};
use crate::services::xtream::{extract_credentials, validate_credentials};
use crate::viewmodel::MainViewModel;

#[derive(Parser, Debug)]
#[command(version, about = "Xcloud TV - IPTV playlist client", long_about = None)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download an M3U playlist and store its channels
    Update {
        url: String,
        #[arg(short, long, default_value = "")]
        username: String,
        #[arg(short, long, default_value = "")]
        password: String,
        /// Keep stored channels and merge by URL
        #[arg(long)]
        merge: bool,
    },
    /// Import the playlist of an Xtream Codes account
    Xtream {
        host: String,
        username: String,
        password: String,
        #[arg(long)]
        merge: bool,
    },
    /// Import a local .m3u file
    Import {
        path: PathBuf,
        #[arg(long)]
        merge: bool,
    },
    /// Probe a playlist URL without importing it
    Test {
        url: String,
        #[arg(short, long, default_value = "")]
        username: String,
        #[arg(short, long, default_value = "")]
        password: String,
    },
    /// Show the response headers of a playlist URL
    Headers {
        url: String,
        #[arg(short, long, default_value = "")]
        username: String,
        #[arg(short, long, default_value = "")]
        password: String,
    },
    /// Show the account behind an Xtream `get.php` playlist URL
    XtreamInfo { url: String },
    /// List stored channels
    Channels {
        #[arg(long, default_value = ALL_CATEGORIES)]
        category: String,
        #[arg(long)]
        favorites: bool,
        #[arg(long)]
        live: bool,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// List categories
    Categories,
    /// Recently watched channels
    Recent {
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Search channels by name
    Search { query: String },
    /// Show one channel
    Show { id: i64 },
    /// Mark or unmark a favorite
    Favorite {
        id: i64,
        #[arg(long)]
        off: bool,
    },
    /// Record a channel as watched
    Watched { id: i64 },
    /// Channel after the given one
    Next {
        id: i64,
        #[arg(long)]
        category: Option<String>,
    },
    /// Channel before the given one
    Prev {
        id: i64,
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete one channel
    Delete { id: i64 },
    /// Statistics of the stored channels
    Stats,
    /// Store and settings status
    Status,
    /// Delete every stored channel
    Clear,
    /// Forget settings and restore the bundled channels
    Reset,
    /// Interactive playback through the configured player
    Watch,
}

/// Print `value` as JSON or as the text produced by `text`
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

fn channel_line(channel: &Channel) -> String {
    format!(
        "{:>5}  {}{}  [{}]  {}",
        channel.id,
        if channel.is_favorite { "* " } else { "" },
        channel.display_name(),
        channel.category,
        channel.url
    )
}

fn channel_list(channels: &Vec<Channel>) -> String {
    if channels.is_empty() {
        return "Nenhum canal encontrado".to_string();
    }
    channels.iter().map(channel_line).collect::<Vec<_>>().join("\n")
}

fn update_summary(result: &PlaylistUpdateResult) -> String {
    format!(
        "{}\nnovos: {}  atualizados: {}  categorias: {}",
        result.message, result.new_channels, result.updated_channels, result.categories_count
    )
}

fn optional_channel(json: bool, channel: Option<Channel>) -> Result<()> {
    emit(json, &channel, |c| match c {
        Some(c) => channel_line(c),
        None => "Nenhum canal encontrado".to_string(),
    })
}

pub async fn run(cli: Cli, config: Config, pool: SqlitePool) -> Result<()> {
    let playlist_service = PlaylistService::new(&config).context("Failed to build HTTP client")?;
    let repository = ChannelRepository::new(pool.clone(), playlist_service.clone());
    let get_channels = GetChannels::new(repository.clone());
    let update_playlist = UpdatePlaylist::new(repository.clone());
    let json = cli.json;

    if settings::is_first_launch(&pool).await? {
        info!("First launch");
        update_playlist.initialize_default_channels().await?;
        settings::set_first_launch(&pool, false).await?;
    }

    match cli.command {
        Command::Update {
            url,
            username,
            password,
            merge,
        } => {
            info!("Updating playlist from {}", redact(&url));
            let result = update_playlist.from_url(&url, &username, &password, !merge).await?;
            settings::set_playlist_url(&pool, &url).await?;
            if !username.trim().is_empty() && !password.trim().is_empty() {
                settings::set_credentials(&pool, &username, &password).await?;
                settings::set_use_authentication(&pool, true).await?;
            }
            emit(json, &result, update_summary)?;
        }
        Command::Xtream {
            host,
            username,
            password,
            merge,
        } => {
            let result = update_playlist.from_xtream(&host, &username, &password, !merge).await?;
            emit(json, &result, update_summary)?;
        }
        Command::Import { path, merge } => {
            let result = update_playlist.from_file(&path, !merge).await?;
            emit(json, &result, update_summary)?;
        }
        Command::Test {
            url,
            username,
            password,
        } => {
            let result = playlist_service.test_playlist_url(&url, &username, &password).await;
            emit(json, &result, |r| {
                format!(
                    "{}\ntempo de resposta: {} ms  content-type: {}",
                    r.summary(),
                    r.response_time_ms,
                    r.content_type
                )
            })?;
        }
        Command::Headers {
            url,
            username,
            password,
        } => {
            let headers = playlist_service
                .check_playlist_headers(&url, &username, &password)
                .await?;
            emit(json, &headers, |h| {
                h.iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Command::XtreamInfo { url } => {
            let Some(creds) = extract_credentials(&url) else {
                bail!("URL não é uma playlist Xtream (get.php com username e password)");
            };
            let auth = validate_credentials(playlist_service.client(), &creds).await?;
            emit(json, &auth, |a| {
                let expires = a
                    .user_info
                    .expires_at()
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "sem data".to_string());
                format!(
                    "servidor: {}\nusuário: {}\nstatus: {}\nexpira: {}\nteste: {}",
                    creds.server,
                    a.user_info.username,
                    a.user_info.status,
                    expires,
                    if a.user_info.is_trial_account() { "sim" } else { "não" }
                )
            })?;
        }
        Command::Channels {
            category,
            favorites,
            live,
            search,
        } => {
            let filter = ChannelFilter {
                category,
                only_favorites: favorites,
                only_live: live,
                search_query: search,
            };
            emit(json, &get_channels.filtered(&filter).await?, channel_list)?;
        }
        Command::Categories => {
            emit(json, &get_channels.categories().await?, |c| c.join("\n"))?;
        }
        Command::Recent { limit } => {
            let limit = limit.unwrap_or(config.recent_limit);
            emit(json, &get_channels.recent(limit).await?, channel_list)?;
        }
        Command::Search { query } => {
            emit(json, &get_channels.search(&query).await?, channel_list)?;
        }
        Command::Show { id } => {
            optional_channel(json, repository.channel_by_id(id).await?)?;
        }
        Command::Favorite { id, off } => {
            repository.toggle_favorite(id, !off).await?;
            optional_channel(json, repository.channel_by_id(id).await?)?;
        }
        Command::Watched { id } => {
            repository.mark_channel_as_watched(id).await?;
            optional_channel(json, repository.channel_by_id(id).await?)?;
        }
        Command::Next { id, category } => {
            optional_channel(json, repository.next_channel(id, category.as_deref()).await?)?;
        }
        Command::Prev { id, category } => {
            optional_channel(json, repository.previous_channel(id, category.as_deref()).await?)?;
        }
        Command::Delete { id } => {
            repository.delete_channel(id).await?;
            emit(json, &id, |id| format!("Canal {} removido", id))?;
        }
        Command::Stats => {
            let stats = PlaylistStats::from_channels(&get_channels.all().await?);
            emit(json, &stats, |s| {
                let mut out = s.summary();
                for (category, count) in &s.categories {
                    out.push_str(&format!("\n  {}: {}", category, count));
                }
                out
            })?;
        }
        Command::Status => {
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct Status {
                database_ok: bool,
                channels: i64,
                playlist_url: String,
                use_authentication: bool,
                last_watched_channel_id: Option<i64>,
                last_playlist_hash: Option<String>,
            }

            let status = Status {
                database_ok: health_check(&pool).await,
                channels: repository.active_count().await?,
                playlist_url: redact(&settings::playlist_url(&pool).await?),
                use_authentication: settings::use_authentication(&pool).await?,
                last_watched_channel_id: settings::last_watched_channel_id(&pool).await?,
                last_playlist_hash: settings::last_playlist_hash(&pool).await?,
            };
            emit(json, &status, |s| {
                format!(
                    "banco: {}\ncanais: {}\nplaylist: {}\nautenticação: {}",
                    if s.database_ok { "ok" } else { "falha" },
                    s.channels,
                    if s.playlist_url.is_empty() { "-" } else { s.playlist_url.as_str() },
                    if s.use_authentication { "sim" } else { "não" }
                )
            })?;
        }
        Command::Clear => {
            let removed = update_playlist.clear_all_channels().await?;
            emit(json, &removed, |n| format!("{} canais removidos", n))?;
        }
        Command::Reset => {
            update_playlist.clear_all_channels().await?;
            settings::clear_all(&pool).await?;
            update_playlist.initialize_default_channels().await?;
            settings::set_first_launch(&pool, false).await?;
            emit(json, &repository.active_count().await?, |n| {
                format!("Configurações apagadas, {} canais padrão restaurados", n)
            })?;
        }
        Command::Watch => watch(&config, repository).await?,
    }

    Ok(())
}

const WATCH_HELP: &str = "comandos: n próximo | p anterior | <enter> play/pause | b voltar | \
l lista | <id> seleciona | q sair";

/// Remote-control style loop: stdin lines drive the view model, player
/// events flow back into it
async fn watch(config: &Config, repository: ChannelRepository) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let player = ExternalPlayer::new(config.player_command.clone(), config.player_args.clone(), events_tx);

    let vm = Arc::new(MainViewModel::new(repository.clone(), Box::new(player)));
    let sync = vm.spawn_sync();
    let mut current = vm.current_channel();
    let mut ui = vm.ui_state();

    vm.initialize_app().await;
    println!("{}", WATCH_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events_rx.recv() => vm.handle_player_event(event).await,
            Ok(()) = current.changed() => {
                match current.borrow_and_update().as_ref() {
                    Some(channel) => println!("▶ {}", channel_line(channel)),
                    None => println!("■ parado"),
                }
            }
            Ok(()) = ui.changed() => {
                let state = ui.borrow_and_update().clone();
                if let Some(error) = state.error.as_ref().or(state.message.as_ref()) {
                    println!("{}", error);
                    vm.clear_message();
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "q" => break,
                    "n" => vm.next_channel().await,
                    "p" => vm.previous_channel().await,
                    "" => vm.handle_select_action().await,
                    "b" => vm.handle_back_action().await,
                    "l" => println!("{}", channel_list(&vm.channels().borrow())),
                    other => match other.parse::<i64>() {
                        Ok(id) => match repository.channel_by_id(id).await? {
                            Some(channel) => vm.select_channel(channel).await,
                            None => println!("Canal {} não encontrado", id),
                        },
                        Err(_) => println!("{}", WATCH_HELP),
                    },
                }
            }
        }
    }

    vm.save_current_state().await;
    vm.stop_playback().await;
    sync.abort();
    Ok(())
}
