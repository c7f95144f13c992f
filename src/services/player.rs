//! Playback seam. Decoding and rendering belong to an external program;
//! this module only starts, stops and watches it.

use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Notifications from the player back to the view model
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    Buffering,
    Ended,
    Error(String),
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Não foi possível iniciar o player '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Nenhum canal carregado no player")]
    NothingLoaded,
}

pub trait Player: Send {
    /// Load a stream and start playing it
    fn load(&mut self, url: &str) -> Result<(), PlayerError>;

    /// Pause or resume the loaded stream
    fn set_playing(&mut self, playing: bool) -> Result<(), PlayerError>;

    /// Stop playback and forget the loaded stream
    fn stop(&mut self);
}

/// Runs a media player command (mpv, vlc, ffplay...) with the stream URL
/// appended to its arguments
pub struct ExternalPlayer {
    command: String,
    args: Vec<String>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    current_url: Option<String>,
    stop_signal: Option<watch::Sender<bool>>,
}

impl ExternalPlayer {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            events,
            current_url: None,
            stop_signal: None,
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    /// Whether a launched process is still alive. The exit watcher drops the
    /// stop receiver once the process is gone.
    pub fn is_running(&self) -> bool {
        self.stop_signal.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn launch(&mut self, url: &str) -> Result<(), PlayerError> {
        self.terminate();

        let _ = self.events.send(PlayerEvent::Buffering);

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        info!("Player spawned: pid={:?} command={}", child.id(), self.command);
        let _ = self.events.send(PlayerEvent::Ready);

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("player: {}", line);
                }
            });
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let events = self.events.clone();

        tokio::spawn(async move {
            let exit = tokio::select! {
                // Fires on an explicit stop and when the sender is dropped
                _ = stop_rx.changed() => {
                    let _ = child.kill().await;
                    debug!("Player process terminated");
                    None
                }
                status = child.wait() => Some(match status {
                    Ok(status) if status.success() => PlayerEvent::Ended,
                    Ok(status) => {
                        warn!("Player exited with {}", status);
                        PlayerEvent::Error(format!("Player encerrou com erro ({})", status))
                    }
                    Err(e) => PlayerEvent::Error(e.to_string()),
                }),
            };

            // Closed before the event goes out so `is_running` already sees the exit
            drop(stop_rx);
            if let Some(event) = exit {
                let _ = events.send(event);
            }
        });

        self.stop_signal = Some(stop_tx);
        Ok(())
    }

    fn terminate(&mut self) {
        if let Some(stop) = self.stop_signal.take() {
            let _ = stop.send(true);
        }
    }
}

impl Player for ExternalPlayer {
    fn load(&mut self, url: &str) -> Result<(), PlayerError> {
        self.current_url = Some(url.to_string());
        if let Err(e) = self.launch(url) {
            let _ = self.events.send(PlayerEvent::Error(e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    fn set_playing(&mut self, playing: bool) -> Result<(), PlayerError> {
        if !playing {
            self.terminate();
            return Ok(());
        }

        if self.is_running() {
            return Ok(());
        }

        let url = self.current_url.clone().ok_or(PlayerError::NothingLoaded)?;
        self.launch(&url)
    }

    fn stop(&mut self) {
        self.terminate();
        self.current_url = None;
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.terminate();
    }
}
