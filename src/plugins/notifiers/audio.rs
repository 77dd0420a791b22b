use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::AudioConfig;
use crate::plugins::traits::{AlertEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

/// Chime shipped with the binary, used whenever no `sound_path` is configured.
pub const ALERT_WAV: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/alert.wav"));

#[cfg(target_os = "macos")]
const SYSTEM_PLAYERS: &[&str] = &["afplay"];
#[cfg(all(unix, not(target_os = "macos")))]
const SYSTEM_PLAYERS: &[&str] = &["paplay", "aplay"];
#[cfg(not(unix))]
const SYSTEM_PLAYERS: &[&str] = &[];

/// Local audible cue.
///
/// Playback order: the configured `player` command, in-process playback when
/// built with the `playback` feature, the platform's stock player, and
/// finally the terminal bell.
pub struct AudioNotifier {
    config: AudioConfig,
    system_players: Vec<String>,
}

impl AudioNotifier {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            system_players: SYSTEM_PLAYERS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Play the cue once, independent of any event.
    pub async fn play_cue(&self) -> Result<NotificationResult> {
        if !self.config.enabled {
            return Ok(NotificationResult::skipped("audio alerts disabled"));
        }

        if let Some(player) = &self.config.player {
            let sound = self.sound_file().await?;
            run_player(player, &sound).await?;
            return Ok(NotificationResult::delivered(format!("audio-{}", player)));
        }

        #[cfg(feature = "playback")]
        match self.play_in_process().await {
            Ok(()) => return Ok(NotificationResult::delivered("audio-chime")),
            Err(e) => tracing::warn!("In-process playback failed: {}", e),
        }

        if !self.system_players.is_empty() {
            match self.sound_file().await {
                Ok(sound) => {
                    for player in &self.system_players {
                        match run_player(player, &sound).await {
                            Ok(()) => return Ok(NotificationResult::delivered(format!("audio-{}", player))),
                            Err(e) => tracing::debug!("Player {} unavailable: {}", player, e),
                        }
                    }
                }
                Err(e) => tracing::warn!("Could not prepare alert sound: {}", e),
            }
        }

        let mut stderr = tokio::io::stderr();
        stderr.write_all(b"\x07").await?;
        stderr.flush().await?;
        Ok(NotificationResult::delivered("audio-bell"))
    }

    /// The configured sound, or the bundled chime written out to the cache
    /// directory so external players can open it.
    async fn sound_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.sound_path {
            return Ok(PathBuf::from(path));
        }

        let cache_dir = directories::ProjectDirs::from("", "", "restock-watcher")
            .map(|dirs| dirs.cache_dir().to_path_buf());
        let mut last_err = None;
        for dir in cache_dir.into_iter().chain(std::iter::once(std::env::temp_dir())) {
            let path = dir.join("restock-alert.wav");
            match write_bundled(&path).await {
                Ok(()) => return Ok(path),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::NotFound {
            resource: "writable directory for alert sound".to_string(),
        }))
    }

    #[cfg(feature = "playback")]
    async fn play_in_process(&self) -> Result<()> {
        let bytes = match &self.config.sound_path {
            Some(path) => tokio::fs::read(path).await?,
            None => ALERT_WAV.to_vec(),
        };

        tokio::task::spawn_blocking(move || {
            let fail = |message: String| AppError::Notification {
                channel: "audio".to_string(),
                message,
            };
            let (_stream, handle) = rodio::OutputStream::try_default().map_err(|e| fail(e.to_string()))?;
            let sink = rodio::Sink::try_new(&handle).map_err(|e| fail(e.to_string()))?;
            let source = rodio::Decoder::new(std::io::Cursor::new(bytes)).map_err(|e| fail(e.to_string()))?;
            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        })
        .await
        .map_err(|e| AppError::Notification {
            channel: "audio".to_string(),
            message: e.to_string(),
        })?
    }
}

async fn write_bundled(path: &Path) -> Result<()> {
    if let Ok(meta) = tokio::fs::metadata(path).await {
        if meta.len() == ALERT_WAV.len() as u64 {
            return Ok(());
        }
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, ALERT_WAV).await?;
    Ok(())
}

async fn run_player(player: &str, sound: &Path) -> Result<()> {
    let status = Command::new(player)
        .arg(sound)
        .kill_on_drop(true)
        .status()
        .await?;

    if !status.success() {
        return Err(AppError::Notification {
            channel: "audio".to_string(),
            message: format!("{} exited with {}", player, status),
        });
    }
    Ok(())
}

#[async_trait]
impl NotifierPlugin for AudioNotifier {
    fn name(&self) -> &str {
        "Audio Notifier"
    }

    fn plugin_type(&self) -> &str {
        "audio"
    }

    fn description(&self) -> &str {
        "Plays a local sound when an item comes into stock"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<NotificationResult> {
        tracing::debug!("Playing audio cue for: {}", event.title);
        self.play_cue().await
    }
}
