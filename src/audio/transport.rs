use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{ControlError, PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::{audio::source::AudioSource, error::MusicError};

/// Identificador de una reproducción concreta
pub type PlaybackId = u64;

/// Emitted once per playback when the track finishes or fails to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEnded {
    pub guild_id: GuildId,
    pub playback: PlaybackId,
    pub error: Option<String>,
}

/// Control de una pista en curso
pub trait PlaybackHandle: Send + Sync {
    fn pause(&self) -> Result<(), MusicError>;
    fn resume(&self) -> Result<(), MusicError>;
    fn stop(&self) -> Result<(), MusicError>;
    fn set_volume(&self, volume: f32) -> Result<(), MusicError>;
}

/// Voice primitives provided by the host framework.
///
/// `connect` on a guild that is already connected moves the connection.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), MusicError>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), MusicError>;

    /// Channel the connection is actually in right now, if any.
    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId>;

    /// Starts `source` on the guild's connection, replacing anything else on it.
    async fn start(
        &self,
        guild_id: GuildId,
        playback: PlaybackId,
        source: &AudioSource,
    ) -> Result<Box<dyn PlaybackHandle>, MusicError>;
}

/// Transporte de voz basado en Songbird
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    events: UnboundedSender<PlaybackEnded>,
}

impl SongbirdTransport {
    pub fn new(
        manager: Arc<Songbird>,
        http: reqwest::Client,
        events: UnboundedSender<PlaybackEnded>,
    ) -> Self {
        Self {
            manager,
            http,
            events,
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), MusicError> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!("Error al conectar al canal de voz: {:?}", e);
                MusicError::Transport(e.to_string())
            })
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), MusicError> {
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| MusicError::Transport(e.to_string()))
    }

    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let call = self.manager.get(guild_id)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }

    async fn start(
        &self,
        guild_id: GuildId,
        playback: PlaybackId,
        source: &AudioSource,
    ) -> Result<Box<dyn PlaybackHandle>, MusicError> {
        let call = self.manager.get(guild_id).ok_or(MusicError::NotConnected)?;

        let input = Input::from(HttpRequest::new_with_headers(
            self.http.clone(),
            source.stream_url().to_string(),
            header_map(source),
        ));

        let track = {
            let mut call = call.lock().await;
            call.play_only_input(input)
        };

        track.set_volume(source.volume()).map_err(control_error)?;

        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        guild_id,
                        playback,
                        events: self.events.clone(),
                    },
                )
                .map_err(control_error)?;
        }

        info!("▶️ Reproduciendo: {} en guild {}", source.title(), guild_id);
        Ok(Box::new(SongbirdPlayback { track }))
    }
}

/// Cabeceras que pide el servidor de medios (user agent, referer...)
fn header_map(source: &AudioSource) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in source.http_headers() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Cabecera inválida ignorada: {}", name),
        }
    }
    headers
}

fn control_error(e: ControlError) -> MusicError {
    MusicError::Transport(e.to_string())
}

struct SongbirdPlayback {
    track: TrackHandle,
}

impl PlaybackHandle for SongbirdPlayback {
    fn pause(&self) -> Result<(), MusicError> {
        self.track.pause().map_err(control_error)
    }

    fn resume(&self) -> Result<(), MusicError> {
        self.track.play().map_err(control_error)
    }

    fn stop(&self) -> Result<(), MusicError> {
        self.track.stop().map_err(control_error)
    }

    fn set_volume(&self, volume: f32) -> Result<(), MusicError> {
        self.track.set_volume(volume).map_err(control_error)
    }
}

/// Handler para cuando una pista termina o falla
struct TrackEndNotifier {
    guild_id: GuildId,
    playback: PlaybackId,
    events: UnboundedSender<PlaybackEnded>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(track_list) => {
                track_list.iter().find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(format!("{e:?}")),
                    _ => None,
                })
            }
            _ => None,
        };

        debug!(guild_id = %self.guild_id, playback = self.playback, ?error, "track ended");

        // El receptor sólo desaparece al apagar el bot
        let _ = self.events.send(PlaybackEnded {
            guild_id: self.guild_id,
            playback: self.playback,
            error,
        });

        // Un solo aviso por pista
        Some(Event::Cancel)
    }
}
