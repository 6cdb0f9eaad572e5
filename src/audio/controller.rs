use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::{mpsc::UnboundedReceiver, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        source::AudioSource,
        transport::{PlaybackEnded, PlaybackHandle, PlaybackId, VoiceTransport},
    },
    error::{MusicError, Transition},
    sources::MediaResolver,
};

/// Estado visible de una guild
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Disconnected,
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Moved,
    AlreadyThere,
}

/// Where a play request came from; decides how the connection is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// `play` command: joins the requester if disconnected, never moves, and
    /// stops the current track before resolving.
    Command,
    /// Message in the dedicated channel: the requester must share the bot's
    /// channel, and the current track keeps playing until the new one is ready.
    DedicatedChannel,
}

/// What a voice state update for the bot did to its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceSync {
    /// No session for the guild.
    Untracked,
    /// Matches the session, or is stale.
    Unchanged,
    /// Moved from outside; the session follows.
    Moved(ChannelId),
    /// Disconnected from outside; the session was discarded.
    Dropped,
}

/// Decide cómo afecta un evento de voz a la sesión.
///
/// `live` is where the transport really is; an event that disagrees with it
/// is stale and is ignored.
fn reconcile(
    tracked: ChannelId,
    reported: Option<ChannelId>,
    live: Option<ChannelId>,
) -> VoiceSync {
    match reported {
        None if live.is_none() => VoiceSync::Dropped,
        None => VoiceSync::Unchanged,
        Some(channel_id) if channel_id == tracked => VoiceSync::Unchanged,
        Some(channel_id) if live.map_or(true, |live| live == channel_id) => {
            VoiceSync::Moved(channel_id)
        }
        Some(_) => VoiceSync::Unchanged,
    }
}

struct Playback {
    id: PlaybackId,
    source: AudioSource,
    handle: Box<dyn PlaybackHandle>,
    paused: bool,
}

/// Guild Voice State: only exists while connected.
struct Session {
    id: u64,
    channel_id: ChannelId,
    playback: Option<Playback>,
    /// Ticket of the newest play request; older resolutions are discarded.
    latest_request: u64,
}

impl Session {
    fn new(id: u64, channel_id: ChannelId) -> Self {
        Self {
            id,
            channel_id,
            playback: None,
            latest_request: 0,
        }
    }

    fn stop_playback(&mut self) {
        if let Some(playback) = self.playback.take() {
            debug!("⏹️ Deteniendo: {}", playback.source.title());
            if let Err(e) = playback.handle.stop() {
                warn!("Error al detener pista: {:?}", e);
            }
        }
    }
}

type Slot = Arc<Mutex<Option<Session>>>;

/// Owns every guild's voice session and serializes the operations on each.
///
/// Every guild gets its own async mutex; operations on one guild run in
/// arrival order while different guilds never wait on each other. Media
/// resolution happens outside the lock, so a `stop` or a newer `play` can land
/// while a request is resolving; the stale result is dropped before attach.
pub struct VoiceSessionController {
    transport: Arc<dyn VoiceTransport>,
    resolver: Arc<dyn MediaResolver>,
    slots: DashMap<GuildId, Slot>,
    next_id: AtomicU64,
    default_volume: f32,
}

impl VoiceSessionController {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn MediaResolver>,
        default_volume: f32,
    ) -> Self {
        Self {
            transport,
            resolver,
            slots: DashMap::new(),
            next_id: AtomicU64::new(1),
            default_volume,
        }
    }

    /// Conecta o mueve el bot al canal indicado
    pub async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<JoinOutcome, MusicError> {
        let slot = self.slot(guild_id);
        let mut guard = slot.lock().await;

        match guard.as_mut() {
            Some(session) if session.channel_id == channel_id => Ok(JoinOutcome::AlreadyThere),
            Some(session) => {
                self.transport.connect(guild_id, channel_id).await?;
                info!("🔀 Movido al canal {} en guild {}", channel_id, guild_id);
                session.channel_id = channel_id;
                Ok(JoinOutcome::Moved)
            }
            None => {
                self.transport.connect(guild_id, channel_id).await?;
                *guard = Some(self.new_session(guild_id, channel_id));
                Ok(JoinOutcome::Joined)
            }
        }
    }

    /// Resuelve `query` y lo reproduce, devolviendo el título.
    ///
    /// `requester` is the voice channel of whoever asked, if any.
    pub async fn play(
        &self,
        guild_id: GuildId,
        requester: Option<ChannelId>,
        query: &str,
        origin: RequestOrigin,
    ) -> Result<String, MusicError> {
        let (session_id, ticket) = self.prepare(guild_id, requester, origin).await?;

        let descriptor = self.resolver.resolve(query).await?;
        let source = AudioSource::create(descriptor, self.default_volume)?;

        self.attach(guild_id, session_id, ticket, source).await
    }

    async fn prepare(
        &self,
        guild_id: GuildId,
        requester: Option<ChannelId>,
        origin: RequestOrigin,
    ) -> Result<(u64, u64), MusicError> {
        let slot = self.slot(guild_id);
        let mut guard = slot.lock().await;

        match origin {
            RequestOrigin::Command => match guard.as_mut() {
                Some(session) => session.stop_playback(),
                None => {
                    let channel_id = requester.ok_or(MusicError::NotInVoice)?;
                    self.transport.connect(guild_id, channel_id).await?;
                    *guard = Some(self.new_session(guild_id, channel_id));
                }
            },
            RequestOrigin::DedicatedChannel => {
                let channel_id = requester.ok_or(MusicError::NotInVoice)?;
                match guard.as_ref() {
                    Some(session) if session.channel_id != channel_id => {
                        return Err(MusicError::AlreadyConnectedElsewhere)
                    }
                    Some(_) => {}
                    None => {
                        self.transport.connect(guild_id, channel_id).await?;
                        *guard = Some(self.new_session(guild_id, channel_id));
                    }
                }
            }
        }

        let session = guard.as_mut().ok_or(MusicError::NotConnected)?;
        let ticket = self.next_id();
        session.latest_request = ticket;
        Ok((session.id, ticket))
    }

    async fn attach(
        &self,
        guild_id: GuildId,
        session_id: u64,
        ticket: u64,
        source: AudioSource,
    ) -> Result<String, MusicError> {
        let slot = self.slot(guild_id);
        let mut guard = slot.lock().await;

        // La sesión pudo cerrarse o recibir otra petición mientras resolvíamos
        let session = match guard.as_mut() {
            Some(session) if session.id == session_id && session.latest_request == ticket => {
                session
            }
            _ => {
                info!(
                    "🗑️ Descartando '{}' en guild {}: petición reemplazada",
                    source.title(),
                    guild_id
                );
                return Err(MusicError::Superseded);
            }
        };

        session.stop_playback();

        let id = self.next_id();
        let handle = self.transport.start(guild_id, id, &source).await?;
        let title = source.title().to_string();

        session.playback = Some(Playback {
            id,
            source,
            handle,
            paused: false,
        });

        Ok(title)
    }

    /// Ajusta el volumen en porcentaje; no se limita el rango.
    pub async fn set_volume(&self, guild_id: GuildId, percent: i64) -> Result<f32, MusicError> {
        let slot = self.existing_slot(guild_id).ok_or(MusicError::NotConnected)?;
        let mut guard = slot.lock().await;
        let session = guard.as_mut().ok_or(MusicError::NotConnected)?;
        let playback = session
            .playback
            .as_mut()
            .ok_or(MusicError::NothingPlaying)?;

        let volume = percent as f32 / 100.0;
        playback.handle.set_volume(volume)?;
        playback.source.set_volume(volume);

        info!("🔊 Volumen ajustado a {}% en guild {}", percent, guild_id);
        Ok(volume)
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), MusicError> {
        let slot = self.existing_slot(guild_id).ok_or(MusicError::NotConnected)?;
        let mut guard = slot.lock().await;
        let session = guard.as_mut().ok_or(MusicError::NotConnected)?;

        match session.playback.as_mut() {
            Some(playback) if !playback.paused => {
                playback.handle.pause()?;
                playback.paused = true;
                info!("⏸️ Reproducción pausada en guild {}", guild_id);
                Ok(())
            }
            _ => Err(MusicError::RedundantTransition(Transition::Pause)),
        }
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), MusicError> {
        let slot = self.existing_slot(guild_id).ok_or(MusicError::NotConnected)?;
        let mut guard = slot.lock().await;
        let session = guard.as_mut().ok_or(MusicError::NotConnected)?;

        match session.playback.as_mut() {
            Some(playback) if playback.paused => {
                playback.handle.resume()?;
                playback.paused = false;
                info!("▶️ Reproducción reanudada en guild {}", guild_id);
                Ok(())
            }
            _ => Err(MusicError::RedundantTransition(Transition::Resume)),
        }
    }

    /// Detiene la reproducción y desconecta el bot.
    ///
    /// The session is discarded even if the transport fails to disconnect.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), MusicError> {
        let slot = self.existing_slot(guild_id).ok_or(MusicError::NotConnected)?;
        let mut guard = slot.lock().await;
        let mut session = guard.take().ok_or(MusicError::NotConnected)?;

        session.stop_playback();
        self.transport.disconnect(guild_id).await?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }

    /// Aplica un cambio de voz del propio bot informado por Discord.
    ///
    /// `reported` is the channel from the gateway event. Events can arrive
    /// late (after a `stop` and a new `join`), so they are checked against the
    /// transport's live channel before the session is moved or dropped.
    pub async fn voice_state_changed(
        &self,
        guild_id: GuildId,
        reported: Option<ChannelId>,
    ) -> VoiceSync {
        let Some(slot) = self.existing_slot(guild_id) else {
            return VoiceSync::Untracked;
        };
        let mut guard = slot.lock().await;
        let Some(session) = guard.as_mut() else {
            return VoiceSync::Untracked;
        };

        let live = self.transport.current_channel(guild_id).await;
        let sync = reconcile(session.channel_id, reported, live);

        match sync {
            VoiceSync::Moved(channel_id) => {
                info!("🔀 Bot movido al canal {} en guild {}", channel_id, guild_id);
                session.channel_id = channel_id;
            }
            VoiceSync::Dropped => {
                session.stop_playback();
                *guard = None;
                info!("🔌 Sesión de voz descartada en guild {}", guild_id);
            }
            VoiceSync::Unchanged | VoiceSync::Untracked => {}
        }

        sync
    }

    /// Returns `true` when the event ended the current playback.
    pub async fn playback_ended(&self, event: PlaybackEnded) -> bool {
        if let Some(error) = &event.error {
            error!("❌ Error en pista para guild {}: {}", event.guild_id, error);
        }

        let Some(slot) = self.existing_slot(event.guild_id) else {
            return false;
        };
        let mut guard = slot.lock().await;
        let Some(session) = guard.as_mut() else {
            return false;
        };

        match &session.playback {
            Some(playback) if playback.id == event.playback => {
                info!("🎵 Pista terminada en guild {}", event.guild_id);
                session.playback = None;
                true
            }
            // Pista ya reemplazada o detenida
            _ => false,
        }
    }

    /// Consume completion events until every transport is dropped.
    pub async fn watch_completions(self: Arc<Self>, mut events: UnboundedReceiver<PlaybackEnded>) {
        while let Some(event) = events.recv().await {
            self.playback_ended(event).await;
        }
        debug!("Canal de eventos de reproducción cerrado");
    }

    fn new_session(&self, guild_id: GuildId, channel_id: ChannelId) -> Session {
        info!("🔊 Conectado al canal {} en guild {}", channel_id, guild_id);
        Session::new(self.next_id(), channel_id)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // Los slots nunca se eliminan: así dos tareas no pueden acabar con mutex distintos
    fn slot(&self, guild_id: GuildId) -> Slot {
        Arc::clone(self.slots.entry(guild_id).or_default().value())
    }

    fn existing_slot(&self, guild_id: GuildId) -> Option<Slot> {
        self.slots.get(&guild_id).map(|slot| Arc::clone(slot.value()))
    }
}

// Consultas de estado para las pruebas
#[cfg(test)]
impl VoiceSessionController {
    pub async fn status(&self, guild_id: GuildId) -> PlaybackStatus {
        let Some(slot) = self.existing_slot(guild_id) else {
            return PlaybackStatus::Disconnected;
        };
        let guard = slot.lock().await;
        match guard.as_ref() {
            None => PlaybackStatus::Disconnected,
            Some(session) => match &session.playback {
                None => PlaybackStatus::Idle,
                Some(playback) if playback.paused => PlaybackStatus::Paused,
                Some(_) => PlaybackStatus::Playing,
            },
        }
    }

    pub async fn connected_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let slot = self.existing_slot(guild_id)?;
        let guard = slot.lock().await;
        guard.as_ref().map(|session| session.channel_id)
    }

    pub async fn current_title(&self, guild_id: GuildId) -> Option<String> {
        self.with_playback(guild_id, |p| p.source.title().to_string())
            .await
    }

    pub async fn current_volume(&self, guild_id: GuildId) -> Option<f32> {
        self.with_playback(guild_id, |p| p.source.volume()).await
    }

    pub async fn current_playback(&self, guild_id: GuildId) -> Option<PlaybackId> {
        self.with_playback(guild_id, |p| p.id).await
    }

    async fn with_playback<T>(&self, guild_id: GuildId, f: impl FnOnce(&Playback) -> T) -> Option<T> {
        let slot = self.existing_slot(guild_id)?;
        let guard = slot.lock().await;
        guard.as_ref()?.playback.as_ref().map(f)
    }
}
