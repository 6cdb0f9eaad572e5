//! In-memory fakes for the voice transport and the resolver.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::{Notify, Semaphore};

use crate::{
    audio::{
        controller::VoiceSessionController,
        source::AudioSource,
        transport::{PlaybackHandle, PlaybackId, VoiceTransport},
    },
    error::MusicError,
    sources::{MediaResolver, MockMediaResolver, StreamDescriptor},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TrackState {
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug)]
pub(crate) struct FakeTrack {
    pub(crate) playback: PlaybackId,
    pub(crate) title: String,
    pub(crate) state: TrackState,
    pub(crate) volume: f32,
}

pub(crate) struct FakeHandle(Arc<SyncMutex<FakeTrack>>);

impl PlaybackHandle for FakeHandle {
    fn pause(&self) -> Result<(), MusicError> {
        self.0.lock().state = TrackState::Paused;
        Ok(())
    }

    fn resume(&self) -> Result<(), MusicError> {
        self.0.lock().state = TrackState::Playing;
        Ok(())
    }

    fn stop(&self) -> Result<(), MusicError> {
        self.0.lock().state = TrackState::Stopped;
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<(), MusicError> {
        self.0.lock().volume = volume;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    pub(crate) calls: SyncMutex<Vec<String>>,
    pub(crate) tracks: SyncMutex<Vec<Arc<SyncMutex<FakeTrack>>>>,
    /// Channel each guild's connection is really in.
    pub(crate) live: SyncMutex<HashMap<GuildId, ChannelId>>,
}

impl FakeTransport {
    /// Simula que alguien movió o expulsó al bot desde Discord
    pub(crate) fn set_live(&self, guild_id: GuildId, channel_id: Option<ChannelId>) {
        let mut live = self.live.lock();
        match channel_id {
            Some(channel_id) => live.insert(guild_id, channel_id),
            None => live.remove(&guild_id),
        };
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn track_states(&self) -> Vec<(String, TrackState)> {
        self.tracks
            .lock()
            .iter()
            .map(|t| {
                let t = t.lock();
                (t.title.clone(), t.state)
            })
            .collect()
    }

    pub(crate) fn last_track(&self) -> Arc<SyncMutex<FakeTrack>> {
        self.tracks.lock().last().cloned().unwrap()
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), MusicError> {
        self.calls
            .lock()
            .push(format!("connect {guild_id} {channel_id}"));
        self.live.lock().insert(guild_id, channel_id);
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), MusicError> {
        self.calls.lock().push(format!("disconnect {guild_id}"));
        self.live.lock().remove(&guild_id);
        Ok(())
    }

    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.live.lock().get(&guild_id).copied()
    }

    async fn start(
        &self,
        _guild_id: GuildId,
        playback: PlaybackId,
        source: &AudioSource,
    ) -> Result<Box<dyn PlaybackHandle>, MusicError> {
        // Sólo puede sonar una pista a la vez
        for track in self.tracks.lock().iter() {
            assert_ne!(track.lock().state, TrackState::Playing, "two tracks playing");
        }
        let track = Arc::new(SyncMutex::new(FakeTrack {
            playback,
            title: source.title().to_string(),
            state: TrackState::Playing,
            volume: source.volume(),
        }));
        self.tracks.lock().push(track.clone());
        Ok(Box::new(FakeHandle(track)))
    }
}

/// Resolves instantly except for queries starting with "slow", which wait
/// for a permit.
pub(crate) struct GatedResolver {
    pub(crate) started: Notify,
    pub(crate) release: Semaphore,
}

impl GatedResolver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            release: Semaphore::new(0),
        })
    }
}

#[async_trait]
impl MediaResolver for GatedResolver {
    async fn resolve(&self, query: &str) -> Result<StreamDescriptor, MusicError> {
        if query.starts_with("slow") {
            self.started.notify_one();
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|e| MusicError::Resolution(e.to_string()))?;
        }
        Ok(descriptor(query))
    }
}

pub(crate) fn descriptor(query: &str) -> StreamDescriptor {
    StreamDescriptor::new(query, format!("https://cdn.example/{}", query.replace(' ', "-")))
}

pub(crate) fn echo_resolver() -> MockMediaResolver {
    let mut resolver = MockMediaResolver::new();
    resolver
        .expect_resolve()
        .returning(|query| Ok(descriptor(query)));
    resolver
}

pub(crate) fn controller(
    resolver: Arc<dyn MediaResolver>,
) -> (Arc<VoiceSessionController>, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::default());
    let controller = Arc::new(VoiceSessionController::new(
        transport.clone(),
        resolver,
        0.5,
    ));
    (controller, transport)
}

pub(crate) fn guild() -> GuildId {
    GuildId::new(1)
}

pub(crate) fn channel_a() -> ChannelId {
    ChannelId::new(10)
}

pub(crate) fn channel_b() -> ChannelId {
    ChannelId::new(20)
}
