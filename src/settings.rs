use std::collections::HashMap;

use parking_lot::RwLock;
use serenity::model::id::{ChannelId, GuildId};
use tracing::info;

/// Configuración de una guild (sólo en memoria)
#[derive(Debug, Default)]
pub struct GuildConfig {
    /// Text channel whose messages are treated as play requests.
    pub music_channel: Option<ChannelId>,
}

/// Per-guild settings registry; lost on restart.
#[derive(Default)]
pub struct GuildSettings {
    guilds: RwLock<HashMap<GuildId, GuildConfig>>,
}

impl GuildSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establece (o reemplaza) el canal de música de la guild
    pub fn set_music_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        let mut guilds = self.guilds.write();
        guilds.entry(guild_id).or_default().music_channel = Some(channel_id);
        info!("🎶 Canal de música de guild {} establecido a {}", guild_id, channel_id);
    }

    pub fn music_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.guilds
            .read()
            .get(&guild_id)
            .and_then(|config| config.music_channel)
    }

    pub fn is_music_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> bool {
        self.music_channel(guild_id) == Some(channel_id)
    }
}
