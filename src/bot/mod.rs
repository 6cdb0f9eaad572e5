//! # Bot Module
//!
//! Discord event handling for the music bot.
//!
//! - Slash commands and prefixed text commands, both mapped onto
//!   [`handlers::execute`]
//! - Auto-play from the guild's dedicated music channel ([`autoplay`])
//! - Sessions that follow the bot when it is moved or kicked from voice
//!
//! The [`MusicBot`] struct implements Serenity's [`EventHandler`] trait and
//! owns the [`VoiceSessionController`] and the per-guild [`GuildSettings`].

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod autoplay;
pub mod commands;
pub mod handlers;
pub mod prefix;

use crate::{audio::controller::VoiceSessionController, config::Config, settings::GuildSettings};
use prefix::Parsed;

/// Main Discord bot handler.
pub struct MusicBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    /// Voice sessions and playback for every guild
    pub controller: Arc<VoiceSessionController>,
    /// Canal de música de cada guild (sólo en memoria)
    pub settings: Arc<GuildSettings>,
}

impl MusicBot {
    pub fn new(
        config: Arc<Config>,
        controller: Arc<VoiceSessionController>,
        settings: Arc<GuildSettings>,
    ) -> Self {
        Self {
            config,
            controller,
            settings,
        }
    }

    /// Registers slash commands globally, or on `GUILD_ID` when it is set.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌍 Registrando comandos globales");
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    async fn handle_message(&self, ctx: &Context, msg: &Message) -> Result<()> {
        let Some(guild_id) = msg.guild_id else {
            return Ok(());
        };

        let bot_id = ctx.cache.current_user().id;

        match prefix::parse(&msg.content, &self.config.command_prefix, bot_id) {
            Parsed::Command(command) => {
                handlers::handle_text_command(ctx, msg, guild_id, command, self).await?;
            }
            Parsed::Invalid(usage) => {
                msg.channel_id.say(&ctx.http, usage).await?;
            }
            Parsed::Unknown(name) => {
                debug!("Comando desconocido '{}' en guild {}", name, guild_id);
            }
            Parsed::NotACommand => {
                if !self.settings.is_music_channel(guild_id, msg.channel_id) {
                    return Ok(());
                }

                let author_voice = handlers::voice_channel_of(ctx, guild_id, msg.author.id);
                let typing = msg.channel_id.start_typing(&ctx.http);
                let reply =
                    autoplay::handle_request(&self.controller, guild_id, author_voice, &msg.content)
                        .await;
                typing.stop();

                if let Some(reply) = reply {
                    msg.channel_id.say(&ctx.http, reply).await?;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Ignorar bots, incluido este
        if msg.author.bot {
            return;
        }

        if let Err(e) = self.handle_message(&ctx, &msg).await {
            error!("Error manejando mensaje: {:?}", e);
        }
    }

    /// Keeps the session in step with voice changes made by someone else
    /// (kick, drag to another channel, channel deleted).
    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let sync = self
            .controller
            .voice_state_changed(guild_id, new.channel_id)
            .await;
        debug!(%guild_id, channel = ?new.channel_id, ?sync, "estado de voz del bot");
    }
}
