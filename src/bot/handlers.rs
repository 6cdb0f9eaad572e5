use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::{Context, Mentionable},
};
use tracing::{info, warn};

use super::{
    commands::{self, MusicCommand},
    MusicBot,
};
use crate::{
    audio::controller::{JoinOutcome, RequestOrigin, VoiceSessionController},
    error::MusicError,
    settings::GuildSettings,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let music_command = match commands::parse_slash(&command.data.name, &command.data.options) {
        Ok(music_command) => music_command,
        Err(usage) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content(usage)
                            .ephemeral(true),
                    ),
                )
                .await?;
            return Ok(());
        }
    };

    let author_voice = voice_channel_of(ctx, guild_id, command.user.id);

    // La resolución puede tardar más que el plazo de respuesta de Discord
    if matches!(music_command, MusicCommand::Play(_)) {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;

        let reply = reply_text(
            execute(&bot.controller, &bot.settings, guild_id, author_voice, music_command).await,
        );

        command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(reply))
            .await?;
        return Ok(());
    }

    let reply = reply_text(
        execute(&bot.controller, &bot.settings, guild_id, author_voice, music_command).await,
    );

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(reply)),
        )
        .await?;

    Ok(())
}

/// Maneja un comando escrito con prefijo
pub async fn handle_text_command(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    music_command: MusicCommand,
    bot: &MusicBot,
) -> Result<()> {
    info!(
        "📝 Comando {:?} usado por {} en guild {}",
        music_command, msg.author.name, guild_id
    );

    let author_voice = voice_channel_of(ctx, guild_id, msg.author.id);
    let typing = matches!(music_command, MusicCommand::Play(_))
        .then(|| msg.channel_id.start_typing(&ctx.http));

    let reply = reply_text(
        execute(&bot.controller, &bot.settings, guild_id, author_voice, music_command).await,
    );

    if let Some(typing) = typing {
        typing.stop();
    }

    msg.channel_id.say(&ctx.http, reply).await?;
    Ok(())
}

/// Ejecuta una orden y devuelve el texto de confirmación.
///
/// `author_voice` is the voice channel the author is in, if any.
pub async fn execute(
    controller: &VoiceSessionController,
    settings: &GuildSettings,
    guild_id: GuildId,
    author_voice: Option<ChannelId>,
    command: MusicCommand,
) -> Result<String, MusicError> {
    match command {
        MusicCommand::Join => {
            let channel_id = author_voice.ok_or(MusicError::NotInVoice)?;
            let reply = match controller.join(guild_id, channel_id).await? {
                JoinOutcome::Joined => format!("🔊 Conectado a {}", channel_id.mention()),
                JoinOutcome::Moved => format!("🔀 Movido a {}", channel_id.mention()),
                JoinOutcome::AlreadyThere => format!("✅ Ya estoy en {}", channel_id.mention()),
            };
            Ok(reply)
        }
        MusicCommand::Play(query) => {
            let title = controller
                .play(guild_id, author_voice, &query, RequestOrigin::Command)
                .await?;
            Ok(format!("🎵 Reproduciendo: **{title}**"))
        }
        MusicCommand::Volume(percent) => {
            controller.set_volume(guild_id, percent).await?;
            Ok(format!("🔊 Volumen ajustado a {percent}%"))
        }
        MusicCommand::Pause => {
            controller.pause(guild_id).await?;
            Ok("⏸️ Reproducción pausada".to_string())
        }
        MusicCommand::Resume => {
            controller.resume(guild_id).await?;
            Ok("▶️ Reproducción reanudada".to_string())
        }
        MusicCommand::Stop => {
            controller.stop(guild_id).await?;
            Ok("⏹️ Música detenida y desconectado".to_string())
        }
        MusicCommand::SetChannel(channel_id) => {
            settings.set_music_channel(guild_id, channel_id);
            Ok(format!(
                "🎶 Canal de música establecido: {}",
                channel_id.mention()
            ))
        }
    }
}

/// Convierte el resultado de una orden en el mensaje para el chat
pub fn reply_text(result: Result<String, MusicError>) -> String {
    match result {
        Ok(reply) => reply,
        Err(e) if e.is_notice() => {
            info!("ℹ️ {}", e);
            format!("ℹ️ {e}")
        }
        Err(e) => {
            warn!("Orden fallida: {:?}", e);
            format!("❌ {e}")
        }
    }
}

/// Canal de voz en el que está el usuario, según la caché
pub fn voice_channel_of(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
