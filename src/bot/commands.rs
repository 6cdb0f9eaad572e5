use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{CommandDataOption, CommandDataOptionValue, CommandOptionType},
        channel::ChannelType,
        id::{ChannelId, GuildId},
    },
    prelude::Context,
};

/// Una orden del usuario, venga de un comando slash o de un mensaje con prefijo
#[derive(Debug, Clone, PartialEq)]
pub enum MusicCommand {
    Join,
    Play(String),
    Volume(i64),
    Pause,
    Resume,
    Stop,
    SetChannel(ChannelId),
}

pub const PLAY_USAGE: &str = "Uso: play <url o búsqueda>";
pub const VOLUME_USAGE: &str = "Uso: volume <porcentaje>";
pub const SETCHANNEL_USAGE: &str = "Uso: setchannel <#canal>";

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        play_command(),
        volume_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        setchannel_command(),
    ]
}

/// Convierte las opciones de un comando slash en una orden
pub fn parse_slash(name: &str, options: &[CommandDataOption]) -> Result<MusicCommand, String> {
    let option = |key: &str| {
        options
            .iter()
            .find(|opt| opt.name == key)
            .map(|opt| &opt.value)
    };

    match name {
        "join" => Ok(MusicCommand::Join),
        "pause" => Ok(MusicCommand::Pause),
        "resume" => Ok(MusicCommand::Resume),
        "stop" => Ok(MusicCommand::Stop),
        "play" => option("query")
            .and_then(CommandDataOptionValue::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| MusicCommand::Play(q.to_string()))
            .ok_or_else(|| PLAY_USAGE.to_string()),
        "volume" => option("level")
            .and_then(CommandDataOptionValue::as_i64)
            .map(MusicCommand::Volume)
            .ok_or_else(|| VOLUME_USAGE.to_string()),
        "setchannel" => option("channel")
            .and_then(CommandDataOptionValue::as_channel_id)
            .map(MusicCommand::SetChannel)
            .ok_or_else(|| SETCHANNEL_USAGE.to_string()),
        other => Err(format!("❌ Comando no reconocido: {other}")),
    }
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Conecta el bot a tu canal de voz")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la música y desconecta el bot")
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce audio desde una URL o búsqueda")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

// El porcentaje no se limita: se acepta cualquier entero
fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "level",
                "Volumen en porcentaje",
            )
            .required(true),
        )
}

// Configuración

fn setchannel_command() -> CreateCommand {
    CreateCommand::new("setchannel")
        .description("Establece el canal de texto dedicado a la música")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Channel,
                "channel",
                "Canal donde cada mensaje se reproduce",
            )
            .channel_types(vec![ChannelType::Text])
            .required(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optionless_commands_parse() {
        assert_eq!(parse_slash("join", &[]), Ok(MusicCommand::Join));
        assert_eq!(parse_slash("pause", &[]), Ok(MusicCommand::Pause));
        assert_eq!(parse_slash("resume", &[]), Ok(MusicCommand::Resume));
        assert_eq!(parse_slash("stop", &[]), Ok(MusicCommand::Stop));
    }

    #[test]
    fn missing_required_options_give_usage() {
        assert_eq!(parse_slash("play", &[]), Err(PLAY_USAGE.to_string()));
        assert_eq!(parse_slash("volume", &[]), Err(VOLUME_USAGE.to_string()));
        assert_eq!(
            parse_slash("setchannel", &[]),
            Err(SETCHANNEL_USAGE.to_string())
        );
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse_slash("skip", &[]).is_err());
    }

    #[test]
    fn every_command_is_registered() {
        assert_eq!(all_commands().len(), 7);
    }
}
