use serenity::model::id::{ChannelId, UserId};

use super::commands::{MusicCommand, PLAY_USAGE, SETCHANNEL_USAGE, VOLUME_USAGE};

/// Result of reading a text message as a prefixed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// No prefix: the message is ordinary text.
    NotACommand,
    Command(MusicCommand),
    /// Known command with bad arguments; carries the usage line.
    Invalid(&'static str),
    /// Prefixed but not one of ours.
    Unknown(String),
}

/// Lee `content` como comando, con `prefix` o mencionando al bot
pub fn parse(content: &str, prefix: &str, bot_id: UserId) -> Parsed {
    let Some(rest) = strip_prefix(content.trim_start(), prefix, bot_id) else {
        return Parsed::NotACommand;
    };

    let rest = rest.trim();
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    if name.is_empty() {
        return Parsed::NotACommand;
    }

    match name.to_lowercase().as_str() {
        "join" => Parsed::Command(MusicCommand::Join),
        "pause" => Parsed::Command(MusicCommand::Pause),
        "resume" => Parsed::Command(MusicCommand::Resume),
        "stop" => Parsed::Command(MusicCommand::Stop),
        "play" if args.is_empty() => Parsed::Invalid(PLAY_USAGE),
        "play" => Parsed::Command(MusicCommand::Play(args.to_string())),
        "volume" => match args.parse::<i64>() {
            Ok(percent) => Parsed::Command(MusicCommand::Volume(percent)),
            Err(_) => Parsed::Invalid(VOLUME_USAGE),
        },
        "setchannel" => match parse_channel(args) {
            Some(channel_id) => Parsed::Command(MusicCommand::SetChannel(channel_id)),
            None => Parsed::Invalid(SETCHANNEL_USAGE),
        },
        other => Parsed::Unknown(other.to_string()),
    }
}

fn strip_prefix<'a>(content: &'a str, prefix: &str, bot_id: UserId) -> Option<&'a str> {
    if let Some(rest) = content.strip_prefix(prefix) {
        return Some(rest);
    }

    // <@id> o <@!id>
    let mention = content.strip_prefix("<@")?;
    let mention = mention.strip_prefix('!').unwrap_or(mention);
    let (id, rest) = mention.split_once('>')?;
    (id.parse::<u64>().ok()? == bot_id.get()).then_some(rest)
}

// Acepta <#id> o el id numérico
fn parse_channel(arg: &str) -> Option<ChannelId> {
    let raw = arg
        .strip_prefix("<#")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(arg);

    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}
