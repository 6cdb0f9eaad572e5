//! Auto-play for the guild's dedicated music channel: every message posted
//! there is a play request for its whole text.

use serenity::model::id::{ChannelId, GuildId};
use tracing::{info, warn};

use crate::{
    audio::controller::{RequestOrigin, VoiceSessionController},
    error::MusicError,
};

/// Reproduce el texto del mensaje y devuelve la respuesta para el canal.
///
/// Errors never leave this function; each one becomes a reply. An author
/// outside voice always gets the notice; otherwise messages with no text
/// (attachments, embeds) return `None`.
pub async fn handle_request(
    controller: &VoiceSessionController,
    guild_id: GuildId,
    author_voice: Option<ChannelId>,
    content: &str,
) -> Option<String> {
    if author_voice.is_none() {
        info!("ℹ️ Petición ignorada en guild {}: autor fuera de voz", guild_id);
        return Some(format!("ℹ️ {}", MusicError::NotInVoice));
    }

    let query = content.trim();
    if query.is_empty() {
        return None;
    }

    info!("🎶 Petición en canal de música de guild {}: {}", guild_id, query);

    let reply = match controller
        .play(guild_id, author_voice, query, RequestOrigin::DedicatedChannel)
        .await
    {
        Ok(title) => format!("🎵 Reproduciendo: **{title}**"),
        Err(e @ (MusicError::NotInVoice | MusicError::AlreadyConnectedElsewhere)) => {
            info!("ℹ️ Petición ignorada en guild {}: {}", guild_id, e);
            format!("ℹ️ {e}")
        }
        Err(e) if e.is_notice() => format!("ℹ️ {e}"),
        Err(e) => {
            warn!("Error en petición del canal de música en guild {}: {:?}", guild_id, e);
            format!("❌ Ocurrió un error: {e}")
        }
    };

    Some(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{controller::PlaybackStatus, testing::*},
        sources::MockMediaResolver,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn request_without_voice_creates_no_state() {
        let mut resolver = MockMediaResolver::new();
        resolver.expect_resolve().never();
        let (controller, transport) = controller(Arc::new(resolver));

        let reply = handle_request(&controller, guild(), None, "lofi").await;

        assert_eq!(reply, Some("ℹ️ Debes estar en un canal de voz".to_string()));
        assert_eq!(controller.status(guild()).await, PlaybackStatus::Disconnected);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn request_auto_joins_and_plays() {
        let (controller, transport) = controller(Arc::new(echo_resolver()));

        let reply = handle_request(&controller, guild(), Some(channel_a()), "  lofi beats ").await;

        assert_eq!(reply, Some("🎵 Reproduciendo: **lofi beats**".to_string()));
        assert_eq!(controller.connected_channel(guild()).await, Some(channel_a()));
        assert_eq!(transport.calls(), vec![format!("connect {} {}", guild(), channel_a())]);
        assert_eq!(controller.status(guild()).await, PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn request_from_another_channel_leaves_session_untouched() {
        let (controller, transport) = controller(Arc::new(echo_resolver()));
        handle_request(&controller, guild(), Some(channel_a()), "first").await;

        let reply = handle_request(&controller, guild(), Some(channel_b()), "second").await;

        assert_eq!(
            reply,
            Some("ℹ️ Ya estoy conectado a otro canal de voz".to_string())
        );
        assert_eq!(controller.connected_channel(guild()).await, Some(channel_a()));
        assert_eq!(controller.current_title(guild()).await, Some("first".to_string()));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_request_keeps_connection() {
        let mut resolver = MockMediaResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Err(MusicError::Resolution("Video unavailable".into())));
        let (controller, transport) = controller(Arc::new(resolver));

        let reply = handle_request(&controller, guild(), Some(channel_a()), "missing").await;

        assert_eq!(
            reply,
            Some("❌ Ocurrió un error: No se pudo obtener el audio: Video unavailable".to_string())
        );
        assert_eq!(controller.status(guild()).await, PlaybackStatus::Idle);
        assert!(!transport.calls().iter().any(|c| c.starts_with("disconnect")));
    }

    #[tokio::test]
    async fn empty_message_without_voice_still_gets_notice() {
        let mut resolver = MockMediaResolver::new();
        resolver.expect_resolve().never();
        let (controller, transport) = controller(Arc::new(resolver));

        let reply = handle_request(&controller, guild(), None, "").await;

        assert_eq!(reply, Some("ℹ️ Debes estar en un canal de voz".to_string()));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_ignored() {
        let mut resolver = MockMediaResolver::new();
        resolver.expect_resolve().never();
        let (controller, _) = controller(Arc::new(resolver));

        assert_eq!(handle_request(&controller, guild(), Some(channel_a()), "   ").await, None);
        assert_eq!(controller.status(guild()).await, PlaybackStatus::Disconnected);
    }
}
