use std::fmt;

use thiserror::Error;

/// Redundant request against the playback state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `pause` while already paused or with nothing playing.
    Pause,
    /// `resume` while already playing or with nothing paused.
    Resume,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Pause => f.write_str("La música ya está pausada o no se está reproduciendo"),
            Transition::Resume => {
                f.write_str("La música ya se está reproduciendo o no hay nada pausado")
            }
        }
    }
}

/// Errores del controlador de sesiones de voz.
///
/// The `Display` text of every variant is what users see in chat, so it is
/// written for them rather than for logs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MusicError {
    #[error("Debes estar en un canal de voz")]
    NotInVoice,

    #[error("No estoy conectado a ningún canal de voz")]
    NotConnected,

    #[error("No hay nada reproduciéndose")]
    NothingPlaying,

    #[error("No se pudo obtener el audio: {0}")]
    Resolution(String),

    #[error("Ya estoy conectado a otro canal de voz")]
    AlreadyConnectedElsewhere,

    #[error("{0}")]
    RedundantTransition(Transition),

    /// A newer request (or a disconnect) replaced this one while it was resolving.
    #[error("La petición fue reemplazada por otra más reciente")]
    Superseded,

    #[error("Error de conexión de voz: {0}")]
    Transport(String),
}

impl MusicError {
    /// Informational outcomes that are reported but are not failures.
    pub fn is_notice(&self) -> bool {
        matches!(
            self,
            MusicError::RedundantTransition(_) | MusicError::Superseded
        )
    }
}
