use std::collections::HashMap;

use url::Url;

use crate::{error::MusicError, sources::StreamDescriptor};

/// Volumen por defecto de una fuente nueva
pub const DEFAULT_VOLUME: f32 = 0.5;

/// A resolved, playable track with its own volume.
///
/// `title` and `stream_url` are fixed at creation; only the volume changes.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    title: String,
    stream_url: String,
    http_headers: HashMap<String, String>,
    volume: f32,
}

impl AudioSource {
    /// Crea una fuente a partir del resultado del resolvedor.
    ///
    /// Fails with [`MusicError::Resolution`] when the descriptor has no
    /// absolute http(s) media URL.
    pub fn create(descriptor: StreamDescriptor, volume: f32) -> Result<Self, MusicError> {
        let stream_url = descriptor.stream_url.ok_or_else(|| {
            MusicError::Resolution(format!("'{}' no tiene un formato reproducible", descriptor.title))
        })?;

        let parsed = Url::parse(&stream_url)
            .map_err(|e| MusicError::Resolution(format!("URL de stream inválida: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MusicError::Resolution(format!(
                "esquema no soportado: {}",
                parsed.scheme()
            )));
        }

        Ok(Self {
            title: descriptor.title,
            stream_url,
            http_headers: descriptor.http_headers,
            volume,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn http_headers(&self) -> &HashMap<String, String> {
        &self.http_headers
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// No validation: out-of-range values are the caller's responsibility.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }
}
