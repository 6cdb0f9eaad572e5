//! # Sources Module
//!
//! Resolution of user requests (URLs or free-text searches) into playable
//! stream descriptors.
//!
//! The bot never extracts media itself: [`YtDlpResolver`] shells out to
//! `yt-dlp` and only keeps the title and the direct media URL of the result.
//! Anything that implements [`MediaResolver`] can stand in for it, which is
//! how the controller tests run without network access.

pub mod ytdlp;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::MusicError;

pub use ytdlp::YtDlpResolver;

/// Resultado de resolver una URL o búsqueda
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub title: String,
    /// Direct media location; `None` when the extractor returned no playable format.
    pub stream_url: Option<String>,
    /// Original page of the media, when known.
    pub page_url: Option<String>,
    /// Headers the media host expects on the stream request (user agent, referer).
    pub http_headers: HashMap<String, String>,
}

impl StreamDescriptor {
    pub fn new(title: impl Into<String>, stream_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            stream_url: Some(stream_url.into()),
            page_url: None,
            http_headers: HashMap::new(),
        }
    }
}

/// Trait común para los resolvedores de medios
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resuelve una URL o término de búsqueda.
    ///
    /// May take several seconds; implementations must not block the async
    /// reactor while doing so.
    async fn resolve(&self, query: &str) -> Result<StreamDescriptor, MusicError>;
}
