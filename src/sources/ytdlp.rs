use std::{collections::HashMap, process::Stdio, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{MediaResolver, StreamDescriptor};
use crate::error::MusicError;

/// Resolvedor que ejecuta yt-dlp como subproceso
pub struct YtDlpResolver {
    program: String,
    timeout: Duration,
}

/// Subset of `yt-dlp --dump-single-json` output that the bot reads.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
    entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn args(query: &str) -> Vec<String> {
        [
            "--dump-single-json",
            "--format",
            "bestaudio/best",
            "--no-playlist",
            "--no-check-certificates",
            "--default-search",
            "auto",
            "--force-ipv4",
            "--quiet",
            "--no-warnings",
            // Evita que una búsqueda que empieza con '-' se lea como opción
            "--",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(query.to_string()))
        .collect()
    }

    /// Convierte la salida JSON de yt-dlp en un descriptor.
    ///
    /// Searches and playlists come back with an `entries` list; only the first
    /// entry is used.
    fn parse_output(stdout: &[u8]) -> Result<StreamDescriptor, MusicError> {
        let mut info: YtDlpInfo = serde_json::from_slice(stdout)
            .map_err(|e| MusicError::Resolution(format!("salida de yt-dlp inválida: {e}")))?;

        if let Some(entries) = info.entries.take() {
            info = entries
                .into_iter()
                .next()
                .ok_or_else(|| MusicError::Resolution("No se encontraron resultados".into()))?;
        }

        Ok(StreamDescriptor {
            title: info.title.unwrap_or_else(|| "Sin título".to_string()),
            stream_url: info.url.filter(|u| !u.trim().is_empty()),
            page_url: info.webpage_url,
            http_headers: info.http_headers,
        })
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<StreamDescriptor, MusicError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::Resolution("Búsqueda vacía".into()));
        }

        info!("🔍 Resolviendo con yt-dlp: {}", query);

        let mut cmd = Command::new(&self.program);
        cmd.args(Self::args(query))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Si vence el timeout, el futuro se descarta y el proceso muere con él
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(MusicError::Resolution(format!(
                    "no se pudo ejecutar yt-dlp: {e}"
                )))
            }
            Err(_) => {
                warn!("⏰ Timeout resolviendo: {}", query);
                return Err(MusicError::Resolution(format!(
                    "tiempo de espera agotado ({}s)",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp falló: {}", stderr.trim());
            return Err(MusicError::Resolution(stderr.trim().to_string()));
        }

        let descriptor = Self::parse_output(&output.stdout)?;
        debug!(title = %descriptor.title, page = ?descriptor.page_url, "yt-dlp resolved");
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_single_video() {
        let json = br#"{"title": "Song", "url": "https://cdn.example/a.webm", "webpage_url": "https://youtu.be/x"}"#;
        let d = YtDlpResolver::parse_output(json).unwrap();
        assert_eq!(
            d,
            StreamDescriptor {
                title: "Song".into(),
                stream_url: Some("https://cdn.example/a.webm".into()),
                page_url: Some("https://youtu.be/x".into()),
                http_headers: HashMap::new(),
            }
        );
    }

    #[test]
    fn request_headers_are_kept() {
        let json = br#"{"title": "t", "url": "https://cdn.example/a",
            "http_headers": {"User-Agent": "Mozilla/5.0", "Referer": "https://www.youtube.com/"}}"#;
        let d = YtDlpResolver::parse_output(json).unwrap();
        assert_eq!(d.http_headers.len(), 2);
        assert_eq!(
            d.http_headers.get("Referer").map(String::as_str),
            Some("https://www.youtube.com/")
        );
    }

    #[test]
    fn search_uses_first_entry() {
        let json = br#"{"title": "ytsearch", "entries": [
            {"title": "First", "url": "https://cdn.example/1"},
            {"title": "Second", "url": "https://cdn.example/2"}
        ]}"#;
        let d = YtDlpResolver::parse_output(json).unwrap();
        assert_eq!(d.title, "First");
        assert_eq!(d.stream_url.as_deref(), Some("https://cdn.example/1"));
    }

    #[test]
    fn empty_search_is_a_resolution_error() {
        let err = YtDlpResolver::parse_output(br#"{"entries": []}"#).unwrap_err();
        assert!(matches!(err, MusicError::Resolution(_)));
    }

    #[test]
    fn blank_url_is_dropped() {
        let d = YtDlpResolver::parse_output(br#"{"title": "t", "url": "  "}"#).unwrap();
        assert_eq!(d.stream_url, None);
    }

    #[test]
    fn garbage_output_is_rejected() {
        assert!(YtDlpResolver::parse_output(b"ERROR: nope").is_err());
    }

    #[test]
    fn query_goes_after_option_terminator() {
        let args = YtDlpResolver::args("-rf everything");
        assert_eq!(args[args.len() - 1], "-rf everything");
        assert_eq!(args[args.len() - 2], "--");
    }

    #[tokio::test]
    async fn blank_query_fails_without_spawning() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp", Duration::from_secs(1));
        let err = resolver.resolve("   ").await.unwrap_err();
        assert_eq!(err, MusicError::Resolution("Búsqueda vacía".into()));
    }

    #[tokio::test]
    async fn missing_binary_is_a_resolution_error() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp", Duration::from_secs(5));
        let err = resolver.resolve("never gonna").await.unwrap_err();
        assert!(matches!(err, MusicError::Resolution(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_process_is_killed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("ytdlp-timeout-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("slow-yt-dlp");
        let marker = dir.join("finished");
        let _ = std::fs::remove_file(&marker);
        std::fs::write(
            &script,
            format!("#!/bin/sh\nsleep 1\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = YtDlpResolver::new(script.to_string_lossy(), Duration::from_millis(200));
        let err = resolver.resolve("anything").await.unwrap_err();
        assert!(matches!(err, MusicError::Resolution(_)));

        // El script habría terminado ya si siguiera vivo
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "yt-dlp kept running after the timeout");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
