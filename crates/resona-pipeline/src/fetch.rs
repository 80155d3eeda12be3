//! Preview fetching: resolve preview URLs and download clips.
//!
//! Individual download failures never abort a batch; they are logged
//! and the track is skipped. Only a structural failure (the resolver
//! being entirely unreachable) marks the whole batch as failed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use resona_core::TrackDescriptor;

use crate::error::{PipelineError, PipelineResult};

/// Outcome of one fetch batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    /// Whether the batch as a whole ran. Per-track failures do not
    /// clear this; a dead resolver does.
    pub success: bool,
    pub message: String,
    pub tracks_total: usize,
    pub tracks_downloaded: usize,
}

impl FetchSummary {
    fn failed(tracks_total: usize, message: String) -> Self {
        Self {
            success: false,
            message,
            tracks_total,
            tracks_downloaded: 0,
        }
    }
}

/// External preview-URL resolution capability.
///
/// Given tracks lacking an inline preview URL, returns a mapping from
/// `"name - artist"` key to a playable audio URL. Production talks to
/// whatever resolver service is deployed; tests substitute canned
/// mappings.
#[async_trait]
pub trait PreviewResolver: Send + Sync {
    async fn resolve(
        &self,
        tracks: &[TrackDescriptor],
    ) -> PipelineResult<HashMap<String, String>>;
}

/// Resolver client speaking a JSON-over-HTTP protocol: POST a list of
/// `{name, artist}` pairs, receive a key-to-URL map back.
#[derive(Debug, Clone)]
pub struct HttpPreviewResolver {
    http: Client,
    endpoint: String,
}

impl HttpPreviewResolver {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let http = Client::builder()
            .user_agent("resona/0.1.0 (https://github.com/oxur/resona)")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PreviewResolver for HttpPreviewResolver {
    async fn resolve(
        &self,
        tracks: &[TrackDescriptor],
    ) -> PipelineResult<HashMap<String, String>> {
        let request: Vec<serde_json::Value> = tracks
            .iter()
            .map(|t| serde_json::json!({ "name": t.name, "artist": t.artist }))
            .collect();

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Resolver(e.to_string()))?
            .error_for_status()
            .map_err(|e| PipelineError::Resolver(e.to_string()))?;

        response
            .json::<HashMap<String, String>>()
            .await
            .map_err(|e| PipelineError::Resolver(format!("invalid resolver response: {e}")))
    }
}

/// Resolver used when no resolver service is configured: resolves
/// nothing, so tracks without inline preview URLs are skipped.
#[derive(Debug, Clone, Default)]
pub struct NullResolver;

#[async_trait]
impl PreviewResolver for NullResolver {
    async fn resolve(
        &self,
        tracks: &[TrackDescriptor],
    ) -> PipelineResult<HashMap<String, String>> {
        log::warn!(
            "No preview resolver configured; {} tracks without inline URLs will be skipped",
            tracks.len()
        );
        Ok(HashMap::new())
    }
}

/// Downloads preview clips for a batch of tracks into one directory.
pub struct PreviewFetcher {
    http: Client,
    resolver: std::sync::Arc<dyn PreviewResolver>,
    previews_dir: PathBuf,
}

impl std::fmt::Debug for PreviewFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewFetcher")
            .field("previews_dir", &self.previews_dir)
            .finish_non_exhaustive()
    }
}

impl PreviewFetcher {
    pub fn new(
        resolver: std::sync::Arc<dyn PreviewResolver>,
        previews_dir: PathBuf,
        timeout: Duration,
    ) -> PipelineResult<Self> {
        let http = Client::builder()
            .user_agent("resona/0.1.0 (https://github.com/oxur/resona)")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            resolver,
            previews_dir,
        })
    }

    /// Download previews for every track in the batch.
    ///
    /// Tracks with an inline `preview_url` use it directly; the rest
    /// are resolved by `"name - artist"` key. A file that already
    /// exists is treated as downloaded and skipped.
    pub async fn download_all(&self, tracks: &[TrackDescriptor]) -> FetchSummary {
        if let Err(e) = tokio::fs::create_dir_all(&self.previews_dir).await {
            return FetchSummary::failed(
                tracks.len(),
                format!("cannot create previews directory: {e}"),
            );
        }

        let unresolved: Vec<TrackDescriptor> = tracks
            .iter()
            .filter(|t| t.preview_url.is_none())
            .cloned()
            .collect();

        let resolved = if unresolved.is_empty() {
            HashMap::new()
        } else {
            match self.resolver.resolve(&unresolved).await {
                Ok(map) => map,
                Err(e) => {
                    log::error!("Preview resolution failed: {e}");
                    return FetchSummary::failed(
                        tracks.len(),
                        format!("preview resolution failed: {e}"),
                    );
                }
            }
        };

        let mut downloaded = 0;
        for track in tracks {
            let key = track.dedup_key();
            let url = track
                .preview_url
                .clone()
                .or_else(|| resolved.get(&key).cloned());

            let Some(url) = url else {
                log::warn!("No preview available for {key}");
                continue;
            };

            let path = self.previews_dir.join(track.preview_filename());
            if path.exists() {
                log::debug!("Preview for {key} already downloaded, skipping");
                continue;
            }

            match self.download_preview(&url, &path).await {
                Ok(()) => downloaded += 1,
                Err(e) => {
                    log::warn!("Failed to download preview for {key}: {e}");
                    // A partial file must not satisfy the exists-check
                    // on the next run.
                    if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                        log::debug!("Could not remove partial download: {cleanup}");
                    }
                }
            }
        }

        FetchSummary {
            success: true,
            message: format!(
                "Downloaded {downloaded} previews out of {} tracks",
                tracks.len()
            ),
            tracks_total: tracks.len(),
            tracks_downloaded: downloaded,
        }
    }

    /// Stream one clip to disk.
    async fn download_preview(&self, url: &str, path: &Path) -> PipelineResult<()> {
        let response = self.http.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct CannedResolver {
        map: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PreviewResolver for CannedResolver {
        async fn resolve(
            &self,
            _tracks: &[TrackDescriptor],
        ) -> PipelineResult<HashMap<String, String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.map.clone())
        }
    }

    struct DeadResolver;

    #[async_trait]
    impl PreviewResolver for DeadResolver {
        async fn resolve(
            &self,
            _tracks: &[TrackDescriptor],
        ) -> PipelineResult<HashMap<String, String>> {
            Err(PipelineError::Resolver("resolver unreachable".to_string()))
        }
    }

    fn track(id: &str, name: &str, artist: &str, preview_url: Option<&str>) -> TrackDescriptor {
        TrackDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
            duration_ms: 0,
            preview_url: preview_url.map(str::to_string),
        }
    }

    /// Minimal HTTP server that serves a fixed body and counts hits.
    async fn spawn_preview_server(body: &'static [u8], hits: Arc<AtomicUsize>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                hits.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(header.as_bytes()).await;
                let _ = socket.write_all(body).await;
            }
        });
        format!("http://{addr}/preview.mp3")
    }

    fn fetcher(resolver: Arc<dyn PreviewResolver>, dir: &Path) -> PreviewFetcher {
        PreviewFetcher::new(resolver, dir.to_path_buf(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_download_with_inline_url() {
        let temp = TempDir::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_preview_server(b"AUDIODATA", Arc::clone(&hits)).await;

        let tracks = vec![track("t1", "Aria", "Bach", Some(&url))];
        let fetcher = fetcher(Arc::new(NullResolver), temp.path());

        let summary = fetcher.download_all(&tracks).await;
        assert!(summary.success);
        assert_eq!(summary.tracks_total, 1);
        assert_eq!(summary.tracks_downloaded, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let content = std::fs::read(temp.path().join("Aria - Bach.mp3")).unwrap();
        assert_eq!(content, b"AUDIODATA");
    }

    #[tokio::test]
    async fn test_existing_file_is_not_redownloaded() {
        let temp = TempDir::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_preview_server(b"AUDIODATA", Arc::clone(&hits)).await;

        let tracks = vec![track("t1", "Aria", "Bach", Some(&url))];
        let fetcher = fetcher(Arc::new(NullResolver), temp.path());

        let first = fetcher.download_all(&tracks).await;
        assert_eq!(first.tracks_downloaded, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Second run: the file exists, so the download function is
        // never invoked for it.
        let second = fetcher.download_all(&tracks).await;
        assert!(second.success);
        assert_eq!(second.tracks_downloaded, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolver_supplies_missing_urls() {
        let temp = TempDir::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_preview_server(b"X", Arc::clone(&hits)).await;

        let mut map = HashMap::new();
        map.insert("Gymnopedie - Satie".to_string(), url);
        let resolver = Arc::new(CannedResolver {
            map,
            calls: AtomicUsize::new(0),
        });

        let tracks = vec![track("t1", "Gymnopedie", "Satie", None)];
        let fetcher = fetcher(Arc::clone(&resolver) as Arc<dyn PreviewResolver>, temp.path());

        let summary = fetcher.download_all(&tracks).await;
        assert!(summary.success);
        assert_eq!(summary.tracks_downloaded, 1);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolver_not_called_when_all_urls_inline() {
        let temp = TempDir::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_preview_server(b"X", Arc::clone(&hits)).await;

        let resolver = Arc::new(CannedResolver {
            map: HashMap::new(),
            calls: AtomicUsize::new(0),
        });
        let tracks = vec![track("t1", "Aria", "Bach", Some(&url))];
        let fetcher = fetcher(Arc::clone(&resolver) as Arc<dyn PreviewResolver>, temp.path());

        let _ = fetcher.download_all(&tracks).await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dead_resolver_fails_whole_batch() {
        let temp = TempDir::new().unwrap();
        let tracks = vec![
            track("t1", "Gymnopedie", "Satie", None),
            track("t2", "Aria", "Bach", None),
        ];
        let fetcher = fetcher(Arc::new(DeadResolver), temp.path());

        let summary = fetcher.download_all(&tracks).await;
        assert!(!summary.success);
        assert_eq!(summary.tracks_downloaded, 0);
        assert!(summary.message.contains("resolver"));
    }

    #[tokio::test]
    async fn test_unreachable_url_is_skipped_not_fatal() {
        let temp = TempDir::new().unwrap();
        let tracks = vec![
            track("t1", "Broken", "Nobody", Some("http://127.0.0.1:1/nope.mp3")),
        ];
        let fetcher = fetcher(Arc::new(NullResolver), temp.path());

        let summary = fetcher.download_all(&tracks).await;
        assert!(summary.success);
        assert_eq!(summary.tracks_downloaded, 0);
        // No partial file left behind.
        assert!(!temp.path().join("Broken - Nobody.mp3").exists());
    }

    #[tokio::test]
    async fn test_track_without_url_or_resolution_is_skipped() {
        let temp = TempDir::new().unwrap();
        let tracks = vec![track("t1", "Unheard", "Anon", None)];
        let fetcher = fetcher(Arc::new(NullResolver), temp.path());

        let summary = fetcher.download_all(&tracks).await;
        assert!(summary.success);
        assert_eq!(summary.tracks_downloaded, 0);
    }
}
