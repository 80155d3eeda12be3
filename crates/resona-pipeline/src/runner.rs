//! Staged job orchestration: normalize, fetch, convert, embed, store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use resona_core::track::{sanitize_filename, RawTrack, TrackDescriptor};
use resona_core::{EmbeddingRecord, CLIP_SECONDS, SAMPLE_RATE_HZ};
use resona_index::VectorIndex;

use crate::artifact::{write_artifact, TrackEmbedding};
use crate::config::Config;
use crate::convert::{convert_directory, read_wav};
use crate::embed::{reduce, EmbeddingModel, LayerSelect, ReducePolicy};
use crate::error::{PipelineError, PipelineResult};
use crate::fetch::{PreviewFetcher, PreviewResolver};
use crate::job::{JobId, JobResult, JobStage, JobStatus};

/// Hard ceiling on a single job's runtime.
const JOB_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How long a job may run before a slow-job warning is logged.
const JOB_SOFT_LIMIT: Duration = Duration::from_secs(25 * 60);

/// Owns submitted jobs and drives each one through its stages on a
/// spawned task. Cheap to clone; all clones share the same job table.
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    model: Arc<dyn EmbeddingModel>,
    index: Arc<VectorIndex>,
    resolver: Arc<dyn PreviewResolver>,
    jobs: RwLock<HashMap<JobId, JobStatus>>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl JobRunner {
    pub fn new(
        config: Config,
        model: Arc<dyn EmbeddingModel>,
        index: Arc<VectorIndex>,
        resolver: Arc<dyn PreviewResolver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                model,
                index,
                resolver,
                jobs: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Accept a batch of raw saved-track records for a user and start
    /// processing it in the background. Returns immediately with the
    /// job id to poll.
    pub async fn submit(&self, user_id: &str, tracks: Vec<RawTrack>) -> JobId {
        let id = Uuid::new_v4();
        {
            let mut jobs = self.inner.jobs.write().await;
            jobs.insert(id, JobStatus::new(id, user_id));
        }
        log::info!("Job {id} accepted for user {user_id} ({} records)", tracks.len());

        let inner = Arc::clone(&self.inner);
        let user = user_id.to_string();
        tokio::spawn(async move {
            let watchdog = tokio::spawn(async move {
                sleep(JOB_SOFT_LIMIT).await;
                log::warn!("Job {id} still running after {}s", JOB_SOFT_LIMIT.as_secs());
            });

            let outcome = timeout(JOB_TIMEOUT, inner.run_job(id, &user, tracks)).await;
            watchdog.abort();

            match outcome {
                Ok(Ok(result)) => {
                    log::info!(
                        "Job {id} completed: {} embeddings from {} tracks",
                        result.embeddings_generated,
                        result.tracks_processed
                    );
                    inner.update(id, |s| s.complete(result)).await;
                }
                Ok(Err(e)) => {
                    log::error!("Job {id} failed: {e}");
                    inner.update(id, |s| s.fail(&e)).await;
                }
                Err(_) => {
                    log::error!("Job {id} timed out after {}s", JOB_TIMEOUT.as_secs());
                    inner
                        .update(id, |s| {
                            s.fail(format!(
                                "job timed out after {} seconds",
                                JOB_TIMEOUT.as_secs()
                            ));
                        })
                        .await;
                }
            }
        });

        id
    }

    /// Current snapshot of a job, or `None` for an unknown id.
    pub async fn status(&self, id: JobId) -> Option<JobStatus> {
        self.inner.jobs.read().await.get(&id).cloned()
    }

    /// Drop a terminal job from the table, returning its final state.
    /// Non-terminal jobs are left in place.
    pub async fn release(&self, id: JobId) -> Option<JobStatus> {
        let mut jobs = self.inner.jobs.write().await;
        match jobs.get(&id) {
            Some(status) if status.stage.is_terminal() => jobs.remove(&id),
            _ => None,
        }
    }
}

impl Inner {
    async fn update(&self, id: JobId, f: impl FnOnce(&mut JobStatus)) {
        let mut jobs = self.jobs.write().await;
        if let Some(status) = jobs.get_mut(&id) {
            f(status);
        }
    }

    async fn run_job(
        &self,
        id: JobId,
        user_id: &str,
        tracks: Vec<RawTrack>,
    ) -> PipelineResult<JobResult> {
        self.update(id, |s| s.advance(JobStage::Started, "Job started"))
            .await;

        // Stage: validate and normalize the submitted records.
        self.update(id, |s| s.advance(JobStage::Processing, "Normalizing track records"))
            .await;

        if tracks.is_empty() {
            return Err(PipelineError::NoTracks);
        }

        let descriptors: Vec<TrackDescriptor> = tracks
            .iter()
            .filter(|t| {
                let keep = is_record(t);
                if !keep {
                    log::warn!("Skipping non-record entry in submitted tracks");
                }
                keep
            })
            .map(RawTrack::normalize)
            .collect();

        if descriptors.is_empty() {
            return Err(PipelineError::NoValidTracks);
        }
        log::info!("Job {id}: {} of {} records accepted", descriptors.len(), tracks.len());

        // Stage: fetch preview clips.
        self.update(id, |s| s.advance(JobStage::Downloading, "Downloading previews"))
            .await;

        let previews_dir = self.config.previews_dir(user_id);
        let fetcher = PreviewFetcher::new(
            Arc::clone(&self.resolver),
            previews_dir.clone(),
            Duration::from_secs(self.config.download_timeout_secs),
        )?;
        let summary = fetcher.download_all(&descriptors).await;
        if !summary.success {
            return Err(PipelineError::FetchFailed(summary.message));
        }
        log::info!("Job {id}: {}", summary.message);

        // Stage: normalize audio.
        self.update(id, |s| s.advance(JobStage::Converting, "Converting audio"))
            .await;

        let wav_dir = self.config.wav_dir(user_id);
        let converted = tokio::task::spawn_blocking(move || {
            convert_directory(&previews_dir, &wav_dir, SAMPLE_RATE_HZ, CLIP_SECONDS)
        })
        .await
        .map_err(|e| PipelineError::InvalidInput(format!("conversion task panicked: {e}")))??;

        // Stage: embed, reduce, store.
        self.update(id, |s| s.advance(JobStage::Embedding, "Extracting embeddings"))
            .await;

        let by_stem: HashMap<String, &TrackDescriptor> = descriptors
            .iter()
            .map(|t| (sanitize_filename(&t.dedup_key()), t))
            .collect();

        let mut artifacts: Vec<TrackEmbedding> = Vec::new();
        let mut stored = 0usize;

        for wav_path in &converted {
            let Some(stem) = wav_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(track) = by_stem.get(stem) else {
                log::warn!("No track record matches converted file {stem}, skipping");
                continue;
            };

            let (samples, rate) = match read_wav(wav_path) {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("Skipping {stem}: {e}");
                    continue;
                }
            };

            let vector = match self.model.embed(&samples, rate).await {
                Ok(hidden) => {
                    match reduce(&hidden, LayerSelect::Last, ReducePolicy::Mean) {
                        Ok(reduced) => match reduced.into_vector() {
                            Some(v) => v,
                            None => continue,
                        },
                        Err(e) => {
                            log::warn!("Reduction failed for {stem}: {e}");
                            continue;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Embedding failed for {stem}: {e}");
                    continue;
                }
            };

            let mut metadata = Map::new();
            metadata.insert("name".to_string(), Value::String(track.name.clone()));
            metadata.insert("artist".to_string(), Value::String(track.artist.clone()));
            metadata.insert("user_id".to_string(), Value::String(user_id.to_string()));

            let record =
                EmbeddingRecord::new(track.id.clone(), vector.clone()).with_metadata(metadata);
            match self.index.store_embedding(record).await {
                Ok(true) => stored += 1,
                Ok(false) => {
                    log::warn!("Index rejected embedding for track {} after retries", track.id);
                }
                Err(e) => {
                    log::warn!("Cannot store embedding for track {}: {e}", track.id);
                    continue;
                }
            }

            artifacts.push(TrackEmbedding {
                track_id: track.id.clone(),
                source_file: format!("{stem}.wav"),
                vector,
            });
        }

        // The artifact is written once per completed job, even when
        // every track failed and it holds an empty list.
        let artifact_path = write_artifact(&self.config.embeddings_dir(), user_id, &artifacts)?;

        log::info!(
            "Job {id}: {} embeddings generated, {stored} stored in index",
            artifacts.len()
        );

        Ok(JobResult {
            tracks_processed: descriptors.len(),
            embeddings_generated: artifacts.len(),
            embeddings_path: Some(artifact_path.display().to_string()),
        })
    }
}

/// Object payloads always normalize, worst case to sentinel values;
/// a non-object entry carries no fields to salvage and is skipped.
fn is_record(track: &RawTrack) -> bool {
    match track {
        RawTrack::Unknown(value) => value.is_object(),
        _ => true,
    }
}
