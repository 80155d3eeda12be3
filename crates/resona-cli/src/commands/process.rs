use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use resona_core::track::RawTrack;
use resona_pipeline::{
    Config, EmbeddingModel, HttpEmbeddingModel, HttpPreviewResolver, JobRunner, JobStage,
    NullResolver, PreviewResolver,
};

/// How often the submitted job is polled for progress.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Inference calls cover a whole clip; give them more room than
/// ordinary HTTP requests.
const MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Submit one processing job for a user's saved tracks and poll it to
/// completion, printing stage transitions as they happen.
pub async fn run_process(tracks_path: PathBuf, user: &str, config: Config) -> Result<()> {
    let json = std::fs::read_to_string(&tracks_path)
        .with_context(|| format!("Failed to read {}", tracks_path.display()))?;
    let tracks: Vec<RawTrack> =
        serde_json::from_str(&json).context("Tracks file is not a JSON array of track records")?;

    println!("Loaded {} track records from {}", tracks.len(), tracks_path.display());

    let model_url = config
        .model_url
        .clone()
        .context("model_url is not configured; set it in the config file or RESONA_MODEL_URL")?;
    let model: Arc<dyn EmbeddingModel> =
        Arc::new(HttpEmbeddingModel::new(model_url, MODEL_TIMEOUT)?);

    let resolver: Arc<dyn PreviewResolver> = match &config.resolver_url {
        Some(url) => Arc::new(HttpPreviewResolver::new(
            url.clone(),
            Duration::from_secs(config.download_timeout_secs),
        )?),
        None => Arc::new(NullResolver),
    };

    let index = super::connect_index(&config, config.recreate_collection).await?;

    let runner = JobRunner::new(config, model, Arc::new(index), resolver);
    let id = runner.submit(user, tracks).await;
    println!("Submitted job {id} for user {user}\n");

    let mut last_progress = None;
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let Some(status) = runner.status(id).await else {
            anyhow::bail!("Job {id} disappeared from the runner");
        };

        if last_progress != Some(status.progress) {
            println!("  [{:>3}%] {} - {}", status.progress, status.stage, status.message);
            last_progress = Some(status.progress);
        }

        if status.stage.is_terminal() {
            println!();
            if status.stage == JobStage::Failed {
                anyhow::bail!(
                    "Job failed: {}",
                    status.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }

            if let Some(result) = status.result {
                println!("Tracks processed:      {}", result.tracks_processed);
                println!("Embeddings generated:  {}", result.embeddings_generated);
                if let Some(path) = result.embeddings_path {
                    println!("Embeddings written to: {path}");
                }
            }
            return Ok(());
        }
    }
}
