use anyhow::Result;
use resona_pipeline::Config;

/// Print the nearest neighbors of a track with a stored embedding.
pub async fn run_similar(
    track_id: &str,
    limit: usize,
    min_score: f32,
    config: &Config,
) -> Result<()> {
    let index = super::connect_index(config, false).await?;

    let Some(vector) = index.get_embedding(track_id).await else {
        anyhow::bail!("No stored embedding for track {track_id}; run 'resona process' first");
    };

    // Ask for one extra hit since the query track matches itself with
    // score 1.0.
    let hits = index.similar_tracks(&vector, limit + 1, min_score).await;
    let neighbors: Vec<_> = hits
        .into_iter()
        .filter(|hit| hit.track_id != track_id)
        .take(limit)
        .collect();

    if neighbors.is_empty() {
        println!("No similar tracks found for {track_id}");
        return Ok(());
    }

    println!("Tracks similar to {track_id}:\n");
    for (rank, hit) in neighbors.iter().enumerate() {
        let name = hit
            .metadata
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<unknown>");
        let artist = hit
            .metadata
            .get("artist")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<unknown>");
        println!(
            "  {:>2}. {:.4}  {} - {} ({})",
            rank + 1,
            hit.score,
            name,
            artist,
            hit.track_id
        );
    }

    Ok(())
}
