pub mod config;
pub mod process;
pub mod similar;

pub use config::{init_config, show_config, show_config_example, show_config_path};
pub use process::run_process;
pub use similar::run_similar;

use anyhow::{Context, Result};
use resona_index::{HttpTransportFactory, IndexConfig, VectorIndex};
use resona_pipeline::Config;

/// Connect to the configured vector index and ensure the collection
/// exists.
pub(crate) async fn connect_index(config: &Config, recreate: bool) -> Result<VectorIndex> {
    let factory = Box::new(HttpTransportFactory::new(config.index_url.clone()));
    let index_config = IndexConfig {
        collection: config.collection.clone(),
        recreate,
        ..IndexConfig::default()
    };
    let index = VectorIndex::connect(factory, index_config)
        .await
        .with_context(|| format!("Failed to connect to vector index at {}", config.index_url))?;
    log::debug!(
        "Using collection {} at {}",
        index.collection_name(),
        config.index_url
    );
    Ok(index)
}
