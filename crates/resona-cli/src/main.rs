use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "resona", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory for previews, normalized audio, and embedding
    /// artifacts (default: ~/.local/share/resona)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Process a batch of saved tracks into stored embeddings
    ///
    /// Reads a JSON array of raw saved-track records, submits one
    /// processing job, and polls it to completion. For each track:
    ///
    /// - Normalizes the record (several historical payload shapes are
    ///   accepted; malformed fields fall back to sentinels)
    /// - Downloads the 30s preview clip (skipped if already on disk)
    /// - Converts it to mono 24 kHz WAV, truncated to 15 seconds
    /// - Extracts hidden states from the embedding model service and
    ///   mean-pools the final layer into one 1024-wide vector
    /// - Upserts the vector into the index, keyed by track id
    ///
    /// Individual track failures are logged and skipped; the job only
    /// fails outright when no input survives validation, the preview
    /// resolver is unreachable, or the index cannot be reached at all.
    Process {
        /// Path to the JSON file of raw track records
        tracks: PathBuf,

        /// User the batch belongs to
        #[arg(long)]
        user: String,
    },
    /// Find tracks most similar to one with a stored embedding
    Similar {
        /// Track id to search around
        track_id: String,

        /// Maximum number of neighbors to print
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Minimum cosine similarity score
        #[arg(long, default_value_t = 0.0)]
        min_score: f32,
    },
    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the current effective configuration
    Show,
    /// Show the config file path
    Path,
    /// Show example configuration
    Example,
    /// Create the config file with defaults if it doesn't exist
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.data_dir {
        Some(dir) => resona_pipeline::Config::load_with_data_dir(dir)?,
        None => resona_pipeline::Config::load()?,
    };

    match cli.command {
        Commands::Process { tracks, user } => {
            commands::run_process(tracks, &user, config).await?;
        }
        Commands::Similar {
            track_id,
            limit,
            min_score,
        } => {
            commands::run_similar(&track_id, limit, min_score, &config).await?;
        }
        Commands::Config { action } => match action {
            None | Some(ConfigAction::Show) => commands::show_config(&config)?,
            Some(ConfigAction::Path) => commands::show_config_path(),
            Some(ConfigAction::Example) => commands::show_config_example(),
            Some(ConfigAction::Init) => commands::init_config()?,
        },
    }

    Ok(())
}
