use anyhow::Result;
use resona_pipeline::config;
use resona_pipeline::Config;

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  index_url:             {}", config.index_url);
    println!("  collection:            {}", config.collection);
    println!("  recreate_collection:   {}", config.recreate_collection);
    println!("  resolver_url:          {}",
        config.resolver_url.as_deref().unwrap_or("<not set>"));
    println!("  model_url:             {}",
        config.model_url.as_deref().unwrap_or("<not set>"));
    println!("  data_dir:              {}", config.data_dir.display());
    println!("  download_timeout_secs: {}", config.download_timeout_secs);

    println!("\nPriority: CLI args > ENV vars (RESONA_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_config_path() {
    println!("{}", config::config_file_path().display());
}

/// Show example configuration.
pub fn show_config_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("Created config file: {}", config_path.display());
        println!("\nEdit this file to configure resona.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
