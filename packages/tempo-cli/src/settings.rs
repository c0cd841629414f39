use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use std::path::Path;
use tempo_scheduler::SchedulerConfig;

/// Loads the scheduler configuration.
///
/// Sources, later ones winning: built-in defaults, `tempo.toml` in the working
/// directory (or the file passed on the command line), then `TEMPO_*`
/// environment variables such as `TEMPO_FRAME_YIELD_MS=8`.
pub fn load(path: Option<&Path>) -> Result<SchedulerConfig> {
    let builder = Config::builder();
    let builder = match path {
        Some(path) => builder.add_source(File::from(path).required(true)),
        None => builder.add_source(File::with_name("tempo").required(false)),
    };
    let builder = builder.add_source(Environment::with_prefix("TEMPO").try_parsing(true));
    resolve(builder)
}

fn resolve(builder: ConfigBuilder<DefaultState>) -> Result<SchedulerConfig> {
    let settings = builder.build().context("failed to read configuration")?;
    let config: SchedulerConfig = settings
        .try_deserialize()
        .context("invalid scheduler configuration")?;
    config.validate()?;
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}
