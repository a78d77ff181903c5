use std::collections::HashMap;
use std::error::Error;

use config::{Config, Environment, File};
use eyre::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Load a settings object from `config_files` and the environment variables
/// starting with `{prefix}_`. Later sources override earlier ones.
pub(crate) fn load_settings_object<T>(
    prefix: &str,
    config_files: &[String],
    env: impl IntoIterator<Item = (String, String)>,
) -> Result<T>
where
    T: DeserializeOwned,
{
    let env_prefix = format!("{prefix}_");
    let filtered_env: HashMap<String, String> = env
        .into_iter()
        .filter(|(k, _v)| k.starts_with(&env_prefix))
        .collect();

    let builder = config_files
        .iter()
        .filter(|path| !path.is_empty())
        .fold(Config::builder(), |builder, path| {
            builder.add_source(File::with_name(path))
        });

    let config_deserializer = builder
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(filtered_env)),
        )
        .build()
        .context("Failed to read settings sources")?;

    match Config::try_deserialize::<T>(config_deserializer) {
        Ok(cfg) => Ok(cfg),
        Err(err) => {
            let mut err = if let Some(source_err) = err.source() {
                let source = format!("Config error source: {source_err}");
                Err(err).context(source)
            } else {
                Err(err.into())
            };
            for cfg_path in config_files {
                err = err.with_context(|| format!("Config loaded: {cfg_path}"));
            }
            debug!(?config_files, "Failed to deserialize settings");
            err
        }
    }
}
