use std::{fs, fs::File, io::Write, path::Path};

use ::config::{Config, Environment};
use anyhow::{Context, Result};
use log::{debug, info};

use super::ClientConfig;

pub const ENV_PREFIX: &str = "STRICT_FETCH";

pub fn get_default_config() -> &'static str {
    include_str!("../../config/config.toml")
}

/// Loads the client configuration from `path`, creating it from the
/// embedded defaults when missing. Environment variables prefixed with
/// `STRICT_FETCH_` override file values (`__` separates nested keys).
pub fn load_configuration(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        write_config_to(path, get_default_config()).context("Could not create default config")?;
        info!(path:% = path.display(); "Created new configuration file");
    }

    let filename = path.to_str().context("Invalid config file path")?;

    let cfg = Config::builder()
        .add_source(::config::File::with_name(filename))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Could not build config")?;

    let client_config: ClientConfig = cfg.try_deserialize().context("Invalid client configuration")?;
    debug!(
        path:% = path.display(),
        endpoints = client_config.endpoints.entries().count();
        "Configuration loaded"
    );
    Ok(client_config)
}

pub fn write_config_to(path: &Path, source: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create parent directories")?;
    };

    let mut file = File::create(path).context("Failed to create config file")?;
    file.write_all(source.as_bytes())
        .context("Failed to write config content")?;
    file.write_all(b"\n").context("Failed to write newline")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::polling::DEFAULT_POLL_TIMEOUT_SECS;

    #[test]
    #[serial]
    fn test_missing_file_is_created_from_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("strict-fetch.toml");

        let config = load_configuration(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.base_url, None);
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.headers.get("accept").map(String::as_str), Some("application/json"));
        assert_eq!(config.polling.timeout_secs, DEFAULT_POLL_TIMEOUT_SECS);
        assert!(config.endpoints.is_empty());
    }

    #[test]
    #[serial]
    fn test_endpoints_are_read_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strict-fetch.toml");
        write_config_to(
            &path,
            r#"
base_url = "https://api.test"

[endpoints.vehicles.new]
method = "POST"
endpoint = "/new"

[endpoints.health]
endpoint = "/health"
"#,
        )
        .unwrap();

        let config = load_configuration(&path).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://api.test"));

        let mut names: Vec<&str> = config.endpoints.entries().map(|(name, _)| name).collect();
        names.sort();
        assert_eq!(names, vec!["health", "vehicles"]);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strict-fetch.toml");
        write_config_to(&path, get_default_config()).unwrap();

        // SAFETY: tests touching the environment are serialized.
        unsafe {
            std::env::set_var("STRICT_FETCH_BASE_URL", "https://env.test");
            std::env::set_var("STRICT_FETCH_POLLING__DELAY_MILLIS", "250");
        }
        let config = load_configuration(&path);
        unsafe {
            std::env::remove_var("STRICT_FETCH_BASE_URL");
            std::env::remove_var("STRICT_FETCH_POLLING__DELAY_MILLIS");
        }

        let config = config.unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://env.test"));
        assert_eq!(config.polling.delay_millis, 250);
    }
}
