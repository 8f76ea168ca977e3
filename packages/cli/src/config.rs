//! Study configuration loading.

use std::path::Path;

use venue_map_acquisition::fetcher::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_DELAY};
use venue_map_places_models::study::{ApiSettings, StudyConfig};

/// Default study file, relative to the working directory.
pub const DEFAULT_STUDY_PATH: &str = "studies/paris.toml";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The study file could not be read.
    #[error("Failed to read study file {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The study file is not valid TOML for a [`StudyConfig`].
    #[error("Failed to parse study file {path}: {source}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// An API setting is outside what the places API accepts.
    #[error("api.{field} = {value} is outside the accepted range ({allowed})")]
    ApiLimit {
        /// Setting name.
        field: &'static str,
        /// Configured value.
        value: u64,
        /// Accepted range.
        allowed: String,
    },

    /// The API key environment variable is unset or empty.
    #[error("Environment variable {var} is not set; it must hold the places API key")]
    MissingApiKey {
        /// Name of the variable.
        var: String,
    },
}

/// Reads and parses a study file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed, or if its
/// API settings exceed the API's limits.
pub fn load_study(path: &Path) -> Result<StudyConfig, ConfigError> {
    let body = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let study: StudyConfig = toml::from_str(&body).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    validate_api(&study.api)?;
    log::debug!("Loaded study '{}' from {}", study.id, path.display());
    Ok(study)
}

/// Checks the pagination settings against the API's fixed limits.
///
/// A continuation token is rejected if used sooner than
/// [`DEFAULT_PAGE_DELAY`] after it was issued, and a search never yields
/// more than [`DEFAULT_MAX_PAGES`] pages.
///
/// # Errors
///
/// Returns [`ConfigError::ApiLimit`] for a shorter delay or a page cap
/// outside `1..=DEFAULT_MAX_PAGES`.
pub fn validate_api(settings: &ApiSettings) -> Result<(), ConfigError> {
    let min_delay = DEFAULT_PAGE_DELAY.as_secs();
    if settings.page_delay_secs < min_delay {
        return Err(ConfigError::ApiLimit {
            field: "page_delay_secs",
            value: settings.page_delay_secs,
            allowed: format!(">= {min_delay}"),
        });
    }
    if !(1..=DEFAULT_MAX_PAGES).contains(&settings.max_pages) {
        return Err(ConfigError::ApiLimit {
            field: "max_pages",
            value: u64::from(settings.max_pages),
            allowed: format!("1..={DEFAULT_MAX_PAGES}"),
        });
    }
    Ok(())
}

/// Reads the API key from the variable named in `settings`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingApiKey`] if the variable is unset or
/// blank.
pub fn api_key(settings: &ApiSettings) -> Result<String, ConfigError> {
    std::env::var(&settings.api_key_env)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ConfigError::MissingApiKey {
            var: settings.api_key_env.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_the_reference_study() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../studies/paris.toml");
        let study = load_study(&path).unwrap();
        assert_eq!(study.id, "paris");
        assert_eq!(study.api.max_pages, 3);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_study(Path::new("/nonexistent/study.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn pagination_settings_must_respect_api_limits() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../studies/paris.toml");
        let settings = load_study(&path).unwrap().api;
        assert!(validate_api(&settings).is_ok());

        let mut eager = settings.clone();
        eager.page_delay_secs = 0;
        assert!(matches!(
            validate_api(&eager),
            Err(ConfigError::ApiLimit {
                field: "page_delay_secs",
                value: 0,
                ..
            })
        ));

        for max_pages in [0, 4, 6] {
            let mut greedy = settings.clone();
            greedy.max_pages = max_pages;
            assert!(matches!(
                validate_api(&greedy),
                Err(ConfigError::ApiLimit {
                    field: "max_pages",
                    ..
                })
            ));
        }

        let mut slower = settings;
        slower.page_delay_secs = 15;
        slower.max_pages = 1;
        assert!(validate_api(&slower).is_ok());
    }

    #[test]
    fn study_file_over_the_page_cap_is_rejected() {
        let reference = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../studies/paris.toml");
        let body = std::fs::read_to_string(reference)
            .unwrap()
            .replace("max_pages = 3", "max_pages = 6");
        let path = std::env::temp_dir().join(format!(
            "venue_map_config_pages_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, body).unwrap();

        let result = load_study(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            result,
            Err(ConfigError::ApiLimit {
                field: "max_pages",
                value: 6,
                ..
            })
        ));
    }

    #[test]
    fn missing_key_is_reported_by_variable_name() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../studies/paris.toml");
        let mut settings = load_study(&path).unwrap().api;
        settings.api_key_env = "VENUE_MAP_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        let err = api_key(&settings).unwrap_err();
        assert!(err.to_string().contains("VENUE_MAP_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
