use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub listings: ListingsConfig,
    pub dialog: DialogConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ListingsConfig {
    /// JSON file with one listing payload object per array element.
    pub dataset_path: PathBuf,
    pub result_limit: usize,
}

#[derive(Clone, Debug)]
pub struct DialogConfig {
    /// NLU extractions below this confidence trigger a rephrase request.
    pub confidence_threshold: f64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Gemini,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub dataset_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
            },
            listings: ListingsConfig {
                dataset_path: PathBuf::from("dataset/listings.json"),
                result_limit: 5,
            },
            dialog: DialogConfig { confidence_threshold: 0.6 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|gemini|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("canho.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }
        if let Some(listings) = patch.listings {
            if let Some(dataset_path) = listings.dataset_path {
                self.listings.dataset_path = dataset_path;
            }
            if let Some(result_limit) = listings.result_limit {
                self.listings.result_limit = result_limit;
            }
        }
        if let Some(dialog) = patch.dialog {
            if let Some(confidence_threshold) = dialog.confidence_threshold {
                self.dialog.confidence_threshold = confidence_threshold;
            }
        }
        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var("CANHO_LLM_PROVIDER") {
            self.llm.provider = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "CANHO_LLM_PROVIDER".to_string(),
                value,
            })?;
        }
        if let Ok(value) = env::var("CANHO_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Ok(value) = env::var("CANHO_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Ok(value) = env::var("CANHO_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Ok(value) = env::var("CANHO_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "CANHO_LLM_TIMEOUT_SECS".to_string(),
                    value,
                })?;
        }
        if let Ok(value) = env::var("CANHO_DATASET_PATH") {
            self.listings.dataset_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("CANHO_RESULT_LIMIT") {
            self.listings.result_limit =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "CANHO_RESULT_LIMIT".to_string(),
                    value,
                })?;
        }
        if let Ok(value) = env::var("CANHO_CONFIDENCE_THRESHOLD") {
            self.dialog.confidence_threshold =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "CANHO_CONFIDENCE_THRESHOLD".to_string(),
                    value,
                })?;
        }
        if let Ok(value) = env::var("CANHO_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Ok(value) = env::var("CANHO_LOG_FORMAT") {
            self.logging.format = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "CANHO_LOG_FORMAT".to_string(),
                value,
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(dataset_path) = overrides.dataset_path {
            self.listings.dataset_path = dataset_path;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Validation("llm.timeout_secs must be positive".to_string()));
        }
        if self.listings.result_limit == 0 {
            return Err(ConfigError::Validation(
                "listings.result_limit must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dialog.confidence_threshold) {
            return Err(ConfigError::Validation(
                "dialog.confidence_threshold must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    listings: Option<ListingsPatch>,
    dialog: Option<DialogPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ListingsPatch {
    dataset_path: Option<PathBuf>,
    result_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DialogPatch {
    confidence_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    ["canho.toml", "config/canho.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    fn load_from(file: &tempfile::NamedTempFile) -> Result<AppConfig, super::ConfigError> {
        AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
    }

    #[test]
    fn defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.dialog.confidence_threshold, 0.6);
        assert_eq!(config.listings.result_limit, 5);
    }

    #[test]
    fn toml_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "[llm]\nprovider = \"gemini\"\nmodel = \"gemini-2.0-flash\"\n\n\
             [dialog]\nconfidence_threshold = 0.7\n\n[logging]\nformat = \"json\"\n"
        )
        .expect("write patch");

        let config = load_from(&file).expect("patched config loads");

        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.dialog.confidence_threshold, 0.7);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn nested_config_file_is_resolved() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir(dir.path().join("config")).expect("config dir");
        std::fs::write(
            dir.path().join("config").join("canho.toml"),
            "[llm]\nmodel = \"from-nested-file\"\n",
        )
        .expect("write patch");

        let previous = std::env::current_dir().expect("cwd");
        std::env::set_current_dir(dir.path()).expect("enter temp dir");
        let config = AppConfig::load(LoadOptions::default());
        std::env::set_current_dir(previous).expect("restore cwd");

        assert_eq!(config.expect("nested config loads").llm.model, "from-nested-file");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/canho.toml")),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "[dialog]\nconfidence_threshold = 1.5\n").expect("write patch");
        assert!(load_from(&file).is_err());
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert!("palm".parse::<LlmProvider>().is_err());
    }
}
