use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use canho_core::config::{AppConfig, ConfigError};
use toml::Value;

use super::CommandResult;

pub fn run(load_result: &Result<AppConfig, ConfigError>) -> CommandResult {
    let config = match load_result {
        Ok(config) => config,
        Err(error) => return CommandResult::failure(format!("config validation failed: {error}")),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "llm.provider",
        &format!("{:?}", config.llm.provider),
        source("llm.provider", "CANHO_LLM_PROVIDER"),
    ));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "CANHO_LLM_MODEL")));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        source("llm.base_url", "CANHO_LLM_BASE_URL"),
    ));
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line("llm.api_key", api_key, source("llm.api_key", "CANHO_LLM_API_KEY")));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", "CANHO_LLM_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "listings.dataset_path",
        &config.listings.dataset_path.display().to_string(),
        source("listings.dataset_path", "CANHO_DATASET_PATH"),
    ));
    lines.push(render_line(
        "listings.result_limit",
        &config.listings.result_limit.to_string(),
        source("listings.result_limit", "CANHO_RESULT_LIMIT"),
    ));

    lines.push(render_line(
        "dialog.confidence_threshold",
        &config.dialog.confidence_threshold.to_string(),
        source("dialog.confidence_threshold", "CANHO_CONFIDENCE_THRESHOLD"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "CANHO_LOG_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "CANHO_LOG_FORMAT"),
    ));

    CommandResult::success(lines.join("\n"))
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("canho.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/canho.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
