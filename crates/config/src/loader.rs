use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    serde::Serialize,
    serde_json::{Map, Value},
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::SapfireConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "sapfire.toml",
    "sapfire.yaml",
    "sapfire.yml",
    "sapfire.json",
];

/// On-disk config format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Format for `path`; a missing extension means TOML.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        match ext {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("unsupported config format: .{ext}"),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }

    /// Parse `raw` into a format-neutral document. Blank input is an empty
    /// table.
    pub fn parse(self, raw: &str) -> anyhow::Result<Value> {
        if raw.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        let doc = match self {
            Self::Toml => toml::from_str::<Value>(raw)?,
            Self::Yaml => serde_yaml::from_str::<Value>(raw)?,
            Self::Json => serde_json::from_str::<Value>(raw)?,
        };
        Ok(doc)
    }

    /// Serialize `value` in this format.
    pub fn render<T: Serialize + ?Sized>(self, value: &T) -> anyhow::Result<String> {
        let text = match self {
            Self::Toml => toml::to_string_pretty(value)?,
            Self::Yaml => serde_yaml::to_string(value)?,
            Self::Json => {
                let mut text = serde_json::to_string_pretty(value)?;
                text.push('\n');
                text
            },
        };
        Ok(text)
    }
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<SapfireConfig> {
    let format = ConfigFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc = format
        .parse(&raw)
        .with_context(|| format!("invalid {} in {}", format.name(), path.display()))?;
    resolve(doc)
}

/// Expand `${ENV}` placeholders in `doc` and deserialize it.
pub(crate) fn resolve(mut doc: Value) -> anyhow::Result<SapfireConfig> {
    if doc.is_null() {
        doc = Value::Object(Map::new());
    }
    substitute_env(&mut doc);
    Ok(serde_json::from_value(doc)?)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./sapfire.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/sapfire/sapfire.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SapfireConfig::default()` if no config file is found or the file
/// fails to parse.
pub fn discover_and_load() -> SapfireConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SapfireConfig::default()
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/sapfire/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "sapfire").map(|d| d.config_dir().to_path_buf())
}

/// Directory holding conversation logs and the contact directory.
///
/// `storage.data_dir` wins over the platform data directory; falls back to
/// `./.sapfire` when neither is available.
pub fn data_dir(config: &SapfireConfig) -> PathBuf {
    if let Some(dir) = &config.storage.data_dir {
        return dir.clone();
    }
    directories::ProjectDirs::from("", "", "sapfire")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".sapfire"))
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sapfire.toml")
}

/// Write `config` to `path` in the format its extension names, creating
/// parent directories as needed.
pub fn save_config_to(config: &SapfireConfig, path: &Path) -> anyhow::Result<()> {
    let format = ConfigFormat::from_path(path)?;
    let text = format
        .render(config)
        .with_context(|| format!("serialize config as {}", format.name()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    debug!(path = %path.display(), format = format.name(), "saved config");
    Ok(())
}
