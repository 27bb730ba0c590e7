//! In-place editing of a config file.
//!
//! Edits go to the raw document as written, so `${ENV}` placeholders and
//! the file's format survive a `set`.

use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    serde_json::{Map, Value},
    tracing::debug,
};

use crate::{
    loader::{ConfigFormat, resolve},
    schema::SapfireConfig,
    validate,
};

pub struct ConfigDocument {
    path: PathBuf,
    format: ConfigFormat,
    root: Value,
}

impl ConfigDocument {
    /// Open the file at `path` without expanding placeholders. A missing
    /// file opens as an empty document.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let format = ConfigFormat::from_path(path)?;
        let root = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            format
                .parse(&raw)
                .with_context(|| format!("invalid {} in {}", format.name(), path.display()))?
        } else {
            Value::Object(Map::new())
        };
        if !root.is_object() {
            anyhow::bail!("{} does not hold a config table", path.display());
        }
        Ok(Self {
            path: path.to_path_buf(),
            format,
            root,
        })
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Raw value at dotted `key`, if the file sets it.
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.').try_fold(&self.root, |node, segment| node.get(segment))
    }

    /// Set dotted `key` to `value`. The key must name a value in the schema
    /// and the edited document must still load; otherwise nothing changes.
    pub fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        validate::check_settable_key(key)?;

        let mut edited = self.root.clone();
        let segments: Vec<&str> = key.split('.').collect();
        let Some((leaf, parents)) = segments.split_last() else {
            anyhow::bail!("empty key");
        };
        let mut node = &mut edited;
        for segment in parents {
            let Value::Object(map) = node else {
                anyhow::bail!("{key}: {segment} is not a table in {}", self.path.display());
            };
            node = map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let Value::Object(map) = node else {
            anyhow::bail!("{key}: parent is not a table in {}", self.path.display());
        };
        map.insert((*leaf).to_string(), value);

        resolve(edited.clone()).map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))?;
        self.root = edited;
        Ok(())
    }

    /// The config this document loads as, placeholders expanded.
    pub fn resolve(&self) -> anyhow::Result<SapfireConfig> {
        resolve(self.root.clone())
    }

    /// Write the document back in its own format.
    pub fn save(&self) -> anyhow::Result<()> {
        let text = self.format.render(&self.root)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text)?;
        debug!(path = %self.path.display(), "config document saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{loader::load_config, schema::Language},
        secrecy::ExposeSecret,
        serde_json::json,
    };

    #[test]
    fn set_in_yaml_stays_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sapfire.yaml");
        std::fs::write(&path, "user:\n  name: Nova\n").unwrap();

        let mut doc = ConfigDocument::open(&path).unwrap();
        assert_eq!(doc.format(), ConfigFormat::Yaml);
        doc.set("settings.locale.language", json!("en")).unwrap();
        doc.save().unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.user.name, "Nova");
        assert_eq!(loaded.settings.locale.language, Language::En);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("text_model"), "only set keys are written: {raw}");
    }

    #[test]
    fn set_in_json_stays_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sapfire.json");
        std::fs::write(&path, r#"{"chat": {"greeting": "Hello"}}"#).unwrap();

        let mut doc = ConfigDocument::open(&path).unwrap();
        doc.set("settings.notifications.dnd", json!(true)).unwrap();
        doc.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let reparsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(reparsed["chat"]["greeting"], "Hello");
        assert_eq!(reparsed["settings"]["notifications"]["dnd"], true);
    }

    #[test]
    fn placeholders_are_not_expanded_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sapfire.toml");
        std::fs::write(&path, "[providers.gemini]\napi_key = \"${PATH}\"\n").unwrap();

        let mut doc = ConfigDocument::open(&path).unwrap();
        doc.set("user.name", json!("Nova")).unwrap();
        doc.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("api_key = \"${PATH}\""), "{raw}");
        assert_eq!(doc.get("providers.gemini.api_key"), Some(&json!("${PATH}")));

        let resolved = doc.resolve().unwrap();
        let key = resolved.providers.gemini.api_key.unwrap();
        assert_eq!(key.expose_secret(), &std::env::var("PATH").unwrap());
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sapfire.toml");
        let mut doc = ConfigDocument::open(&path).unwrap();
        doc.set("storage.data_dir", json!("/tmp/sapfire")).unwrap();
        doc.save().unwrap();
        assert_eq!(
            load_config(&path).unwrap().storage.data_dir.as_deref(),
            Some(Path::new("/tmp/sapfire"))
        );
    }

    #[test]
    fn rejected_edits_leave_document_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = ConfigDocument::open(&dir.path().join("sapfire.toml")).unwrap();

        assert!(doc.set("settings.locale.langauge", json!("en")).is_err());
        assert!(doc.set("settings.locale.language", json!("de")).is_err());
        assert!(doc.set("settings.appearance.font_size", json!("huge")).is_err());
        assert!(doc.set("settings", json!("x")).is_err());
        assert_eq!(doc.get("settings"), None);
    }

    #[test]
    fn non_table_parent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sapfire.json");
        std::fs::write(&path, r#"{"settings": 3}"#).unwrap();
        let mut doc = ConfigDocument::open(&path).unwrap();
        assert!(doc.set("settings.notifications.dnd", json!(true)).is_err());
    }
}
