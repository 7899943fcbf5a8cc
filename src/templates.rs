use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::WatermarkSettings;
use crate::batch::BatchError;

pub const DEFAULT_TEMPLATES_FILE: &str = "photostamp_templates.json";

/// Named watermark settings persisted as a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TemplateStore {
    #[serde(default)]
    pub templates: BTreeMap<String, WatermarkSettings>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_from_file(path: &Path) -> Result<Self, BatchError> {
        let contents = fs::read_to_string(path).await?;
        let store: TemplateStore = serde_json::from_str(&contents)?;
        debug!("Loaded {} template(s) from {:?}", store.templates.len(), path);
        Ok(store)
    }

    /// Like [`load_from_file`](Self::load_from_file), but a missing file is
    /// an empty store.
    pub async fn load_or_default(path: &Path) -> Result<Self, BatchError> {
        if fs::try_exists(path).await? {
            Self::load_from_file(path).await
        } else {
            Ok(Self::new())
        }
    }

    pub async fn save_to_file(&self, path: &Path) -> Result<(), BatchError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let value = serde_json::to_string_pretty(self)?;
        fs::write(path, value).await?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WatermarkSettings> {
        self.templates.get(name)
    }

    /// Store `settings` under `name`, returning what it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        settings: WatermarkSettings,
    ) -> Option<WatermarkSettings> {
        self.templates.insert(name.into(), settings)
    }

    pub fn remove(&mut self, name: &str) -> Option<WatermarkSettings> {
        self.templates.remove(name)
    }

    /// Template names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}
