use crate::core::model::{Configuration, FilterGroup};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the configuration lives between sessions.
pub trait SettingsStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Configuration>>;
    fn save(&mut self, config: &Configuration) -> Result<()>;
}

/// Pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<Configuration>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        debug!(target: "state", path = %self.path.display(), "settings loaded");
        Ok(Some(config))
    }

    fn save(&mut self, config: &Configuration) -> Result<()> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

/// Keeps the last saved configuration in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub saved: Option<Configuration>,
    pub saves: usize,
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<Configuration>> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, config: &Configuration) -> Result<()> {
        self.saved = Some(config.clone());
        self.saves += 1;
        Ok(())
    }
}

/// Load the stored configuration, seeding the example group on first run.
pub fn load_or_seed(store: &mut dyn SettingsStore) -> Result<Configuration> {
    match store.load()? {
        Some(config) if !config.groups.is_empty() => Ok(config),
        existing => {
            let mut config = Configuration::seeded();
            if let Some(existing) = existing {
                config.ranges = existing.ranges;
                config.active_range_id = existing.active_range_id;
            }
            store.save(&config)?;
            info!(target: "state", "seeded example filter group");
            Ok(config)
        }
    }
}

/// Serialise groups the way the export file stores them: a 2-space indented
/// JSON array mirroring the in-memory model, ids included.
pub fn export_groups(groups: &[FilterGroup], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(groups)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn import_groups(path: &Path) -> Result<Vec<FilterGroup>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let groups = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(groups)
}
