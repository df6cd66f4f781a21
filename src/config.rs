//! Settings, read with the `config` crate.
//!
//! Sources, later ones winning: built-in defaults, an optional settings file
//! (any format `config` recognizes by extension), and environment variables
//! prefixed `ROWKEEPER__` with `__` between nested keys, e.g.
//! `ROWKEEPER__DATABASE__STORAGE=file`.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::assets::AssetSettings;
use crate::error::Result;
use crate::overlay::OverlaySettings;
use crate::persist::PersistenceMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    #[default]
    InMemory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub storage: Storage,
    /// Only read when `storage` is `file`.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            storage: Storage::InMemory,
            path: "rowkeeper.db".to_owned(),
        }
    }
}

impl DatabaseSettings {
    pub fn persistence_mode(&self) -> PersistenceMode {
        match self.storage {
            Storage::InMemory => PersistenceMode::InMemory,
            Storage::File => PersistenceMode::File(self.path.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` overrides them.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub assets: AssetSettings,
    pub overlay: OverlaySettings,
    pub log: LogSettings,
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("ROWKEEPER").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
