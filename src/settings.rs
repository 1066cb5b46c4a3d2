//! User settings.
//!
//! Settings are an explicit value handed to whatever needs them. They live in
//! the same key-value store as the feed cache, one key per setting, so a
//! missing or unreadable key only resets that one setting.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::cache::KeyValueStore;
use crate::error::FeedError;

pub const THEME_MODE_KEY: &str = "themeMode";
pub const OPEN_IN_NEW_TAB_KEY: &str = "openInNewTab";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Follow the system preference.
    #[default]
    Auto,
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme_mode: ThemeMode,
    pub open_in_new_tab: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme_mode: ThemeMode::Auto,
            open_in_new_tab: true,
        }
    }
}

impl Settings {
    pub async fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            theme_mode: read_key(store, THEME_MODE_KEY)
                .await
                .unwrap_or(defaults.theme_mode),
            open_in_new_tab: read_key(store, OPEN_IN_NEW_TAB_KEY)
                .await
                .unwrap_or(defaults.open_in_new_tab),
        }
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), FeedError> {
        store
            .set(THEME_MODE_KEY, serde_json::to_value(self.theme_mode)?)
            .await?;
        store
            .set(OPEN_IN_NEW_TAB_KEY, Value::Bool(self.open_in_new_tab))
            .await
    }

    /// Writes defaults for settings that were never stored. Existing values
    /// are left alone.
    pub async fn install_defaults(store: &dyn KeyValueStore) -> Result<(), FeedError> {
        let defaults = Self::default();
        if store.get(THEME_MODE_KEY).await?.is_none() {
            store
                .set(THEME_MODE_KEY, serde_json::to_value(defaults.theme_mode)?)
                .await?;
        }
        if store.get(OPEN_IN_NEW_TAB_KEY).await?.is_none() {
            store
                .set(OPEN_IN_NEW_TAB_KEY, Value::Bool(defaults.open_in_new_tab))
                .await?;
        }
        Ok(())
    }
}

async fn read_key<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match store.get(key).await {
        Ok(Some(value)) => serde_json::from_value(value)
            .map_err(|e| warn!("ignoring stored {key}: {e}"))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            warn!("failed to read {key}: {e}");
            None
        }
    }
}
