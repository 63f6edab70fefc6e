//! UI preferences: a key-value store interface and a typed view over it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::error::Result;
use crate::export::ViewMode;

pub const THEME_KEY: &str = "theme";
pub const HIGH_CONTRAST_KEY: &str = "highContrast";
pub const FONT_SIZE_KEY: &str = "fontSize";
pub const VIEW_MODE_KEY: &str = "viewMode";

pub const DEFAULT_FONT_SIZE: u8 = 16;
pub const MAX_FONT_SIZE: u8 = 24;
const FONT_SIZE_STEP: u8 = 2;

/// Persistent string key-value storage
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    /// Returns true if the key existed
    fn remove(&mut self, key: &str) -> Result<bool>;
    fn clear(&mut self) -> Result<()>;
}

/// Store that lives only as long as the process
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: BTreeMap<String, String>,
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.values.remove(key).is_some())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every preference, with defaults filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    pub high_contrast: bool,
    pub font_size: u8,
    pub view_mode: Option<ViewMode>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            high_contrast: false,
            font_size: DEFAULT_FONT_SIZE,
            view_mode: None,
        }
    }
}

/// Next font size: grows by 2px and wraps back to the default past the max
pub fn next_font_size(current: u8) -> u8 {
    let next = current.saturating_add(FONT_SIZE_STEP);
    if next > MAX_FONT_SIZE {
        DEFAULT_FONT_SIZE
    } else {
        next
    }
}

impl Preferences {
    /// Read all preferences; unreadable values fall back to defaults
    pub fn load(store: &dyn PreferenceStore) -> Result<Self> {
        let defaults = Self::default();

        let theme = store
            .get(THEME_KEY)?
            .and_then(|v| Theme::parse(&v))
            .unwrap_or(defaults.theme);
        let high_contrast = store
            .get(HIGH_CONTRAST_KEY)?
            .map(|v| v == "true")
            .unwrap_or(defaults.high_contrast);
        let font_size = store
            .get(FONT_SIZE_KEY)?
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|size| (DEFAULT_FONT_SIZE..=MAX_FONT_SIZE).contains(size))
            .unwrap_or(defaults.font_size);
        let view_mode = store
            .get(VIEW_MODE_KEY)?
            .and_then(|v| v.parse::<ViewMode>().ok());

        Ok(Self {
            theme,
            high_contrast,
            font_size,
            view_mode,
        })
    }

    pub fn toggle_theme(store: &mut dyn PreferenceStore) -> Result<Theme> {
        let theme = Self::load(store)?.theme.toggled();
        store.set(THEME_KEY, theme.as_str())?;
        debug!(theme = %theme, "Theme toggled");
        Ok(theme)
    }

    pub fn toggle_high_contrast(store: &mut dyn PreferenceStore) -> Result<bool> {
        let enabled = !Self::load(store)?.high_contrast;
        store.set(HIGH_CONTRAST_KEY, if enabled { "true" } else { "false" })?;
        debug!(enabled = enabled, "High contrast toggled");
        Ok(enabled)
    }

    pub fn bump_font_size(store: &mut dyn PreferenceStore) -> Result<u8> {
        let size = next_font_size(Self::load(store)?.font_size);
        store.set(FONT_SIZE_KEY, &size.to_string())?;
        debug!(size = size, "Font size changed");
        Ok(size)
    }

    pub fn set_view_mode(store: &mut dyn PreferenceStore, mode: ViewMode) -> Result<()> {
        store.set(VIEW_MODE_KEY, mode.as_str())
    }
}
