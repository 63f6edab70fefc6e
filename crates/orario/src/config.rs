//! Runtime configuration assembled from command-line arguments.

use std::path::PathBuf;

use crate::data::{DEFAULT_DEPARTMENT, DEFAULT_SECTION, DEFAULT_YEAR};
use crate::export::ViewMode;
use crate::grid::SlotMatching;
use crate::types::ScheduleKey;

#[derive(Debug, Clone)]
pub struct Config {
    /// Timetable shown when a request names none
    pub defaults: ScheduleKey,
    /// View used when neither the request nor the preferences pick one
    pub view: ViewMode,
    pub matching: SlotMatching,
    /// Directory scanned for extra `*.json` datasets
    pub data_dir: PathBuf,
    /// SQLite file holding UI preferences
    pub db_path: PathBuf,
    /// Where `build` and `export` write files
    pub output: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: ScheduleKey::new(DEFAULT_DEPARTMENT, DEFAULT_YEAR, DEFAULT_SECTION),
            view: ViewMode::default(),
            matching: SlotMatching::default(),
            data_dir: PathBuf::from("data"),
            db_path: PathBuf::from("orario.db"),
            output: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Resolve selector values, using the configured defaults for missing ones
    pub fn key_for(
        &self,
        department: Option<&str>,
        year: Option<&str>,
        section: Option<&str>,
    ) -> ScheduleKey {
        let pick = |value: Option<&str>, default: &str| -> String {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        ScheduleKey::new(
            &pick(department, &self.defaults.department),
            &pick(year, &self.defaults.year),
            &pick(section, &self.defaults.section),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.store_key(), "cse_3_a");
        assert_eq!(config.view, ViewMode::Normal);
        assert_eq!(config.matching, SlotMatching::Containment);
    }

    #[test]
    fn test_key_for_fills_missing_parts() {
        let config = Config::default();
        assert_eq!(config.key_for(None, None, None).store_key(), "cse_3_a");
        assert_eq!(
            config.key_for(Some("ECE"), None, Some("B")).store_key(),
            "ece_3_b"
        );
        assert_eq!(config.key_for(Some("  "), None, None).store_key(), "cse_3_a");
    }
}
