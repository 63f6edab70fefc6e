use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{Result, TimetableError};
use crate::types::{ScheduleKey, Timetable, TimetableRecord};

/// Rendering density; changes presentation classes only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Compact,
    #[default]
    Normal,
    Detailed,
}

impl ViewMode {
    pub const ALL: [ViewMode; 3] = [ViewMode::Compact, ViewMode::Normal, ViewMode::Detailed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Compact => "compact",
            ViewMode::Normal => "normal",
            ViewMode::Detailed => "detailed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Compact => "Compact",
            ViewMode::Normal => "Normal",
            ViewMode::Detailed => "Detailed",
        }
    }

    /// Parse a view name, falling back to `normal` for anything unknown
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(view = %name, "Unknown view mode, using normal");
            Self::default()
        })
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(ViewMode::Compact),
            "normal" => Ok(ViewMode::Normal),
            "detailed" => Ok(ViewMode::Detailed),
            other => Err(format!("unknown view mode: {other}")),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported export targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Print,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Print, ExportFormat::Pdf, ExportFormat::Json];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Print => "print",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Print => "Print",
            ExportFormat::Pdf => "PDF",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "print" => Ok(ExportFormat::Print),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(TimetableError::UnknownExportFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The downloadable JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub department: String,
    pub year: String,
    pub section: String,
    pub timetable: Timetable,
    pub generated: DateTime<Utc>,
}

/// A finished export, ready to hand to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Export {
    /// A file to download
    Download {
        filename: String,
        content_type: &'static str,
        body: String,
    },
    /// The caller should open the platform print dialog on the grid
    Print,
}

/// Download name for a JSON export, e.g. `timetable_cse_3_a.json`
pub fn json_filename(key: &ScheduleKey) -> String {
    format!(
        "timetable_{}_{}_{}.json",
        key.department, key.year, key.section
    )
}

/// Serialize a timetable to the pretty-printed export document
pub fn export_json(
    key: &ScheduleKey,
    record: &TimetableRecord,
    generated: DateTime<Utc>,
) -> Result<String> {
    let document = ExportDocument {
        department: key.department.clone(),
        year: key.year.clone(),
        section: key.section.clone(),
        timetable: record.timetable.clone(),
        generated,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Parse a previously exported document
#[cfg(test)]
pub fn parse_export(json: &str) -> Result<ExportDocument> {
    Ok(serde_json::from_str(json)?)
}

/// Run an export in the given format.
///
/// PDF has no implementation and reports `UnsupportedExport`.
pub fn export(
    format: ExportFormat,
    key: &ScheduleKey,
    record: &TimetableRecord,
    generated: DateTime<Utc>,
) -> Result<Export> {
    match format {
        ExportFormat::Json => {
            let body = export_json(key, record, generated)?;
            let filename = json_filename(key);
            info!(file = %filename, bytes = body.len(), "Timetable exported");
            Ok(Export::Download {
                filename,
                content_type: "application/json",
                body,
            })
        }
        ExportFormat::Print => Ok(Export::Print),
        ExportFormat::Pdf => {
            warn!(key = %key, "PDF export requested but not supported");
            Err(TimetableError::UnsupportedExport(ExportFormat::Pdf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{default_key, ScheduleStore};
    use chrono::TimeZone;

    fn generated() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap()
    }

    // ========== ViewMode tests ==========

    #[test]
    fn test_view_mode_parse() {
        assert_eq!("compact".parse::<ViewMode>().unwrap(), ViewMode::Compact);
        assert_eq!("DETAILED".parse::<ViewMode>().unwrap(), ViewMode::Detailed);
        assert!("huge".parse::<ViewMode>().is_err());
    }

    #[test]
    fn test_view_mode_unknown_falls_back_to_normal() {
        assert_eq!(ViewMode::parse_or_default("huge"), ViewMode::Normal);
        assert_eq!(ViewMode::parse_or_default(""), ViewMode::Normal);
    }

    // ========== ExportFormat tests ==========

    #[test]
    fn test_export_format_parse() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("PDF".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert!(matches!(
            "docx".parse::<ExportFormat>(),
            Err(TimetableError::UnknownExportFormat(_))
        ));
    }

    // ========== export tests ==========

    #[test]
    fn test_json_filename() {
        assert_eq!(json_filename(&default_key()), "timetable_cse_3_a.json");
    }

    #[test]
    fn test_export_json_fields() {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(&default_key());

        let json = export_json(lookup.key, lookup.record, generated()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["department"], "cse");
        assert_eq!(value["year"], "3");
        assert_eq!(value["section"], "a");
        assert_eq!(value["generated"], "2025-01-15T10:30:00Z");
        assert!(value["timetable"]["Monday"].is_array());
        assert_eq!(value["timetable"]["Monday"][0]["time"], "8:00-8:50");
        // Pretty printed
        assert!(json.contains("\n  \"department\""));
    }

    #[test]
    fn test_export_json_roundtrip_preserves_timetable() {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(&default_key());

        let json = export_json(lookup.key, lookup.record, generated()).unwrap();
        let document = parse_export(&json).unwrap();

        assert_eq!(document.timetable, lookup.record.timetable);
        assert_eq!(document.generated, generated());
    }

    #[test]
    fn test_export_json_download() {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(&default_key());

        match export(ExportFormat::Json, lookup.key, lookup.record, generated()).unwrap() {
            Export::Download {
                filename,
                content_type,
                body,
            } => {
                assert_eq!(filename, "timetable_cse_3_a.json");
                assert_eq!(content_type, "application/json");
                assert!(body.contains("Data Structures Lab"));
            }
            other => panic!("unexpected export: {other:?}"),
        }
    }

    #[test]
    fn test_export_print() {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(&default_key());
        let result = export(ExportFormat::Print, lookup.key, lookup.record, generated()).unwrap();
        assert_eq!(result, Export::Print);
    }

    #[test]
    fn test_export_pdf_is_unsupported() {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(&default_key());
        let result = export(ExportFormat::Pdf, lookup.key, lookup.record, generated());
        assert!(matches!(
            result,
            Err(TimetableError::UnsupportedExport(ExportFormat::Pdf))
        ));
    }
}
