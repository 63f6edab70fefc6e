use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::TimetableError;
use crate::types::{TimeRange, TimetableRecord};

/// Hours below this are afternoon hours on the school clock ("1:30" is 13:30)
const AFTERNOON_BEFORE_HOUR: u16 = 8;

/// Parse a time of day label into minutes since midnight.
///
/// Accepts "H:MM" and "HH:MM". Single-digit hours 1-7 are read as afternoon
/// hours, matching how the timetables are written. Two-digit hours ("07:30",
/// "13:30") are 24-hour and pass through.
pub fn parse_time_of_day(label: &str) -> Result<u16, TimetableError> {
    let invalid = || TimetableError::InvalidTime(label.to_string());

    let (hours, minutes) = label.trim().split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || minutes.len() != 2 {
        return Err(invalid());
    }
    let school_clock = hours.len() == 1;
    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    let hours = if school_clock && (1..AFTERNOON_BEFORE_HOUR).contains(&hours) {
        hours + 12
    } else {
        hours
    };

    Ok(hours * 60 + minutes)
}

/// Format minutes since midnight back into the short school-clock form
pub fn format_time_of_day(minutes: u16) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if (13..AFTERNOON_BEFORE_HOUR + 12).contains(&hours) {
        format!("{}:{:02}", hours - 12, mins)
    } else if (1..AFTERNOON_BEFORE_HOUR).contains(&hours) {
        // Early morning keeps its leading zero so it is not read as afternoon
        format!("{:02}:{:02}", hours, mins)
    } else {
        format!("{}:{:02}", hours, mins)
    }
}

/// Parse a "start-end" label such as "8:50-9:40"
pub fn parse_time_range(label: &str) -> Result<TimeRange, TimetableError> {
    let invalid = || TimetableError::InvalidTimeRange(label.to_string());

    let (start, end) = label.split_once('-').ok_or_else(invalid)?;
    let start = parse_time_of_day(start).map_err(|_| invalid())?;
    let end = parse_time_of_day(end).map_err(|_| invalid())?;
    if end < start {
        return Err(invalid());
    }

    Ok(TimeRange::new(start, end))
}

/// Split "CS301 - Data Structures" into ("CS301", "Data Structures").
/// Returns `None` when the first part does not look like a course code.
pub fn split_subject(subject: &str) -> Option<(String, String)> {
    let (code, name) = subject.split_once(" - ")?;
    let code = code.trim();
    let looks_like_code = !code.is_empty()
        && !code.contains(' ')
        && code.chars().any(|c| c.is_ascii_digit())
        && code.chars().all(|c| c.is_ascii_alphanumeric());
    if !looks_like_code {
        return None;
    }
    Some((code.to_string(), name.trim().to_string()))
}

/// Parse a dataset document: an object mapping store keys ("cse_3_a") to
/// timetable records. Entries are normalized and keys lowercased.
pub fn parse_dataset(content: &str) -> Result<BTreeMap<String, TimetableRecord>> {
    let raw: BTreeMap<String, TimetableRecord> =
        serde_json::from_str(content).context("Failed to parse timetable dataset")?;

    Ok(raw
        .into_iter()
        .map(|(key, mut record)| {
            for entries in record.timetable.values_mut() {
                let normalized = std::mem::take(entries)
                    .into_iter()
                    .map(|e| e.normalized())
                    .collect();
                *entries = normalized;
            }
            (key.to_lowercase(), record)
        })
        .collect())
}

/// Read and parse a dataset file
pub fn parse_dataset_file(path: &Path) -> Result<BTreeMap<String, TimetableRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
    parse_dataset(&content)
}
