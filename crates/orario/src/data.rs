use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::parser;
use crate::types::{
    Category, ClassEntry, Day, Department, ScheduleKey, TimeRange, Timetable, TimetableRecord,
};

/// Key served when a lookup names an unknown schedule
pub const DEFAULT_DEPARTMENT: &str = "cse";
pub const DEFAULT_YEAR: &str = "3";
pub const DEFAULT_SECTION: &str = "a";

/// Departments offered by the selector
pub const DEPARTMENTS: &[Department] = &[
    Department {
        id: "cse",
        name: "Computer Science & Engineering",
        color: "#2e86c1",
    },
    Department {
        id: "ece",
        name: "Electronics & Communication Engineering",
        color: "#8e44ad",
    },
    Department {
        id: "eee",
        name: "Electrical & Electronics Engineering",
        color: "#f39c12",
    },
    Department {
        id: "mech",
        name: "Mechanical Engineering",
        color: "#e74c3c",
    },
    Department {
        id: "civil",
        name: "Civil Engineering",
        color: "#27ae60",
    },
];

pub fn default_key() -> ScheduleKey {
    ScheduleKey::new(DEFAULT_DEPARTMENT, DEFAULT_YEAR, DEFAULT_SECTION)
}

/// Result of a schedule lookup
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    /// Key of the record actually returned
    pub key: &'a ScheduleKey,
    pub record: &'a TimetableRecord,
    /// True when the requested key was unknown and the default was served
    pub fell_back: bool,
}

/// Read-only collection of timetables, loaded once at startup
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    records: BTreeMap<String, (ScheduleKey, TimetableRecord)>,
    /// Served for unknown keys; kept in step with the stored default record
    default: (ScheduleKey, TimetableRecord),
}

impl ScheduleStore {
    /// Store holding only the built-in timetables
    pub fn builtin() -> Self {
        let default = (default_key(), builtin_default());
        let mut store = Self {
            records: BTreeMap::new(),
            default: default.clone(),
        };
        store.insert(default.0, default.1);
        for (key, record) in builtin_records() {
            store.insert(key, record);
        }
        store
    }

    /// Built-in timetables overlaid with every `*.json` dataset in `data_dir`.
    /// Files that fail to parse are skipped with a warning.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut store = Self::builtin();

        for file in find_dataset_files(data_dir)? {
            debug!(file = %file.display(), "Loading dataset file");
            match parser::parse_dataset_file(&file) {
                Ok(records) => {
                    debug!(count = records.len(), "Found timetables");
                    for (key, record) in records {
                        match split_store_key(&key) {
                            Some(schedule_key) => store.insert(schedule_key, record),
                            None => warn!(key = %key, "Ignoring timetable with malformed key"),
                        }
                    }
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Failed to parse dataset file");
                }
            }
        }

        info!(timetables = store.len(), "Schedule store loaded");
        Ok(store)
    }

    fn insert(&mut self, key: ScheduleKey, record: TimetableRecord) {
        if key == self.default.0 {
            self.default.1 = record.clone();
        }
        self.records.insert(key.store_key(), (key, record));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ScheduleKey> {
        self.records.values().map(|(key, _)| key)
    }

    /// Look up a timetable, falling back to the default one for unknown keys
    pub fn lookup(&self, key: &ScheduleKey) -> Lookup<'_> {
        if let Some((found_key, record)) = self.records.get(&key.store_key()) {
            return Lookup {
                key: found_key,
                record,
                fell_back: false,
            };
        }

        warn!(
            requested = %key,
            served = %self.default.0,
            "Unknown timetable, serving default"
        );
        let (default_key, record) = &self.default;
        Lookup {
            key: default_key,
            record,
            fell_back: true,
        }
    }
}

/// Split "cse_3_a" into its parts
fn split_store_key(key: &str) -> Option<ScheduleKey> {
    let mut parts = key.splitn(3, '_');
    let department = parts.next().filter(|p| !p.is_empty())?;
    let year = parts.next().filter(|p| !p.is_empty())?;
    let section = parts.next().filter(|p| !p.is_empty() && !p.contains('_'))?;
    Some(ScheduleKey::new(department, year, section))
}

/// Find all dataset files in the data directory
fn find_dataset_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    if !data_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<_> = std::fs::read_dir(data_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();

    files.sort();
    Ok(files)
}

fn t(label: &str) -> TimeRange {
    parser::parse_time_range(label).expect("built-in time labels are valid")
}

fn class(time: &str, code: &str, subject: &str, faculty: &str, room: &str, cat: Category) -> ClassEntry {
    ClassEntry::class(t(time), code, subject, faculty, room, cat)
}

fn record(department: &str, days: Vec<(Day, Vec<ClassEntry>)>) -> TimetableRecord {
    TimetableRecord {
        department: department.to_string(),
        year: "III".to_string(),
        section: "A".to_string(),
        timetable: days.into_iter().collect::<Timetable>(),
    }
}

/// The default timetable, cse_3_a
fn builtin_default() -> TimetableRecord {
    use Category::*;

    record(
        "Computer Science & Engineering",
        vec![
            (
                Day::Monday,
                vec![
                    class("8:00-8:50", "CS301", "Data Structures & Algorithms", "Dr. R. Kumar", "CSE-101", Theory).with_credits(3),
                    class("8:50-9:40", "CS302", "Database Management Systems", "Prof. S. Priya", "CSE-102", Theory).with_credits(4),
                    class("9:40-10:30", "CS303", "Operating Systems", "Dr. M. Verma", "CSE-103", Theory).with_credits(3),
                    class("10:45-12:25", "CS351", "Data Structures Lab", "Dr. N. Thirugnanasamdandan", "CSE-Lab-1", Lab).with_span(2).with_credits(2),
                    ClassEntry::break_entry(t("1:30-2:20"), "LUNCH BREAK"),
                    class("2:20-3:10", "GATE01", "GATE Coaching - Aptitude", "Prof. R. Desai", "CSE-201", Gate).with_credits(1),
                    class("3:10-4:00", "CS371", "Mini Project", "Dr. N. Thirugnanasamdandan", "CSE-Lab-4", Practical).with_credits(2),
                ],
            ),
            (
                Day::Tuesday,
                vec![
                    class("8:00-8:50", "CS304", "Computer Networks", "Prof. A. Sharma", "CSE-104", Theory).with_credits(4),
                    class("8:50-9:40", "CS305", "Software Engineering", "Dr. N. Thirugnanasamdandan", "CSE-105", Theory).with_credits(3),
                    class("9:40-11:35", "CS352", "Database Systems Lab", "Prof. P. Singh", "CSE-Lab-2", Lab).with_span(2).with_credits(2),
                    ClassEntry::break_entry(t("11:35-12:25"), "BREAK"),
                    class("1:30-4:00", "CS391", "Major Project", "Dr. N. Thirugnanasamdandan", "Project Lab", Project).with_span(3).with_credits(6),
                ],
            ),
            (
                Day::Wednesday,
                vec![
                    class("8:00-8:50", "CS302", "Database Management Systems", "Prof. S. Priya", "CSE-102", Theory).with_credits(4),
                    class("8:50-9:40", "CS303", "Operating Systems", "Dr. M. Verma", "CSE-103", Theory).with_credits(3),
                    ClassEntry::break_entry(t("9:40-10:30"), "BREAK"),
                    class("10:45-12:25", "CS353", "Web Technologies Lab", "Prof. R. Patel", "CSE-Lab-3", Lab).with_span(2).with_credits(2),
                    class("1:30-3:10", "CS381", "Technical Seminar", "Dr. N. Thirugnanasamdandan", "Seminar Hall", Seminar).with_span(2).with_credits(1),
                ],
            ),
            (
                Day::Thursday,
                vec![
                    class("8:00-8:50", "CS301", "Data Structures & Algorithms", "Dr. R. Kumar", "CSE-101", Theory).with_credits(3),
                    class("8:50-9:40", "CS304", "Computer Networks", "Dr. N. Thirugnanasamdandan", "CSE-104", Theory).with_credits(4),
                    class("9:40-10:30", "CS305", "Software Engineering", "Dr. K. Reddy", "CSE-105", Theory).with_credits(3),
                    class("10:45-11:35", "GATE02", "GATE Coaching - Technical", "Prof. S. Nair", "CSE-202", Gate).with_credits(1),
                    class("11:35-12:25", "CS371", "Mini Project", "Dr. N. Thirugnanasamdandan", "CSE-Lab-4", Practical).with_credits(2),
                    class("1:30-3:10", "CS351", "Data Structures Lab", "Prof. N. Gupta", "CSE-Lab-1", Lab).with_span(2).with_credits(2),
                ],
            ),
            (
                Day::Friday,
                vec![
                    class("8:00-8:50", "CS303", "Operating Systems", "Dr. M. Verma", "CSE-103", Theory).with_credits(3),
                    class("8:50-9:40", "CS302", "Database Management Systems", "Prof. S. Priya", "CSE-102", Theory).with_credits(4),
                    class("9:40-10:30", "CS301", "Data Structures & Algorithms", "Dr. R. Kumar", "CSE-101", Theory).with_credits(3),
                    class("10:45-12:25", "CS391", "Major Project", "Dr. S. Mehta", "Project Lab", Project).with_span(2).with_credits(6),
                    class("1:30-3:10", "CS352", "Database Systems Lab", "Prof. P. Singh", "CSE-Lab-2", Lab).with_span(2).with_credits(2),
                ],
            ),
        ],
    )
}

fn builtin_records() -> Vec<(ScheduleKey, TimetableRecord)> {
    use Category::*;

    let ece = record(
        "Electronics & Communication Engineering",
        vec![(
            Day::Monday,
            vec![
                class("8:00-8:50", "EC301", "Digital Signal Processing", "Dr. V. Sharma", "ECE-101", Theory),
                class("8:50-9:40", "EC302", "Communication Systems", "Prof. M. Reddy", "ECE-102", Theory),
                class("9:40-11:35", "EC351", "DSP Lab", "Prof. S. Kumar", "ECE-Lab-1", Lab).with_span(2),
                class("1:30-3:10", "EC391", "Project Work", "Dr. A. Verma", "Project Lab", Project).with_span(2),
            ],
        )],
    );

    let eee = record(
        "Electrical & Electronics Engineering",
        vec![(
            Day::Monday,
            vec![
                class("8:00-8:50", "EE301", "Power Systems", "Dr. P. Singh", "EEE-101", Theory),
                class("8:50-10:30", "EE351", "Power Systems Lab", "Prof. R. Gupta", "EEE-Lab-1", Lab).with_span(2),
            ],
        )],
    );

    let mech = record(
        "Mechanical Engineering",
        vec![(
            Day::Monday,
            vec![
                class("8:00-9:40", "ME301", "Thermodynamics", "Dr. S. Rajan", "MECH-101", Theory).with_span(2),
                class("10:45-12:25", "ME351", "Thermodynamics Lab", "Prof. K. Nair", "MECH-Lab-1", Lab).with_span(2),
            ],
        )],
    );

    let civil = record(
        "Civil Engineering",
        vec![(
            Day::Monday,
            vec![
                class("8:00-9:40", "CE301", "Structural Analysis", "Dr. R. Menon", "CIVIL-101", Theory).with_span(2),
                class("10:45-12:25", "CE351", "Structures Lab", "Prof. S. Desai", "CIVIL-Lab-1", Lab).with_span(2),
            ],
        )],
    );

    vec![
        (ScheduleKey::new("ece", "3", "a"), ece),
        (ScheduleKey::new("eee", "3", "a"), eee),
        (ScheduleKey::new("mech", "3", "a"), mech),
        (ScheduleKey::new("civil", "3", "a"), civil),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ========== lookup tests ==========

    #[test]
    fn test_builtin_holds_all_departments() {
        let store = ScheduleStore::builtin();
        assert_eq!(store.len(), DEPARTMENTS.len());
        for dept in DEPARTMENTS {
            let lookup = store.lookup(&ScheduleKey::new(dept.id, "3", "a"));
            assert!(!lookup.fell_back, "missing {}", dept.id);
            assert_eq!(lookup.record.department, dept.name);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(&ScheduleKey::new("ECE", "3", "A"));
        assert!(!lookup.fell_back);
        assert_eq!(lookup.key.department, "ece");
    }

    #[test]
    fn test_lookup_unknown_department_falls_back_to_default() {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(&ScheduleKey::new("xyz", "3", "a"));

        assert!(lookup.fell_back);
        assert_eq!(lookup.key, &default_key());
        assert_eq!(lookup.record.department, "Computer Science & Engineering");
        assert!(!lookup.record.day(Day::Monday).is_empty());
    }

    #[test]
    fn test_lookup_unknown_section_falls_back() {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(&ScheduleKey::new("cse", "3", "z"));
        assert!(lookup.fell_back);
        assert_eq!(lookup.key.store_key(), "cse_3_a");
    }

    #[test]
    fn test_builtin_cse_has_full_week() {
        let store = ScheduleStore::builtin();
        let record = store.lookup(&default_key()).record;
        for day in Day::ALL {
            assert!(!record.day(day).is_empty(), "{day} is empty");
        }
    }

    // ========== split_store_key tests ==========

    #[test]
    fn test_split_store_key() {
        let key = split_store_key("it_2_b").unwrap();
        assert_eq!(key, ScheduleKey::new("it", "2", "b"));
        assert!(split_store_key("it_2").is_none());
        assert!(split_store_key("it__b").is_none());
        assert!(split_store_key("it_2_b_c").is_none());
    }

    // ========== load tests ==========

    const EXTRA: &str = r#"{
        "it_2_b": {
            "department": "Information Technology",
            "year": "II",
            "section": "B",
            "timetable": {
                "Friday": [
                    {"time": "8:00-8:50", "code": "IT201", "subject": "Discrete Maths", "faculty": "Dr. A", "room": "IT-1", "type": "theory"}
                ]
            }
        }
    }"#;

    #[test]
    fn test_load_missing_dir_gives_builtin() {
        let store = ScheduleStore::load(Path::new("/nonexistent/data")).unwrap();
        assert_eq!(store.len(), DEPARTMENTS.len());
    }

    #[test]
    fn test_load_adds_dataset_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("it.json"), EXTRA).unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let store = ScheduleStore::load(temp_dir.path()).unwrap();
        assert_eq!(store.len(), DEPARTMENTS.len() + 1);

        let lookup = store.lookup(&ScheduleKey::new("IT", "2", "B"));
        assert!(!lookup.fell_back);
        assert_eq!(lookup.record.day(Day::Friday).len(), 1);
    }

    #[test]
    fn test_load_dataset_overrides_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let override_cse = EXTRA.replace("it_2_b", "cse_3_a");
        std::fs::write(temp_dir.path().join("cse.json"), override_cse).unwrap();

        let store = ScheduleStore::load(temp_dir.path()).unwrap();
        let record = store.lookup(&default_key()).record;
        assert_eq!(record.department, "Information Technology");

        // Unknown keys fall back to the overridden default, not the built-in one
        let lookup = store.lookup(&ScheduleKey::new("xyz", "9", "q"));
        assert!(lookup.fell_back);
        assert_eq!(lookup.record.department, "Information Technology");
    }

    #[test]
    fn test_load_accepts_zero_padded_morning_labels() {
        let temp_dir = TempDir::new().unwrap();
        let early = EXTRA.replace("8:00-8:50", "07:30-08:20");
        std::fs::write(temp_dir.path().join("it.json"), early).unwrap();

        let store = ScheduleStore::load(temp_dir.path()).unwrap();
        let lookup = store.lookup(&ScheduleKey::new("it", "2", "b"));
        assert!(!lookup.fell_back);
        let entry = &lookup.record.day(Day::Friday)[0];
        assert_eq!(entry.time.start, 7 * 60 + 30);
        assert_eq!(entry.time.end, 8 * 60 + 20);
    }

    #[test]
    fn test_load_skips_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a_good.json"), EXTRA).unwrap();
        std::fs::write(temp_dir.path().join("b_bad.json"), "not json").unwrap();

        let store = ScheduleStore::load(temp_dir.path()).unwrap();
        assert_eq!(store.len(), DEPARTMENTS.len() + 1);
    }
}
