use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TimetableError;
use crate::parser;

/// A span of the school day, stored as minutes since midnight.
///
/// Serialized as its label, e.g. `"8:00-8:50"` or `"1:30-2:20"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    pub start: u16,
    pub end: u16,
}

impl TimeRange {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// True if `minute` lies within the range, both bounds included
    pub fn contains_minute(&self, minute: u16) -> bool {
        self.start <= minute && minute <= self.end
    }

    /// True if `other` lies entirely within this range
    pub fn covers(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            parser::format_time_of_day(self.start),
            parser::format_time_of_day(self.end)
        )
    }
}

impl FromStr for TimeRange {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse_time_range(s)
    }
}

impl TryFrom<String> for TimeRange {
    type Error = TimetableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeRange> for String {
    fn from(range: TimeRange) -> Self {
        range.to_string()
    }
}

/// One fixed period of the daily grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    #[serde(rename = "time")]
    pub range: TimeRange,
    pub period: u8,
}

impl TimeSlot {
    pub const fn new(start: u16, end: u16, period: u8) -> Self {
        Self {
            range: TimeRange::new(start, end),
            period,
        }
    }
}

/// The nine periods of every teaching day
pub const STANDARD_SLOTS: [TimeSlot; 9] = [
    TimeSlot::new(8 * 60, 8 * 60 + 50, 1),
    TimeSlot::new(8 * 60 + 50, 9 * 60 + 40, 2),
    TimeSlot::new(9 * 60 + 40, 10 * 60 + 30, 3),
    TimeSlot::new(10 * 60 + 45, 11 * 60 + 35, 4),
    TimeSlot::new(11 * 60 + 35, 12 * 60 + 25, 5),
    TimeSlot::new(13 * 60 + 30, 14 * 60 + 20, 6),
    TimeSlot::new(14 * 60 + 20, 15 * 60 + 10, 7),
    TimeSlot::new(15 * 60 + 10, 16 * 60, 8),
    TimeSlot::new(16 * 60, 16 * 60 + 50, 9),
];

/// Teaching days shown as grid columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    pub const ALL: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
        }
    }

    pub fn abbr(&self) -> &'static str {
        match self {
            Day::Monday => "MON",
            Day::Tuesday => "TUE",
            Day::Wednesday => "WED",
            Day::Thursday => "THU",
            Day::Friday => "FRI",
        }
    }

    /// Position in the week, Monday = 0
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Map a week index (Monday = 0 .. Sunday = 6) to a teaching day.
    /// Weekends have no column and map to `None`.
    pub fn from_index(index: usize) -> Option<Day> {
        Day::ALL.get(index).copied()
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of scheduled activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Theory,
    Lab,
    Project,
    Seminar,
    Gate,
    Practical,
    #[serde(alias = "lunch")]
    Break,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Theory,
        Category::Lab,
        Category::Project,
        Category::Seminar,
        Category::Gate,
        Category::Practical,
        Category::Break,
    ];

    /// CSS class and JSON name
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Theory => "theory",
            Category::Lab => "lab",
            Category::Project => "project",
            Category::Seminar => "seminar",
            Category::Gate => "gate",
            Category::Practical => "practical",
            Category::Break => "break",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Theory => "Theory",
            Category::Lab => "Laboratory",
            Category::Project => "Project",
            Category::Seminar => "Seminar",
            Category::Gate => "GATE Coaching",
            Category::Practical => "Practical",
            Category::Break => "Break",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Theory => "#3498db",
            Category::Lab => "#2ecc71",
            Category::Project => "#9b59b6",
            Category::Seminar => "#f1c40f",
            Category::Gate => "#e74c3c",
            Category::Practical => "#1abc9c",
            Category::Break => "#7f8c8d",
        }
    }

    pub fn is_break(&self) -> bool {
        matches!(self, Category::Break)
    }
}

fn default_span() -> u8 {
    1
}

/// One scheduled activity occupying one or more slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub time: TimeRange,

    /// Course code, e.g. "CS301"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Subject name, or the label of a break
    pub subject: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    #[serde(rename = "type")]
    pub category: Category,

    /// Number of consecutive slots this entry occupies
    #[serde(default = "default_span")]
    pub span: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<u8>,
}

impl ClassEntry {
    pub fn class(
        time: TimeRange,
        code: &str,
        subject: &str,
        faculty: &str,
        room: &str,
        category: Category,
    ) -> Self {
        Self {
            time,
            code: Some(code.to_string()),
            subject: subject.to_string(),
            faculty: Some(faculty.to_string()),
            room: Some(room.to_string()),
            category,
            span: 1,
            credits: None,
        }
    }

    pub fn break_entry(time: TimeRange, label: &str) -> Self {
        Self {
            time,
            code: None,
            subject: label.to_string(),
            faculty: None,
            room: None,
            category: Category::Break,
            span: 1,
            credits: None,
        }
    }

    pub fn with_span(mut self, span: u8) -> Self {
        self.span = span.max(1);
        self
    }

    pub fn with_credits(mut self, credits: u8) -> Self {
        self.credits = Some(credits);
        self
    }

    /// Split a combined "CS301 - Data Structures" subject into code and name
    /// when no separate code was given
    pub fn normalized(mut self) -> Self {
        if self.code.is_none() && !self.category.is_break() {
            if let Some((code, name)) = parser::split_subject(&self.subject) {
                self.code = Some(code);
                self.subject = name;
            }
        }
        self.span = self.span.max(1);
        self
    }
}

/// Day name to ordered class entries
pub type Timetable = BTreeMap<Day, Vec<ClassEntry>>;

/// A complete schedule for one department/year/section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableRecord {
    pub department: String,
    pub year: String,
    pub section: String,
    pub timetable: Timetable,
}

impl TimetableRecord {
    pub fn day(&self, day: Day) -> &[ClassEntry] {
        self.timetable.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Selector values identifying one schedule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub department: String,
    pub year: String,
    pub section: String,
}

impl ScheduleKey {
    pub fn new(department: &str, year: &str, section: &str) -> Self {
        Self {
            department: department.trim().to_lowercase(),
            year: year.trim().to_lowercase(),
            section: section.trim().to_lowercase(),
        }
    }

    /// Store key, e.g. "cse_3_a"
    pub fn store_key(&self) -> String {
        format!("{}_{}_{}", self.department, self.year, self.section)
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.store_key())
    }
}

/// Department shown in the selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Department {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
}
