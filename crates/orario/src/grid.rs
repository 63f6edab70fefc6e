//! Placement of class entries onto the slot × day grid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::clock::Highlight;
use crate::types::{ClassEntry, Day, TimeSlot, TimetableRecord};

/// How an entry is matched against a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotMatching {
    /// The entry's time range must equal the slot's range. Multi-period
    /// entries have to be repeated once per slot they span.
    Exact,
    /// The entry's time range must contain the slot's range, so a
    /// two-period lab written as "10:45-12:25" fills both slots.
    #[default]
    Containment,
}

impl SlotMatching {
    pub fn matches(&self, entry: &ClassEntry, slot: &TimeSlot) -> bool {
        match self {
            // Compares parsed ranges, so "08:50-09:40" equals "8:50-9:40"
            SlotMatching::Exact => entry.time == slot.range,
            SlotMatching::Containment => entry.time.covers(&slot.range),
        }
    }

    /// Parse a mode name, falling back to the default for unknown names
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(mode = %name, "Unknown slot matching mode, using containment");
            Self::default()
        })
    }
}

impl FromStr for SlotMatching {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(SlotMatching::Exact),
            "containment" | "contain" => Ok(SlotMatching::Containment),
            other => Err(format!("unknown slot matching mode: {other}")),
        }
    }
}

impl fmt::Display for SlotMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotMatching::Exact => f.write_str("exact"),
            SlotMatching::Containment => f.write_str("containment"),
        }
    }
}

/// Where a cell sits within a multi-slot entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanPosition {
    Single,
    Start,
    Continued,
}

/// What one (slot, day) cell shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CellState<'a> {
    Empty,
    Break {
        entry: &'a ClassEntry,
    },
    Class {
        entry: &'a ClassEntry,
        position: SpanPosition,
    },
}

impl CellState<'_> {
    #[cfg(test)]
    pub fn entry(&self) -> Option<&ClassEntry> {
        match self {
            CellState::Empty => None,
            CellState::Break { entry } | CellState::Class { entry, .. } => Some(entry),
        }
    }

    /// CSS classes describing this cell, excluding highlight state
    pub fn css_classes(&self) -> Vec<String> {
        let mut classes = vec!["subject-cell".to_string()];
        match self {
            CellState::Empty => classes.push("empty".to_string()),
            CellState::Break { entry } => classes.push(entry.category.as_str().to_string()),
            CellState::Class { entry, position } => {
                classes.push(entry.category.as_str().to_string());
                if entry.span > 1 {
                    classes.push(format!("span-{}", entry.span));
                    classes.push(match position {
                        SpanPosition::Start | SpanPosition::Single => "span-start".to_string(),
                        SpanPosition::Continued => "span-continued".to_string(),
                    });
                }
            }
        }
        classes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCell<'a> {
    pub day: Day,
    #[serde(flatten)]
    pub state: CellState<'a>,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridRow<'a> {
    pub slot: TimeSlot,
    pub current: bool,
    pub cells: Vec<GridCell<'a>>,
}

/// The rendered layout: one row per slot, one cell per day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid<'a> {
    pub days: Vec<Day>,
    pub today: Option<Day>,
    pub rows: Vec<GridRow<'a>>,
}

#[cfg(test)]
impl<'a> Grid<'a> {
    pub fn cell(&self, slot_idx: usize, day: Day) -> Option<&GridCell<'a>> {
        self.rows
            .get(slot_idx)?
            .cells
            .iter()
            .find(|cell| cell.day == day)
    }
}

/// First entry of the day that matches the slot
fn find_entry<'a>(
    entries: &'a [ClassEntry],
    slot: &TimeSlot,
    matching: SlotMatching,
) -> Option<&'a ClassEntry> {
    entries.iter().find(|entry| matching.matches(entry, slot))
}

/// Build the grid for one timetable.
///
/// Every (slot, day) pair yields exactly one cell. When entries overlap the
/// first match in day order wins.
pub fn build_grid<'a>(
    record: &'a TimetableRecord,
    slots: &[TimeSlot],
    days: &[Day],
    highlight: Option<&Highlight>,
    matching: SlotMatching,
) -> Grid<'a> {
    let mut rows: Vec<GridRow<'a>> = Vec::with_capacity(slots.len());

    for (slot_idx, slot) in slots.iter().enumerate() {
        let cells = days
            .iter()
            .map(|&day| {
                let entries = record.day(day);
                let state = match find_entry(entries, slot, matching) {
                    None => CellState::Empty,
                    Some(entry) if entry.category.is_break() => CellState::Break { entry },
                    Some(entry) => {
                        let position = span_position(&rows, day, entry);
                        CellState::Class { entry, position }
                    }
                };
                GridCell {
                    day,
                    state,
                    current: highlight
                        .map(|h| h.is_current_cell(slot_idx, day))
                        .unwrap_or(false),
                }
            })
            .collect();

        rows.push(GridRow {
            slot: *slot,
            current: highlight
                .map(|h| h.is_current_slot(slot_idx))
                .unwrap_or(false),
            cells,
        });
    }

    Grid {
        days: days.to_vec(),
        today: highlight.and_then(|h| h.day),
        rows,
    }
}

/// Same activity, ignoring the time label
fn same_activity(a: &ClassEntry, b: &ClassEntry) -> bool {
    a.category == b.category
        && a.code == b.code
        && a.subject == b.subject
        && a.faculty == b.faculty
        && a.room == b.room
}

/// A cell continues a span when the cell above shows the same activity
fn span_position(rows: &[GridRow<'_>], day: Day, entry: &ClassEntry) -> SpanPosition {
    if entry.span <= 1 {
        return SpanPosition::Single;
    }
    let above = rows
        .last()
        .and_then(|row| row.cells.iter().find(|c| c.day == day))
        .and_then(|cell| match &cell.state {
            CellState::Class { entry, .. } => Some(*entry),
            _ => None,
        });
    match above {
        Some(prev) if same_activity(prev, entry) => SpanPosition::Continued,
        _ => SpanPosition::Start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{default_key, ScheduleStore};
    use crate::types::{Category, Timetable, STANDARD_SLOTS};
    use chrono::NaiveDate;

    fn range(label: &str) -> crate::types::TimeRange {
        label.parse().unwrap()
    }

    fn lab(time: &str) -> ClassEntry {
        ClassEntry::class(
            range(time),
            "CS351",
            "Data Structures Lab",
            "Dr. R. Kumar",
            "CSE-Lab-1",
            Category::Lab,
        )
        .with_span(2)
    }

    fn record_with(day: Day, entries: Vec<ClassEntry>) -> TimetableRecord {
        let mut timetable = Timetable::new();
        timetable.insert(day, entries);
        TimetableRecord {
            department: "Test".to_string(),
            year: "III".to_string(),
            section: "A".to_string(),
            timetable,
        }
    }

    // ========== shape tests ==========

    #[test]
    fn test_grid_has_one_cell_per_slot_and_day() {
        let store = ScheduleStore::builtin();
        let record = store.lookup(&default_key()).record;

        for matching in [SlotMatching::Exact, SlotMatching::Containment] {
            let grid = build_grid(record, &STANDARD_SLOTS, &Day::ALL, None, matching);
            assert_eq!(grid.rows.len(), STANDARD_SLOTS.len());
            for row in &grid.rows {
                assert_eq!(row.cells.len(), Day::ALL.len());
                let days: Vec<Day> = row.cells.iter().map(|c| c.day).collect();
                assert_eq!(days, Day::ALL.to_vec());
            }
        }
    }

    #[test]
    fn test_empty_record_gives_empty_cells() {
        let record = record_with(Day::Monday, vec![]);
        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::default());

        assert!(grid
            .rows
            .iter()
            .flat_map(|r| &r.cells)
            .all(|c| c.state == CellState::Empty));
    }

    #[test]
    fn test_overlapping_entries_first_wins() {
        let first = ClassEntry::class(range("8:00-8:50"), "A1", "First", "X", "R1", Category::Theory);
        let second = ClassEntry::class(range("8:00-8:50"), "B2", "Second", "Y", "R2", Category::Theory);
        let record = record_with(Day::Monday, vec![first.clone(), second]);

        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::Exact);
        let cell = grid.cell(0, Day::Monday).unwrap();
        assert_eq!(cell.state.entry(), Some(&first));
    }

    #[test]
    fn test_exact_matching_compares_parsed_ranges() {
        // Zero-padded and 24-hour spellings name the same slots
        let record = record_with(
            Day::Monday,
            vec![
                ClassEntry::class(range("08:50-09:40"), "A1", "Padded", "X", "R1", Category::Theory),
                ClassEntry::class(range("13:30-14:20"), "B2", "Afternoon", "Y", "R2", Category::Theory),
            ],
        );
        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::Exact);

        assert_eq!(grid.cell(1, Day::Monday).unwrap().state.entry().unwrap().subject, "Padded");
        assert_eq!(grid.cell(5, Day::Monday).unwrap().state.entry().unwrap().subject, "Afternoon");
        assert_eq!(grid.cell(0, Day::Monday).unwrap().state, CellState::Empty);
    }

    // ========== cell state tests ==========

    #[test]
    fn test_break_cell() {
        let record = record_with(
            Day::Wednesday,
            vec![ClassEntry::break_entry(range("9:40-10:30"), "BREAK")],
        );
        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::Exact);
        let cell = grid.cell(2, Day::Wednesday).unwrap();

        assert!(matches!(cell.state, CellState::Break { .. }));
        assert_eq!(cell.state.css_classes(), vec!["subject-cell", "break"]);
    }

    #[test]
    fn test_exact_matching_needs_duplicated_span_entries() {
        let record = record_with(Day::Monday, vec![lab("9:40-10:30"), lab("10:45-11:35")]);
        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::Exact);

        let first = grid.cell(2, Day::Monday).unwrap();
        let second = grid.cell(3, Day::Monday).unwrap();
        assert_eq!(first.state.entry().unwrap().subject, "Data Structures Lab");
        assert_eq!(second.state.entry().unwrap().subject, "Data Structures Lab");
        assert_eq!(
            first.state.entry().unwrap().code,
            second.state.entry().unwrap().code
        );
        assert!(first.state.css_classes().contains(&"span-2".to_string()));
        assert!(first.state.css_classes().contains(&"span-start".to_string()));
        assert!(matches!(
            second.state,
            CellState::Class { position: SpanPosition::Continued, .. }
        ));
    }

    #[test]
    fn test_exact_matching_leaves_undivided_span_empty() {
        let record = record_with(Day::Monday, vec![lab("10:45-12:25")]);
        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::Exact);

        assert_eq!(grid.cell(3, Day::Monday).unwrap().state, CellState::Empty);
        assert_eq!(grid.cell(4, Day::Monday).unwrap().state, CellState::Empty);
    }

    #[test]
    fn test_containment_fills_every_spanned_slot() {
        let record = record_with(Day::Monday, vec![lab("10:45-12:25")]);
        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::Containment);

        let first = grid.cell(3, Day::Monday).unwrap();
        let second = grid.cell(4, Day::Monday).unwrap();
        assert_eq!(first.state.entry(), second.state.entry());
        assert!(matches!(
            first.state,
            CellState::Class { position: SpanPosition::Start, .. }
        ));
        assert!(matches!(
            second.state,
            CellState::Class { position: SpanPosition::Continued, .. }
        ));
        assert!(second.state.css_classes().contains(&"span-continued".to_string()));
        assert_eq!(grid.cell(2, Day::Monday).unwrap().state, CellState::Empty);
        assert_eq!(grid.cell(5, Day::Monday).unwrap().state, CellState::Empty);
    }

    #[test]
    fn test_containment_span_across_recess() {
        // 9:40-11:35 covers period 3 and period 4 around the 10:30 recess
        let record = record_with(Day::Tuesday, vec![lab("9:40-11:35")]);
        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::Containment);

        assert!(grid.cell(2, Day::Tuesday).unwrap().state.entry().is_some());
        assert!(grid.cell(3, Day::Tuesday).unwrap().state.entry().is_some());
        assert!(grid.cell(4, Day::Tuesday).unwrap().state.entry().is_none());
    }

    #[test]
    fn test_single_period_class_has_no_span_classes() {
        let entry = ClassEntry::class(range("8:00-8:50"), "CS301", "DSA", "X", "R", Category::Theory);
        let record = record_with(Day::Friday, vec![entry]);
        let grid = build_grid(&record, &STANDARD_SLOTS, &Day::ALL, None, SlotMatching::default());

        let classes = grid.cell(0, Day::Friday).unwrap().state.css_classes();
        assert_eq!(classes, vec!["subject-cell", "theory"]);
    }

    // ========== highlight tests ==========

    #[test]
    fn test_highlight_marks_row_and_cell() {
        let store = ScheduleStore::builtin();
        let record = store.lookup(&default_key()).record;
        // Tuesday 2025-01-14 09:15
        let now = NaiveDate::from_ymd_opt(2025, 1, 14)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        let highlight = Highlight::compute(now, &STANDARD_SLOTS);

        let grid = build_grid(
            record,
            &STANDARD_SLOTS,
            &Day::ALL,
            Some(&highlight),
            SlotMatching::default(),
        );

        assert_eq!(grid.today, Some(Day::Tuesday));
        let current_rows: Vec<usize> = grid
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.current)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(current_rows, vec![1]);
        assert!(grid.cell(1, Day::Tuesday).unwrap().current);
        assert!(!grid.cell(1, Day::Monday).unwrap().current);
        assert!(!grid.cell(0, Day::Tuesday).unwrap().current);
    }

    // ========== SlotMatching parsing ==========

    #[test]
    fn test_slot_matching_parse() {
        assert_eq!("exact".parse::<SlotMatching>().unwrap(), SlotMatching::Exact);
        assert_eq!(
            "Containment".parse::<SlotMatching>().unwrap(),
            SlotMatching::Containment
        );
        assert_eq!(SlotMatching::parse_or_default("weird"), SlotMatching::Containment);
    }
}
