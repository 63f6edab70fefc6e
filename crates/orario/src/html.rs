use anyhow::Result;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::clock::WeekWindow;
use crate::data::{Lookup, DEPARTMENTS};
use crate::export::{ExportFormat, ViewMode};
use crate::grid::{CellState, Grid, GridCell};
use crate::prefs::Preferences;
use crate::types::{Category, ScheduleKey};

const YEARS: &[&str] = &["1", "2", "3", "4"];
const SECTIONS: &[&str] = &["a", "b", "c"];

/// Everything one timetable page shows
pub struct Page<'a> {
    /// Selector values as requested
    pub requested: &'a ScheduleKey,
    pub lookup: Lookup<'a>,
    pub grid: &'a Grid<'a>,
    pub view: ViewMode,
    pub week: WeekWindow,
    pub prefs: Preferences,
    /// Render the print layout and open the print dialog
    pub print: bool,
}

/// Write a rendered page to disk
pub fn generate_html(page: &Page<'_>, path: &Path) -> Result<()> {
    let html = render_page(page);
    fs::write(path, html.into_string())?;
    Ok(())
}

/// Percent-encode a query value
fn encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Query string selecting the served timetable with the given view and week
pub fn page_query(key: &ScheduleKey, view: ViewMode, week: i32) -> String {
    let mut query = format!(
        "department={}&year={}&section={}&view={}",
        encode(&key.department),
        encode(&key.year),
        encode(&key.section),
        view.as_str()
    );
    if week != 0 {
        query.push_str(&format!("&week={}", week));
    }
    query
}

pub fn render_page(page: &Page<'_>) -> Markup {
    let record = page.lookup.record;
    let key = page.lookup.key;
    let title = format!(
        "{} - Year {} - Section {}",
        record.department, record.year, record.section
    );
    let body_class = if page.prefs.high_contrast {
        "high-contrast"
    } else {
        ""
    };
    let font_size = format!("font-size: {}px", page.prefs.font_size);

    html! {
        (DOCTYPE)
        html lang="en" data-theme=(page.prefs.theme.as_str()) style=(font_size) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Orario - " (title) }
                style { (PreEscaped(CSS)) }
            }
            body class=(body_class) data-print[page.print] {
                div.container {
                    @if !page.print {
                        (render_toolbar())
                    }
                    h1 { "Orario" }
                    div.subtitle { (title) }

                    @if page.lookup.fell_back {
                        div.notice role="status" {
                            "No timetable for "
                            strong { (page.requested.store_key()) }
                            ", showing "
                            strong { (key.store_key()) }
                            " instead."
                        }
                    }

                    @if !page.print {
                        (render_selectors(key, page.view))
                        (render_controls(key, page.view, page.week.offset))
                        (render_week_navigation(key, page.view, &page.week))
                    }

                    (render_grid(page.grid, page.view, key.department.as_str()))

                    @if !page.print {
                        (render_legend())
                    }
                }
                dialog #"subject-modal" {
                    div #"subject-details" {}
                    form method="dialog" {
                        button.modal-close { "Close" }
                    }
                }
                script { (PreEscaped(JAVASCRIPT)) }
            }
        }
    }
}

fn render_toolbar() -> Markup {
    html! {
        div.toolbar {
            button #"theme-toggle" title="Toggle theme (Alt+T)" { "Theme" }
            button #"contrast-toggle" title="High contrast (Alt+C)" { "Contrast" }
            button #"text-size" title="Text size" { "A+" }
            button #"reset-preferences" title="Reset preferences" { "Reset" }
        }
    }
}

fn render_selectors(key: &ScheduleKey, view: ViewMode) -> Markup {
    html! {
        form.selectors method="get" action="/" {
            label {
                "Department "
                select name="department" {
                    @for dept in DEPARTMENTS {
                        option value=(dept.id) selected[dept.id == key.department] { (dept.name) }
                    }
                }
            }
            label {
                "Year "
                select name="year" {
                    @for year in YEARS {
                        option value=(year) selected[*year == key.year] { (year) }
                    }
                }
            }
            label {
                "Section "
                select name="section" {
                    @for section in SECTIONS {
                        option value=(section) selected[*section == key.section] { (section.to_uppercase()) }
                    }
                }
            }
            input type="hidden" name="view" value=(view.as_str());
            button type="submit" { "Show" }
        }
    }
}

fn render_controls(key: &ScheduleKey, view: ViewMode, week: i32) -> Markup {
    let export_query = page_query(key, view, 0);
    html! {
        div.timetable-controls {
            div.view-controls {
                @for mode in ViewMode::ALL {
                    a.view-btn.active[mode == view]
                        href={ "/?" (page_query(key, mode, week)) }
                        data-view=(mode.as_str()) { (mode.label()) }
                }
            }
            div.export-controls {
                @for format in ExportFormat::ALL {
                    a.export-btn
                        href={ "/api/export/" (format.as_str()) "?" (export_query) }
                        data-export=(format.as_str())
                        target=[(format == ExportFormat::Print).then_some("_blank")] { (format.label()) }
                }
            }
        }
    }
}

fn render_week_navigation(key: &ScheduleKey, view: ViewMode, week: &WeekWindow) -> Markup {
    html! {
        div.week-navigation {
            a.nav-btn.prev #"prev-week" href={ "/?" (page_query(key, view, week.offset - 1)) } { "‹ Previous Week" }
            div.week-info {
                div.week-title { (week.title()) }
                div.week-dates { (week.dates()) }
            }
            a.nav-btn.next #"next-week" href={ "/?" (page_query(key, view, week.offset + 1)) } { "Next Week ›" }
        }
    }
}

/// The slot × day grid
pub fn render_grid(grid: &Grid<'_>, view: ViewMode, department: &str) -> Markup {
    html! {
        div class={ "timetable " (department) " " (view.as_str()) } {
            div.timetable-header {
                div.time-header { "Time" }
                @for day in &grid.days {
                    div.day-header data-day=(day.name()) {
                        (day.name())
                        span.day-abbr { (day.abbr()) }
                        @if grid.today == Some(*day) {
                            span.current-day title="Today" { "T" }
                        }
                    }
                }
            }
            div.timetable-body {
                @for (slot_idx, row) in grid.rows.iter().enumerate() {
                    div.time-slot.current-time[row.current] data-slot=(slot_idx) {
                        div.time { (row.slot.range) }
                        div.period { "Period " (row.slot.period) }
                    }
                    @for cell in &row.cells {
                        (render_cell(cell, slot_idx))
                    }
                }
            }
        }
    }
}

fn render_cell(cell: &GridCell<'_>, slot_idx: usize) -> Markup {
    let mut classes = cell.state.css_classes();
    if cell.current {
        classes.push("current".to_string());
    }
    let classes = classes.join(" ");

    html! {
        @match &cell.state {
            CellState::Empty | CellState::Break { .. } => {
                div class=(classes) data-slot=(slot_idx) data-day=(cell.day.name()) {}
            }
            CellState::Class { entry, .. } => {
                div class=(classes)
                    data-slot=(slot_idx)
                    data-day=(cell.day.name())
                    data-code=[entry.code.as_deref()]
                    data-subject=(entry.subject)
                    data-faculty=[entry.faculty.as_deref()]
                    data-room=[entry.room.as_deref()]
                    data-time=(entry.time)
                    tabindex="0" {
                    div.subject-content {
                        @if let Some(code) = &entry.code {
                            div.subject-code { (code) }
                        }
                        div.subject-name { (entry.subject) }
                        @if let Some(faculty) = &entry.faculty {
                            div.subject-faculty { (faculty) }
                        }
                        @if let Some(room) = &entry.room {
                            div.subject-room { (room) }
                        }
                        div.subject-extra {
                            span.subject-type { (entry.category.display_name()) }
                            " · " (entry.time)
                            @if let Some(credits) = entry.credits {
                                " · " (credits) " credits"
                            }
                        }
                    }
                    div class={ "subject-badge " (entry.category.as_str()) } {}
                }
            }
        }
    }
}

fn render_legend() -> Markup {
    html! {
        div.legend {
            @for category in Category::ALL {
                @if !category.is_break() {
                    span.legend-item {
                        span.legend-swatch style={ "background:" (category.color()) } {}
                        (category.display_name())
                    }
                }
            }
        }
    }
}

const CSS: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

:root {
    --bg: #0f1419;
    --panel: #1a2029;
    --text: #e8eaed;
    --muted: #8a94a6;
    --line: rgba(255,255,255,0.08);
    --accent: #2e86c1;
    --theory: #3498db;
    --lab: #2ecc71;
    --project: #9b59b6;
    --seminar: #f1c40f;
    --gate: #e74c3c;
    --practical: #1abc9c;
}

[data-theme="light"] {
    --bg: #f5f7fa;
    --panel: #ffffff;
    --text: #1c2430;
    --muted: #5f6b7a;
    --line: rgba(0,0,0,0.08);
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
    background: var(--bg);
    color: var(--text);
    min-height: 100vh;
    line-height: 1.4;
}

body.high-contrast {
    --bg: #000;
    --panel: #000;
    --text: #fff;
    --muted: #ff0;
    --line: #fff;
}

.container {
    max-width: 1200px;
    margin: 0 auto;
    padding: 32px 20px 60px;
}

h1 {
    font-size: 2.4em;
    font-weight: 800;
    letter-spacing: -0.02em;
}

.subtitle {
    color: var(--muted);
    margin-bottom: 24px;
}

.toolbar {
    float: right;
    display: flex;
    gap: 8px;
}

button, .view-btn, .export-btn, .nav-btn {
    background: var(--panel);
    color: var(--text);
    border: 1px solid var(--line);
    border-radius: 6px;
    padding: 6px 12px;
    font: inherit;
    font-size: 0.85em;
    text-decoration: none;
    cursor: pointer;
}

.view-btn.active {
    background: var(--accent);
    color: #fff;
}

.notice {
    border-left: 4px solid var(--gate);
    background: var(--panel);
    padding: 12px 16px;
    margin-bottom: 20px;
}

.selectors, .timetable-controls, .week-navigation {
    display: flex;
    flex-wrap: wrap;
    gap: 12px;
    align-items: center;
    margin-bottom: 16px;
}

.timetable-controls {
    justify-content: space-between;
}

.view-controls, .export-controls {
    display: flex;
    gap: 6px;
}

.week-navigation {
    justify-content: space-between;
}

.week-info {
    text-align: center;
}

.week-title {
    font-weight: 700;
}

.week-dates {
    color: var(--muted);
    font-size: 0.85em;
}

.timetable {
    background: var(--panel);
    border: 1px solid var(--line);
    border-radius: 10px;
    overflow-x: auto;
}

.timetable-header, .timetable-body {
    display: grid;
    grid-template-columns: 110px repeat(5, minmax(140px, 1fr));
}

.time-header, .day-header {
    padding: 12px;
    font-weight: 700;
    border-bottom: 1px solid var(--line);
}

.day-abbr {
    display: none;
}

.current-day {
    display: inline-block;
    margin-left: 6px;
    padding: 0 6px;
    border-radius: 4px;
    background: var(--accent);
    color: #fff;
    font-size: 0.75em;
}

.time-slot, .subject-cell {
    padding: 10px 12px;
    border-bottom: 1px solid var(--line);
    border-right: 1px solid var(--line);
    min-height: 90px;
    position: relative;
}

.time-slot .period {
    color: var(--muted);
    font-size: 0.8em;
}

.time-slot.current-time {
    box-shadow: inset 4px 0 0 var(--accent);
}

.subject-cell.current {
    outline: 2px solid var(--accent);
    outline-offset: -2px;
}

.subject-cell.empty {
    background: transparent;
}

.subject-cell.break {
    background: repeating-linear-gradient(45deg, transparent, transparent 6px, var(--line) 6px, var(--line) 12px);
}

.subject-cell.span-continued {
    border-top: 1px dashed var(--line);
}

.subject-code {
    font-weight: 800;
    font-size: 0.85em;
}

.subject-name {
    font-weight: 600;
}

.subject-faculty, .subject-room, .subject-extra {
    color: var(--muted);
    font-size: 0.8em;
}

.subject-extra {
    display: none;
}

.subject-badge {
    position: absolute;
    top: 0;
    left: 0;
    width: 4px;
    height: 100%;
}

.subject-badge.theory { background: var(--theory); }
.subject-badge.lab { background: var(--lab); }
.subject-badge.project { background: var(--project); }
.subject-badge.seminar { background: var(--seminar); }
.subject-badge.gate { background: var(--gate); }
.subject-badge.practical { background: var(--practical); }

.timetable.compact .time-slot,
.timetable.compact .subject-cell {
    min-height: 50px;
    padding: 6px 8px;
}

.timetable.compact .subject-faculty,
.timetable.compact .subject-room,
.timetable.compact .subject-name {
    display: none;
}

.timetable.detailed .subject-extra {
    display: block;
}

.timetable.detailed .subject-cell {
    min-height: 120px;
}

.legend {
    display: flex;
    flex-wrap: wrap;
    gap: 16px;
    margin-top: 20px;
    color: var(--muted);
    font-size: 0.85em;
}

.legend-swatch {
    display: inline-block;
    width: 12px;
    height: 12px;
    border-radius: 3px;
    margin-right: 6px;
    vertical-align: middle;
}

dialog {
    margin: auto;
    padding: 24px;
    border-radius: 10px;
    border: 1px solid var(--line);
    background: var(--panel);
    color: var(--text);
    min-width: 320px;
}

dialog::backdrop {
    background: rgba(0,0,0,0.6);
}

@media (max-width: 768px) {
    .day-header { font-size: 0; }
    .day-abbr { display: inline; font-size: 14px; }
}

@media print {
    .toolbar, .selectors, .timetable-controls, .week-navigation, .legend, dialog {
        display: none !important;
    }
    body { background: #fff; color: #000; }
}
"#;

const JAVASCRIPT: &str = r#"
// Refresh current slot and class highlights once a minute
async function refreshHighlight() {
    try {
        const res = await fetch('/api/now');
        if (!res.ok) return;
        const now = await res.json();
        document.querySelectorAll('.time-slot').forEach(el => {
            el.classList.toggle('current-time', now.slots.includes(Number(el.dataset.slot)));
        });
        document.querySelectorAll('.subject-cell').forEach(el => {
            const current = now.day === el.dataset.day && now.slots.includes(Number(el.dataset.slot));
            el.classList.toggle('current', current);
        });
    } catch (e) {
        // Static build without a server
    }
}

const refreshTimer = setInterval(refreshHighlight, 60000);
window.addEventListener('pagehide', () => clearInterval(refreshTimer));

async function postPreference(path) {
    const res = await fetch(path, { method: 'POST' });
    if (!res.ok) return null;
    return res.json();
}

function applyPreferences(prefs) {
    if (!prefs) return;
    document.documentElement.setAttribute('data-theme', prefs.theme);
    document.documentElement.style.fontSize = prefs.fontSize + 'px';
    document.body.classList.toggle('high-contrast', prefs.highContrast);
}

const themeToggle = document.getElementById('theme-toggle');
const contrastToggle = document.getElementById('contrast-toggle');
themeToggle?.addEventListener('click', async () => applyPreferences(await postPreference('/api/preferences/theme')));
contrastToggle?.addEventListener('click', async () => applyPreferences(await postPreference('/api/preferences/contrast')));
document.getElementById('text-size')?.addEventListener('click', async () => applyPreferences(await postPreference('/api/preferences/font-size')));
document.getElementById('reset-preferences')?.addEventListener('click', async () => {
    const res = await fetch('/api/preferences', { method: 'DELETE' });
    if (res.ok) applyPreferences(await res.json());
});

// Remember the chosen view
document.querySelectorAll('.view-btn').forEach(btn => {
    btn.addEventListener('click', () => {
        fetch('/api/preferences/view/' + btn.dataset.view, { method: 'POST' });
    });
});

// PDF export is not available; show the server's answer instead of navigating
document.querySelectorAll('.export-btn[data-export="pdf"]').forEach(btn => {
    btn.addEventListener('click', async (e) => {
        e.preventDefault();
        const res = await fetch(btn.href);
        const body = await res.json().catch(() => ({ error: 'PDF export failed' }));
        alert(body.error);
    });
});

// Subject details
const modal = document.getElementById('subject-modal');
const details = document.getElementById('subject-details');
document.querySelectorAll('.subject-cell[data-subject]').forEach(cell => {
    cell.addEventListener('click', () => {
        if (!modal || !details) return;
        details.replaceChildren();
        const rows = [
            ['Subject', cell.dataset.subject],
            ['Code', cell.dataset.code],
            ['Faculty', cell.dataset.faculty],
            ['Room', cell.dataset.room],
            ['Timing', cell.dataset.time],
        ];
        rows.filter(([, v]) => v).forEach(([k, v]) => {
            const row = document.createElement('div');
            const label = document.createElement('strong');
            label.textContent = k + ': ';
            row.append(label, v);
            details.appendChild(row);
        });
        modal.showModal();
    });
});

document.addEventListener('keydown', (e) => {
    if (e.altKey && e.key === 't') themeToggle?.click();
    if (e.altKey && e.key === 'c') contrastToggle?.click();
    if (e.altKey && e.key === 'p') window.print();
    if (e.target.tagName === 'SELECT') return;
    if (e.key === 'ArrowLeft') document.getElementById('prev-week')?.click();
    if (e.key === 'ArrowRight') document.getElementById('next-week')?.click();
});

if (document.body.hasAttribute('data-print')) {
    window.addEventListener('load', () => window.print());
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Highlight;
    use crate::data::{default_key, ScheduleStore};
    use crate::grid::{build_grid, SlotMatching};
    use crate::types::{Day, STANDARD_SLOTS};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()
    }

    fn render(key: &ScheduleKey, view: ViewMode, print: bool) -> String {
        let store = ScheduleStore::builtin();
        let lookup = store.lookup(key);
        let now = monday().and_hms_opt(11, 0, 0).unwrap();
        let highlight = Highlight::compute(now, &STANDARD_SLOTS);
        let grid = build_grid(
            lookup.record,
            &STANDARD_SLOTS,
            &Day::ALL,
            Some(&highlight),
            SlotMatching::default(),
        );
        let page = Page {
            requested: key,
            lookup,
            grid: &grid,
            view,
            week: WeekWindow::new(monday(), 0).unwrap(),
            prefs: Preferences::default(),
            print,
        };
        render_page(&page).into_string()
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode("cse"), "cse");
        assert_eq!(encode("a b&c"), "a%20b%26c");
    }

    #[test]
    fn test_page_query() {
        let key = default_key();
        assert_eq!(
            page_query(&key, ViewMode::Compact, 0),
            "department=cse&year=3&section=a&view=compact"
        );
        assert!(page_query(&key, ViewMode::Normal, -2).ends_with("&week=-2"));
    }

    #[test]
    fn test_render_page_structure() {
        let html = render(&default_key(), ViewMode::Normal, false);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Computer Science &amp; Engineering"));
        assert_eq!(html.matches("class=\"time-slot").count(), STANDARD_SLOTS.len());
        assert_eq!(
            html.matches("class=\"subject-cell").count(),
            STANDARD_SLOTS.len() * Day::ALL.len()
        );
        assert!(html.contains("class=\"timetable cse normal\""));
        assert!(html.contains("Period 9"));
        assert!(html.contains("Week 1"));
        assert!(!html.contains("class=\"notice\""));
    }

    #[test]
    fn test_render_page_highlights_current_class() {
        // Monday 11:00 falls in period 4, the first half of the DS lab
        let html = render(&default_key(), ViewMode::Normal, false);
        assert!(html.contains("class=\"time-slot current-time\" data-slot=\"3\""));
        assert!(html.contains("class=\"subject-cell lab span-2 span-start current\""));
        assert!(html.contains("class=\"current-day\""));
    }

    #[test]
    fn test_render_page_spanned_lab_in_both_cells() {
        let html = render(&default_key(), ViewMode::Normal, false);
        // Monday 10:45-12:25 and Thursday 1:30-3:10, two cells each
        assert_eq!(html.matches("data-subject=\"Data Structures Lab\"").count(), 4);
        assert!(html.contains("class=\"subject-cell lab span-2 span-continued\""));
    }

    #[test]
    fn test_render_page_view_mode_class() {
        let html = render(&default_key(), ViewMode::Compact, false);
        assert!(html.contains("class=\"timetable cse compact\""));
        assert!(html.contains("class=\"view-btn active\" href=\"/?department=cse&amp;year=3&amp;section=a&amp;view=compact\""));
    }

    #[test]
    fn test_render_page_fallback_notice() {
        let requested = ScheduleKey::new("xyz", "3", "a");
        let html = render(&requested, ViewMode::Normal, false);
        assert!(html.contains("class=\"notice\""));
        assert!(html.contains("xyz_3_a"));
    }

    #[test]
    fn test_render_print_layout() {
        let html = render(&default_key(), ViewMode::Normal, true);
        assert!(html.contains("<body class=\"\" data-print>"));
        assert!(!html.contains("class=\"timetable-controls\""));
        assert!(!html.contains("class=\"week-navigation\""));
    }

    #[test]
    fn test_generate_html_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.html");
        let store = ScheduleStore::builtin();
        let key = default_key();
        let lookup = store.lookup(&key);
        let grid = build_grid(
            lookup.record,
            &STANDARD_SLOTS,
            &Day::ALL,
            None,
            SlotMatching::default(),
        );
        let page = Page {
            requested: &key,
            lookup,
            grid: &grid,
            view: ViewMode::Normal,
            week: WeekWindow::new(monday(), 0).unwrap(),
            prefs: Preferences::default(),
            print: false,
        };

        generate_html(&page, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Orario"));
    }
}
