use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod clock;
mod config;
mod data;
mod db;
mod error;
mod export;
mod grid;
mod html;
mod parser;
mod prefs;
mod server;
mod types;

use crate::clock::{Clock, Highlight, SystemClock, WeekWindow};
use crate::config::Config;
use crate::data::ScheduleStore;
use crate::export::{Export, ExportFormat, ViewMode};
use crate::grid::{build_grid, SlotMatching};
use crate::html::Page;
use crate::prefs::Preferences;
use crate::types::{Day, ScheduleKey, STANDARD_SLOTS};

#[derive(Parser, Debug)]
#[command(name = "orario")]
#[command(about = "Render a weekly class timetable and serve it as a web view")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output directory for generated files
    #[arg(short, long, default_value = ".", global = true)]
    output: PathBuf,

    /// Directory with extra timetable datasets (*.json)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// SQLite database for UI preferences
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Default department
    #[arg(long, global = true)]
    department: Option<String>,

    /// Default year
    #[arg(long, global = true)]
    year: Option<String>,

    /// Default section
    #[arg(long, global = true)]
    section: Option<String>,

    /// Default view (compact, normal, detailed)
    #[arg(long, global = true)]
    view: Option<String>,

    /// How entries are placed into slots (exact, containment)
    #[arg(long, global = true)]
    matching: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Generate static HTML pages for every timetable (no server)
    Build,

    /// Export the default timetable
    Export {
        /// Export format (json, print, pdf)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,
    },

    /// Show the current slot and class
    Now {
        /// Only check whether this slot label (e.g. "9:40-10:30") is current
        #[arg(long)]
        slot: Option<String>,
    },
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::default();
        config.defaults = config.key_for(
            self.department.as_deref(),
            self.year.as_deref(),
            self.section.as_deref(),
        );
        if let Some(view) = &self.view {
            config.view = ViewMode::parse_or_default(view);
        }
        if let Some(matching) = &self.matching {
            config.matching = SlotMatching::parse_or_default(matching);
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        config.output = self.output.clone();
        config
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level))
        .add_directive("hyper=warn".parse()?)
        .add_directive("tower_http=warn".parse()?);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;
    let config = args.config();

    match args.command {
        // Default to serve if no command specified
        None => server::serve(8080, config).await?,
        Some(Commands::Serve { port }) => server::serve(port, config).await?,
        Some(Commands::Build) => build(&config)?,
        Some(Commands::Export { format }) => export_timetable(&config, format)?,
        Some(Commands::Now { slot }) => report_now(&config, slot.as_deref())?,
    }

    Ok(())
}

/// Write one page per known timetable, plus `index.html` for the default
fn build(config: &Config) -> Result<()> {
    let store = ScheduleStore::load(&config.data_dir)?;
    fs::create_dir_all(&config.output)
        .with_context(|| format!("Failed to create {}", config.output.display()))?;
    let today = SystemClock.now().date();

    write_page(
        &store,
        config,
        &config.defaults,
        &config.output.join("index.html"),
        today,
        false,
    )?;
    for key in store.keys() {
        let path = config
            .output
            .join(format!("timetable_{}.html", key.store_key()));
        write_page(&store, config, key, &path, today, false)?;
    }

    info!(pages = store.len() + 1, "Static build complete");
    Ok(())
}

/// Render a static page; static pages carry no highlight or stored preferences
fn write_page(
    store: &ScheduleStore,
    config: &Config,
    key: &ScheduleKey,
    path: &Path,
    today: NaiveDate,
    print: bool,
) -> Result<()> {
    let lookup = store.lookup(key);
    let grid = build_grid(
        lookup.record,
        &STANDARD_SLOTS,
        &Day::ALL,
        None,
        config.matching,
    );
    let page = Page {
        requested: key,
        lookup,
        grid: &grid,
        view: config.view,
        week: WeekWindow::new(today, 0)?,
        prefs: Preferences::default(),
        print,
    };
    html::generate_html(&page, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "HTML saved");
    Ok(())
}

fn export_timetable(config: &Config, format: ExportFormat) -> Result<()> {
    let store = ScheduleStore::load(&config.data_dir)?;
    let lookup = store.lookup(&config.defaults);

    match export::export(format, lookup.key, lookup.record, Utc::now())? {
        Export::Download { filename, body, .. } => {
            let path = config.output.join(filename);
            fs::write(&path, body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Export saved");
        }
        Export::Print => {
            let path = config
                .output
                .join(format!("timetable_{}_print.html", lookup.key.store_key()));
            write_page(
                &store,
                config,
                lookup.key,
                &path,
                SystemClock.now().date(),
                true,
            )?;
        }
    }

    Ok(())
}

fn report_now(config: &Config, slot: Option<&str>) -> Result<()> {
    let now = SystemClock.now();

    if let Some(label) = slot {
        let current = clock::slot_is_current(&now, label).unwrap_or_else(|e| {
            warn!(error = %e, "Treating malformed slot as not current");
            false
        });
        info!(slot = label, current = current, "Slot check");
        return Ok(());
    }

    let highlight = Highlight::compute(now, &STANDARD_SLOTS);
    let Some(day) = highlight.day else {
        info!("No classes at the weekend");
        return Ok(());
    };

    if highlight.slots.is_empty() {
        info!(day = %day, "Outside teaching hours");
        return Ok(());
    }
    for &idx in &highlight.slots {
        let slot = STANDARD_SLOTS[idx];
        info!(day = %day, period = slot.period, time = %slot.range, "Current slot");
    }

    let store = ScheduleStore::load(&config.data_dir)?;
    let lookup = store.lookup(&config.defaults);
    let current = lookup
        .record
        .day(day)
        .iter()
        .filter(|entry| clock::is_current_class(&now, day, &entry.time));
    for entry in current {
        info!(
            timetable = %lookup.key,
            subject = %entry.subject,
            category = entry.category.display_name(),
            room = entry.room.as_deref().unwrap_or("-"),
            "Current class"
        );
    }

    Ok(())
}
