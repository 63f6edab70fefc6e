use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::clock::{Clock, HighlightRefresher, SystemClock, WeekWindow, REFRESH_PERIOD};
use crate::config::Config;
use crate::data::{ScheduleStore, DEPARTMENTS};
use crate::db::SqlitePreferences;
use crate::error::{self, TimetableError};
use crate::export::{self, Export, ExportFormat, ViewMode};
use crate::grid::build_grid;
use crate::html::{self, Page};
use crate::prefs::{MemoryPreferences, PreferenceStore, Preferences};
use crate::types::{Day, ScheduleKey, TimetableRecord, STANDARD_SLOTS};

/// Application state shared across requests
pub struct AppState {
    pub store: ScheduleStore,
    pub config: Config,
    pub prefs: Mutex<Box<dyn PreferenceStore>>,
    pub refresher: Mutex<HighlightRefresher>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build the state and start the highlight refresher on the current runtime
    pub fn new(
        store: ScheduleStore,
        config: Config,
        prefs: Box<dyn PreferenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let refresher =
            HighlightRefresher::spawn(clock.clone(), STANDARD_SLOTS.to_vec(), REFRESH_PERIOD);
        Self {
            store,
            config,
            prefs: Mutex::new(prefs),
            refresher: Mutex::new(refresher),
            clock,
        }
    }

    /// Render the timetable page for a query
    pub async fn render(
        &self,
        query: &TimetableQuery,
        print: bool,
    ) -> Result<String, TimetableError> {
        let requested = query.key(&self.config);
        let prefs = {
            let store = self.prefs.lock().await;
            Preferences::load(&**store)?
        };
        let view = query
            .view
            .as_deref()
            .map(ViewMode::parse_or_default)
            .or(prefs.view_mode)
            .unwrap_or(self.config.view);
        let highlight = self.refresher.lock().await.current();

        let lookup = self.store.lookup(&requested);
        let grid = build_grid(
            lookup.record,
            &STANDARD_SLOTS,
            &Day::ALL,
            Some(&highlight),
            self.config.matching,
        );
        let week = WeekWindow::new(self.clock.now().date(), query.week.unwrap_or(0))?;

        let page = Page {
            requested: &requested,
            lookup,
            grid: &grid,
            view,
            week,
            prefs,
            print,
        };
        Ok(html::render_page(&page).into_string())
    }

    async fn update_preferences<F>(&self, update: F) -> Result<Json<Preferences>, ApiError>
    where
        F: FnOnce(&mut dyn PreferenceStore) -> error::Result<()>,
    {
        let mut store = self.prefs.lock().await;
        update(&mut **store)?;
        Ok(Json(Preferences::load(&**store)?))
    }
}

/// Selector values accepted by the page and API routes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimetableQuery {
    pub department: Option<String>,
    pub year: Option<String>,
    pub section: Option<String>,
    pub view: Option<String>,
    pub week: Option<i32>,
}

impl TimetableQuery {
    fn key(&self, config: &Config) -> ScheduleKey {
        config.key_for(
            self.department.as_deref(),
            self.year.as_deref(),
            self.section.as_deref(),
        )
    }
}

/// Error returned by API handlers as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(TimetableError);

impl From<TimetableError> for ApiError {
    fn from(err: TimetableError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            TimetableError::UnsupportedExport(_) => StatusCode::NOT_IMPLEMENTED,
            TimetableError::UnknownExportFormat(_)
            | TimetableError::InvalidTime(_)
            | TimetableError::InvalidTimeRange(_)
            | TimetableError::InvalidWeek(_) => StatusCode::BAD_REQUEST,
            TimetableError::Storage(_) | TimetableError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            error!(error = %self.0, "Request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimetableResponse<'a> {
    key: String,
    fell_back: bool,
    #[serde(flatten)]
    record: &'a TimetableRecord,
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/timetable", get(timetable_handler))
        .route("/api/export/{format}", get(export_handler))
        .route("/api/now", get(now_handler))
        .route("/api/departments", get(departments_handler))
        .route(
            "/api/preferences",
            get(preferences_handler).delete(reset_preferences_handler),
        )
        .route("/api/preferences/theme", post(theme_handler))
        .route("/api/preferences/contrast", post(contrast_handler))
        .route("/api/preferences/font-size", post(font_size_handler))
        .route("/api/preferences/view/{mode}", post(view_mode_handler))
        .with_state(state)
}

/// Start the web server
pub async fn serve(port: u16, config: Config) -> anyhow::Result<()> {
    let store = ScheduleStore::load(&config.data_dir)?;
    let prefs: Box<dyn PreferenceStore> = match SqlitePreferences::open(&config.db_path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "Preferences will not persist across restarts");
            Box::new(MemoryPreferences::default())
        }
    };

    let state = Arc::new(AppState::new(store, config, prefs, Arc::new(SystemClock)));

    let app = router(state.clone()).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(url = %format!("http://{}", addr), "Server running, press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.refresher.lock().await.shutdown();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Serve the timetable page
async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimetableQuery>,
) -> Result<Html<String>, ApiError> {
    Ok(Html(state.render(&query, false).await?))
}

/// Return the selected timetable as JSON
async fn timetable_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimetableQuery>,
) -> Response {
    let lookup = state.store.lookup(&query.key(&state.config));
    Json(TimetableResponse {
        key: lookup.key.store_key(),
        fell_back: lookup.fell_back,
        record: lookup.record,
    })
    .into_response()
}

/// Export the selected timetable
async fn export_handler(
    State(state): State<Arc<AppState>>,
    Path(format): Path<String>,
    Query(query): Query<TimetableQuery>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = format.parse()?;
    let lookup = state.store.lookup(&query.key(&state.config));

    match export::export(format, lookup.key, lookup.record, Utc::now())? {
        Export::Download {
            filename,
            content_type,
            body,
        } => Ok((
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            body,
        )
            .into_response()),
        Export::Print => Ok(Html(state.render(&query, true).await?).into_response()),
    }
}

/// Current slot and day highlight
async fn now_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.refresher.lock().await.current()).into_response()
}

async fn departments_handler() -> Response {
    Json(DEPARTMENTS).into_response()
}

async fn preferences_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Preferences>, ApiError> {
    state.update_preferences(|_| Ok(())).await
}

async fn reset_preferences_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Preferences>, ApiError> {
    info!("Resetting preferences");
    state.update_preferences(|store| store.clear()).await
}

async fn theme_handler(State(state): State<Arc<AppState>>) -> Result<Json<Preferences>, ApiError> {
    state
        .update_preferences(|store| Preferences::toggle_theme(store).map(|_| ()))
        .await
}

async fn contrast_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Preferences>, ApiError> {
    state
        .update_preferences(|store| Preferences::toggle_high_contrast(store).map(|_| ()))
        .await
}

async fn font_size_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Preferences>, ApiError> {
    state
        .update_preferences(|store| Preferences::bump_font_size(store).map(|_| ()))
        .await
}

async fn view_mode_handler(
    State(state): State<Arc<AppState>>,
    Path(mode): Path<String>,
) -> Result<Json<Preferences>, ApiError> {
    let mode = ViewMode::parse_or_default(&mode);
    state
        .update_preferences(|store| Preferences::set_view_mode(store, mode))
        .await
}
