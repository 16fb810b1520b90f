use axum::{
    Extension, Json, Router,
    extract::{Multipart, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;

use crate::calculator::{Action, CalculatorState, Phase};
use crate::config::AppConfig;
use crate::history::{FileHistoryStore, HistoryEntry, HistoryRecorder};
use crate::login::{self, CurrentUser, SessionStore, UserDatabase};
use crate::saving;

/// One user's calculator and the recorder for their history
struct UserCalculator {
    state: CalculatorState,
    recorder: HistoryRecorder,
}

pub struct AppState {
    pub config: AppConfig,
    pub users: UserDatabase,
    pub sessions: SessionStore,
    calculators: Mutex<HashMap<String, UserCalculator>>,
}

/// What the calculator page renders
#[derive(Debug, Serialize, Deserialize)]
pub struct CalculatorView {
    pub display: String,
    pub phase: Phase,
    pub history: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
struct PressRequest {
    key: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct ImportResponse {
    status: String,
    imported: usize,
    history: Vec<HistoryEntry>,
}

impl AppState {
    /// Prepare the database directory and empty in-memory state.
    pub fn new(config: AppConfig) -> std::io::Result<Self> {
        let users = UserDatabase::new(config.database_dir.clone());
        users.init()?;

        Ok(AppState {
            sessions: SessionStore::new(config.session_ttl),
            users,
            config,
            calculators: Mutex::new(HashMap::new()),
        })
    }

    /// The user's recorder, loading their recent history on first use.
    async fn recorder_for(&self, username: &str) -> HistoryRecorder {
        let mut calculators = self.calculators.lock().await;
        if let Some(calculator) = calculators.get(username) {
            return calculator.recorder.clone();
        }

        let store = FileHistoryStore::for_user(&self.config.database_dir, username);
        let recorder =
            HistoryRecorder::with_page_size(Arc::new(store), self.config.history_page_size);
        calculators.insert(
            username.to_string(),
            UserCalculator {
                state: CalculatorState::new(),
                recorder: recorder.clone(),
            },
        );
        drop(calculators);

        if let Err(e) = recorder.refresh().await {
            log::warn!("history load for {} did not finish: {}", username, e);
        }
        recorder
    }

    /// Current view for a user without changing anything.
    pub async fn view(&self, username: &str) -> CalculatorView {
        let recorder = self.recorder_for(username).await;
        let state = {
            let calculators = self.calculators.lock().await;
            calculators
                .get(username)
                .map(|calculator| calculator.state.clone())
                .unwrap_or_default()
        };

        CalculatorView {
            display: state.display().to_string(),
            phase: state.phase(),
            history: recorder.recent().await,
        }
    }

    /// Apply one keypad action to the user's calculator.
    ///
    /// A completed calculation is handed to the recorder without waiting for
    /// the store, so the returned history may not include it yet.
    pub async fn apply(&self, username: &str, action: Action) -> CalculatorView {
        let recorder = self.recorder_for(username).await;

        let transition = {
            let mut calculators = self.calculators.lock().await;
            let calculator = calculators
                .entry(username.to_string())
                .or_insert_with(|| UserCalculator {
                    state: CalculatorState::new(),
                    recorder: recorder.clone(),
                });
            let transition = calculator.state.reduce(action);
            calculator.state = transition.state.clone();
            transition
        };

        if let Some(calculation) = &transition.calculation {
            log::debug!("{} computed {}", username, calculation.expression);
            let _ = recorder.record(calculation);
        }

        CalculatorView {
            display: transition.state.display().to_string(),
            phase: transition.state.phase(),
            history: recorder.recent().await,
        }
    }
}

/// Routes, with everything calculator-related behind [`login::require_auth`].
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/calculator", get(serve_calculator))
        .route("/api/state", get(get_state))
        .route("/api/press", post(press_key))
        .route("/api/history", get(get_history))
        .route("/api/history/export", get(export_history))
        .route("/api/history/import", post(import_history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ))
        .route("/", get(serve_landing))
        .route(
            "/login",
            get(login::serve_login_page).post(login::handle_login),
        )
        .route(
            "/signup",
            get(login::serve_signup_page).post(login::handle_signup),
        )
        .route("/logout", get(login::handle_logout))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr.clone();
    let app_state = Arc::new(AppState::new(config)?);
    let app = router(app_state);

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_landing() -> Redirect {
    Redirect::to("/calculator")
}

async fn serve_calculator() -> Html<&'static str> {
    Html(include_str!("./static/calculator.html"))
}

async fn get_state(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Json<CalculatorView> {
    Json(state.view(&username).await)
}

async fn press_key(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(payload): Json<PressRequest>,
) -> Response {
    let Some(action) = Action::from_key(&payload.key) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some(format!("Unknown key: {:?}", payload.key)),
            }),
        )
            .into_response();
    };

    Json(state.apply(&username, action).await).into_response()
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Json<Vec<HistoryEntry>> {
    let recorder = state.recorder_for(&username).await;
    if let Err(e) = recorder.refresh().await {
        log::warn!("history refresh for {} did not finish: {}", username, e);
    }
    Json(recorder.recent().await)
}

async fn export_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Response {
    let recorder = state.recorder_for(&username).await;

    let archive = match recorder.store().all().await {
        Ok(entries) => saving::history_archive_bytes(&entries),
        Err(e) => Err(e),
    };

    match archive {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/gzip"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"history.bin.gz\"",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            log::error!("history export for {} failed: {}", username, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse {
                    status: "error".to_string(),
                    message: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

async fn import_history(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Response {
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("history") {
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some("No file data received".to_string()),
            }),
        )
            .into_response();
    }

    let entries = match saving::read_history_archive(file_data.as_slice()) {
        Ok(entries) => entries,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse {
                    status: "error".to_string(),
                    message: Some(format!("Failed to load history: {}", e)),
                }),
            )
                .into_response();
        }
    };

    let recorder = state.recorder_for(&username).await;
    let store = recorder.store();
    let mut imported = 0;
    for entry in entries {
        match store.create(entry).await {
            Ok(()) => imported += 1,
            Err(e) => {
                log::warn!("history import for {} stopped early: {}", username, e);
                break;
            }
        }
    }
    log::info!("imported {} history entries for {}", imported, username);

    if let Err(e) = recorder.refresh().await {
        log::warn!("history refresh for {} did not finish: {}", username, e);
    }

    Json(ImportResponse {
        status: "ok".to_string(),
        imported,
        history: recorder.recent().await,
    })
    .into_response()
}
