use std::convert::Infallible;
use std::time::Duration;

use ao_core::conflict::ConflictReport;
use ao_core::launch::LaunchOutcome;
use ao_core::prefs::{default_catalog, CopyReport};
use ao_core::settings::SettingsDocument;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{Html, IntoResponse};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

use crate::error::WebError;
use crate::model::{
    roster_event_name, CloseRequest, CloseResponse, CopyPreferencesRequest, FocusResponse,
    LaunchRequest, NewAccountRequest, NewCharacterRequest, PreferenceItemsResponse, RosterView,
    SettingsUpdate, StatusMessage, ToggleRequest,
};
use crate::state::WebState;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/roster", get(roster))
        .route("/api/settings", put(update_settings))
        .route("/api/accounts", post(add_account))
        .route("/api/accounts/{account}", delete(remove_account))
        .route("/api/accounts/{account}/characters", post(add_character))
        .route(
            "/api/accounts/{account}/characters/{character}",
            delete(remove_character),
        )
        .route("/api/selection/toggle", post(toggle_selection))
        .route("/api/selection/clear", post(clear_selection))
        .route("/api/check_conflicts", post(check_conflicts))
        .route("/api/close_running_instances", post(close_running_instances))
        .route("/api/launch", post(launch))
        .route("/api/focus_launcher_window", post(focus_launcher_window))
        .route("/api/preferences/items", get(preference_items))
        .route("/api/preferences/copy", post(copy_preferences))
        .route("/api/export/settings", get(export_settings))
        .route("/api/import/settings", post(import_settings))
        .route("/api/export/launch_script", get(export_launch_script))
        .route("/api/events", get(stream_events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn roster(State(state): State<WebState>) -> Json<RosterView> {
    Json(RosterView::from(state.document().await))
}

async fn update_settings(
    State(state): State<WebState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<RosterView>, WebError> {
    let document = state.update_settings(update).await?;
    Ok(Json(RosterView::from(document)))
}

async fn add_account(
    State(state): State<WebState>,
    Json(request): Json<NewAccountRequest>,
) -> Result<Json<RosterView>, WebError> {
    let (document, change) = state.add_account(request).await?;
    Ok(Json(RosterView::changed(document, change)))
}

async fn remove_account(
    State(state): State<WebState>,
    Path(account): Path<String>,
) -> Result<Json<RosterView>, WebError> {
    let (document, change) = state.remove_account(&account).await?;
    Ok(Json(RosterView::changed(document, change)))
}

async fn add_character(
    State(state): State<WebState>,
    Path(account): Path<String>,
    Json(request): Json<NewCharacterRequest>,
) -> Result<Json<RosterView>, WebError> {
    let (document, change) = state.add_character(&account, request).await?;
    Ok(Json(RosterView::changed(document, change)))
}

async fn remove_character(
    State(state): State<WebState>,
    Path((account, character)): Path<(String, u32)>,
) -> Result<Json<RosterView>, WebError> {
    let (document, change) = state.remove_character(&account, character).await?;
    Ok(Json(RosterView::changed(document, change)))
}

async fn toggle_selection(
    State(state): State<WebState>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<RosterView>, WebError> {
    let (document, change) = state.toggle_selection(request).await?;
    Ok(Json(RosterView::changed(document, change)))
}

async fn clear_selection(State(state): State<WebState>) -> Result<Json<RosterView>, WebError> {
    let (document, change) = state.clear_selection().await?;
    Ok(Json(RosterView::changed(document, change)))
}

async fn check_conflicts(
    State(state): State<WebState>,
) -> Result<Json<ConflictReport>, WebError> {
    Ok(Json(state.check_conflicts().await?))
}

async fn close_running_instances(
    State(state): State<WebState>,
    Json(request): Json<CloseRequest>,
) -> Result<Json<CloseResponse>, WebError> {
    let ack = state.close_running_instances(request.accounts).await?;
    Ok(Json(CloseResponse {
        status: "success".to_string(),
        ack,
    }))
}

async fn launch(
    State(state): State<WebState>,
    Json(request): Json<LaunchRequest>,
) -> Result<Json<LaunchOutcome>, WebError> {
    Ok(Json(state.launch(request).await?))
}

async fn focus_launcher_window(
    State(state): State<WebState>,
) -> Result<Json<FocusResponse>, WebError> {
    let focused = state.focus_launcher_window().await?;
    let status = if focused { "success" } else { "not_found" };
    Ok(Json(FocusResponse {
        status: status.to_string(),
        focused,
    }))
}

async fn preference_items(State(state): State<WebState>) -> Json<PreferenceItemsResponse> {
    Json(PreferenceItemsResponse {
        prefs_root: state.config().paths.prefs_root.clone(),
        items: default_catalog(),
    })
}

async fn copy_preferences(
    State(state): State<WebState>,
    Json(request): Json<CopyPreferencesRequest>,
) -> Result<Json<CopyReport>, WebError> {
    Ok(Json(state.copy_preferences(request).await?))
}

async fn export_settings(State(state): State<WebState>) -> impl IntoResponse {
    (
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"aodeck-settings.json\"",
        )],
        Json(state.document().await),
    )
}

async fn import_settings(
    State(state): State<WebState>,
    Json(document): Json<SettingsDocument>,
) -> Result<Json<StatusMessage>, WebError> {
    let document = state.replace_document(document).await?;
    Ok(Json(StatusMessage::success(format!(
        "Imported {} account(s).",
        document.accounts.len()
    ))))
}

async fn export_launch_script(State(state): State<WebState>) -> Result<impl IntoResponse, WebError> {
    let script = state.launch_script().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-bat"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"launch_ao.bat\"",
            ),
        ],
        script,
    ))
}

async fn stream_events(
    State(state): State<WebState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.subscribe();
    let stream = BroadcastStream::new(rx).map(|message| {
        let event = match message {
            Ok(payload) => {
                let data = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
                SseEvent::default()
                    .event(roster_event_name(&payload.kind))
                    .data(data)
            }
            Err(_) => SseEvent::default().event("lagged").data("{}"),
        };
        Ok::<SseEvent, Infallible>(event)
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
