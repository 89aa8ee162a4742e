//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::header,
  response::{Html, IntoResponse},
  Json,
};
use futures::StreamExt;
use tracing::{info, instrument};

use crate::export::{EXPORT_FILE_NAME, EXPORT_MIME};
use crate::logic::*;
use crate::protocol::*;
use crate::routes::ApiError;
use crate::state::{AppState, SharedWorkspace};

async fn lookup(state: &AppState, id: &str) -> Result<SharedWorkspace, ApiError> {
  state.workspace(id).await.ok_or_else(|| ApiError::UnknownWorkspace(id.to_string()))
}

async fn snapshot(state: &AppState, ws: &SharedWorkspace) -> Json<WorkspaceOut> {
  let w = ws.lock().await;
  Json(to_workspace_out(&w, &state.catalog))
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, model: state.model.as_ref().map(|m| m.name().to_string()) })
}

#[instrument(level = "info", skip(state))]
pub async fn http_curriculum(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(CurriculumOut { chapters: state.catalog.chapters().to_vec() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_create_workspace(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (id, _) = state.create_workspace().await;
  Json(CreatedOut { id })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_workspace(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<WorkspaceOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  Ok(snapshot(&state, &ws).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_put_config(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ConfigPatch>,
) -> Result<Json<WorkspaceOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  update_config(&ws, body).await;
  Ok(snapshot(&state, &ws).await)
}

#[instrument(level = "info", skip(state, body), fields(chapters = body.chapter_ids.len()))]
pub async fn http_put_chapters(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ChaptersIn>,
) -> Result<Json<WorkspaceOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  select_chapters(&state, &ws, body.chapter_ids).await;
  Ok(snapshot(&state, &ws).await)
}

#[instrument(level = "info", skip(state, body), fields(topics = body.topic_ids.len()))]
pub async fn http_put_topics(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<TopicsIn>,
) -> Result<Json<WorkspaceOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  select_topics(&state, &ws, body.topic_ids).await;
  Ok(snapshot(&state, &ws).await)
}

#[instrument(level = "info", skip(state, body), fields(file_name = %body.file_name))]
pub async fn http_upload_file(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<FileIn>,
) -> Result<Json<WorkspaceOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  upload_file(&ws, &body).await?;
  Ok(snapshot(&state, &ws).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_remove_file(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<WorkspaceOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  remove_file(&ws).await;
  Ok(snapshot(&state, &ws).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_generate(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<GenerateOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  let out = generate_exam(&state, &ws).await?;
  info!(target: "exam", workspace = %id, count = out.questions.len(), failed = out.alert.is_some(), "HTTP generate served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_exam(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(q): Query<ExamQuery>,
) -> Result<Json<ExamOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  Ok(Json(exam_view(&ws, q.answers).await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_put_answers(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswersIn>,
) -> Result<Json<ExamOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  set_show_answers(&ws, body.show).await;
  Ok(Json(exam_view(&ws, None).await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_print(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
  let ws = lookup(&state, &id).await?;
  Ok(Html(print_page(&state, &ws).await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_export(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let ws = lookup(&state, &id).await?;
  let bytes = export_word(&state, &ws).await.ok_or(ApiError::NothingToExport)?;
  let headers = [
    (header::CONTENT_TYPE, EXPORT_MIME.to_string()),
    (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{EXPORT_FILE_NAME}\"")),
  ];
  Ok((headers, bytes))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_chat(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ChatIn>,
) -> Result<Json<ChatReplyOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  let mut events = chat_send(&state, ws, body.text);
  let mut message = None;
  while let Some(ev) = events.next().await {
    if let ChatEvent::Done(m) = ev {
      message = Some(m);
    }
  }
  Ok(Json(ChatReplyOut { message }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_chat_reset(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<ChatOut>, ApiError> {
  let ws = lookup(&state, &id).await?;
  let messages = chat_reset(&state, &ws).await;
  let status = ws.lock().await.chat.status();
  Ok(Json(ChatOut { status, messages }))
}
