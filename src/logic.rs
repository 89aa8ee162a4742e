//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - configuration edits (mode, counts, difficulty, chapters/topics, upload)
//!   - exam generation with its single-flight gate and failure placeholder
//!   - screen/print/export views of the current Question Set
//!   - chat turns streamed from the model, and chat reset

use std::sync::Arc;

use async_stream::stream;
use base64::Engine;
use futures::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::chat::{system_context, Turn};
use crate::config::Prompts;
use crate::domain::{ChatMessage, Question, UploadedFile, MAX_ESSAY, MAX_MC, MAX_SHORT, MAX_TF};
use crate::export::export_doc;
use crate::model::{ExamModel, ModelError};
use crate::protocol::{ConfigPatch, ExamOut, FileIn, GenerateOut};
use crate::questions::{decode, failure_placeholder};
use crate::render::{print_html, project};
use crate::request::{self, ValidationError};
use crate::state::{AppState, SharedWorkspace, Workspace};
use crate::topics::{resolve, restrict_to_available};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const GENERATION_ALERT: &str = "Có lỗi xảy ra khi tạo đề. Vui lòng thử lại.";
const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
  #[error("File quá lớn. Vui lòng chọn file nhỏ hơn 10MB.")]
  TooLarge,
  #[error("Chỉ chấp nhận file PDF.")]
  NotPdf,
  #[error("Dữ liệu file không hợp lệ.")]
  InvalidBase64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerateError {
  #[error(transparent)]
  Invalid(#[from] ValidationError),
  #[error("Đề thi đang được tạo, vui lòng chờ.")]
  InProgress,
}

// -------- Configuration --------

#[instrument(level = "debug", skip(ws))]
pub async fn update_config(ws: &SharedWorkspace, patch: ConfigPatch) {
  let mut w = ws.lock().await;
  let c = &mut w.config;
  if let Some(mode) = patch.mode { c.mode = mode; }
  if let Some(n) = patch.num_mc { c.num_mc = n.min(MAX_MC); }
  if let Some(n) = patch.num_tf { c.num_tf = n.min(MAX_TF); }
  if let Some(n) = patch.num_short { c.num_short = n.min(MAX_SHORT); }
  if let Some(n) = patch.num_essay { c.num_essay = n.min(MAX_ESSAY); }
  if let Some(d) = patch.difficulty { c.difficulty = d; }
}

/// Replace the chapter selection and reconcile topics.
#[instrument(level = "debug", skip(state, ws))]
pub async fn select_chapters(state: &AppState, ws: &SharedWorkspace, chapter_ids: Vec<String>) {
  let mut w = ws.lock().await;
  let mut chapters: Vec<String> = Vec::new();
  for id in chapter_ids {
    if !chapters.contains(&id) {
      chapters.push(id);
    }
  }
  let topics = resolve(&w.config.selected_chapters, &chapters, &w.config.selected_topics, &state.catalog);
  info!(target: "exam", chapters = chapters.len(), topics = topics.len(), "Chapter selection changed");
  w.config.selected_chapters = chapters;
  w.config.selected_topics = topics;
}

#[instrument(level = "debug", skip(state, ws))]
pub async fn select_topics(state: &AppState, ws: &SharedWorkspace, topic_ids: Vec<String>) {
  let mut w = ws.lock().await;
  let topics = restrict_to_available(&topic_ids, &w.config.selected_chapters, &state.catalog);
  if topics.len() != topic_ids.len() {
    warn!(target: "exam", requested = topic_ids.len(), kept = topics.len(), "Dropped topics outside the selected chapters");
  }
  w.config.selected_topics = topics;
}

/// Check and decode an upload. Rejections leave the workspace untouched.
pub fn decode_upload(file: &FileIn) -> Result<UploadedFile, UploadError> {
  let is_pdf_name = file.file_name.to_lowercase().ends_with(".pdf");
  let mime = match file.mime_type.as_str() {
    PDF_MIME => PDF_MIME,
    "" | "application/octet-stream" if is_pdf_name => PDF_MIME,
    _ => return Err(UploadError::NotPdf),
  };

  // Data URLs carry a "data:...;base64," prefix.
  let data = file.data_base64.split_once(',').map(|(_, d)| d).unwrap_or(&file.data_base64).trim();
  if data.len() / 4 * 3 > MAX_UPLOAD_BYTES + 3 {
    return Err(UploadError::TooLarge);
  }
  let bytes = base64::engine::general_purpose::STANDARD
    .decode(data)
    .map_err(|_| UploadError::InvalidBase64)?;
  if bytes.len() > MAX_UPLOAD_BYTES {
    return Err(UploadError::TooLarge);
  }
  Ok(UploadedFile { name: file.file_name.clone(), mime_type: mime.to_string(), bytes })
}

#[instrument(level = "info", skip(ws, file), fields(file_name = %file.file_name, data_len = file.data_base64.len()))]
pub async fn upload_file(ws: &SharedWorkspace, file: &FileIn) -> Result<(), UploadError> {
  let uploaded = decode_upload(file).map_err(|e| {
    warn!(target: "exam", error = %e, "Upload rejected");
    e
  })?;
  info!(target: "exam", size = uploaded.bytes.len(), "Sample exam uploaded");
  ws.lock().await.config.uploaded_file = Some(uploaded);
  Ok(())
}

pub async fn remove_file(ws: &SharedWorkspace) {
  ws.lock().await.config.uploaded_file = None;
}

// -------- Generation --------

/// Run one generation for the workspace. Validation errors and a generation
/// already in flight are returned as errors; remote failures are not: they
/// yield the alert plus the single placeholder question.
#[instrument(level = "info", skip(state, ws))]
pub async fn generate_exam(state: &AppState, ws: &SharedWorkspace) -> Result<GenerateOut, GenerateError> {
  let request = {
    let mut w = ws.lock().await;
    let built = request::build(&w.config, &state.catalog, &state.prompts);
    if let Err(e) = &built {
      warn!(target: "exam", error = ?e, "Generation rejected before dispatch");
    }
    let built = built?;
    if w.loading {
      return Err(GenerateError::InProgress);
    }
    match built {
      None => {
        info!(target: "exam", "Zero questions requested; nothing to generate");
        w.questions.clear();
        w.show_answers = false;
        reopen_chat(state, &mut w);
        return Ok(GenerateOut { questions: Vec::new(), alert: None });
      }
      Some(r) => {
        w.loading = true;
        w.questions.clear();
        w.show_answers = false;
        r
      }
    }
  };

  // The call runs detached so a dropped caller still clears `loading`.
  let task = {
    let state = state.clone();
    let ws = ws.clone();
    tokio::spawn(async move { finish_generation(&state, &ws, request).await })
  };
  match task.await {
    Ok(out) => Ok(out),
    Err(e) => {
      error!(target: "exam", error = %e, "Generation task aborted");
      let mut w = ws.lock().await;
      w.questions = vec![failure_placeholder(&e.to_string())];
      w.loading = false;
      reopen_chat(state, &mut w);
      Ok(GenerateOut { questions: w.questions.clone(), alert: Some(GENERATION_ALERT.to_string()) })
    }
  }
}

async fn finish_generation(state: &AppState, ws: &SharedWorkspace, request: request::ExamRequest) -> GenerateOut {
  let start = std::time::Instant::now();
  let result: Result<Vec<Question>, String> = match &state.model {
    Some(model) => match model.generate(&request).await {
      Ok(raw) => decode(&raw).map_err(|e| ModelError::Decode(e.to_string()).to_string()),
      Err(e) => Err(e.to_string()),
    },
    None => Err(ModelError::NotConfigured.to_string()),
  };

  let (questions, alert) = match result {
    Ok(qs) => {
      info!(target: "exam", count = qs.len(), elapsed = ?start.elapsed(), "Exam generated");
      (qs, None)
    }
    Err(cause) => {
      error!(target: "exam", error = %cause, elapsed = ?start.elapsed(), "Exam generation failed; using placeholder");
      (vec![failure_placeholder(&cause)], Some(GENERATION_ALERT.to_string()))
    }
  };

  let mut w = ws.lock().await;
  w.questions = questions;
  w.loading = false;
  reopen_chat(state, &mut w);
  GenerateOut { questions: w.questions.clone(), alert }
}

/// New chat context from the current Question Set, plus the one-time notice.
fn reopen_chat(state: &AppState, w: &mut Workspace) {
  w.chat_handle = state
    .model
    .as_ref()
    .map(|m| m.open_chat(system_context(&w.questions, &state.prompts)));
  if w.chat.seed_from_exam(w.questions.len()) {
    info!(target: "chat", workspace = %w.id, count = w.questions.len(), "Chat seeded with exam notice");
  }
}

// -------- Views --------

pub async fn set_show_answers(ws: &SharedWorkspace, show: bool) {
  ws.lock().await.show_answers = show;
}

pub async fn exam_view(ws: &SharedWorkspace, show_answers: Option<bool>) -> ExamOut {
  let w = ws.lock().await;
  let show = show_answers.unwrap_or(w.show_answers);
  ExamOut { show_answers: show, sections: project(&w.questions, show) }
}

pub async fn print_page(state: &AppState, ws: &SharedWorkspace) -> String {
  let w = ws.lock().await;
  print_html(&w.questions, &state.paper)
}

pub async fn export_word(state: &AppState, ws: &SharedWorkspace) -> Option<Vec<u8>> {
  let w = ws.lock().await;
  let doc = export_doc(&w.questions, &state.paper);
  if let Some(bytes) = &doc {
    info!(target: "exam", size = bytes.len(), questions = w.questions.len(), "Word export built");
  }
  doc
}

// -------- Chat --------

#[derive(Debug, Clone)]
pub enum ChatEvent {
  Started(Turn),
  Chunk { id: String, text: String },
  Done(ChatMessage),
}

/// One chat turn as a stream of events. Yields nothing when the text is blank
/// or a turn is already streaming for this workspace.
///
/// The turn itself runs in its own task; dropping the returned stream stops
/// the events but the turn still completes (or fails) in the workspace.
pub fn chat_send(state: &AppState, ws: SharedWorkspace, text: String) -> BoxStream<'static, ChatEvent> {
  let (tx, mut rx) = mpsc::unbounded_channel();
  tokio::spawn(run_chat_turn(state.model.clone(), state.prompts.clone(), ws, text, tx));

  let s = stream! {
    while let Some(ev) = rx.recv().await {
      yield ev;
    }
  };
  s.boxed()
}

async fn run_chat_turn(
  model: Option<Arc<dyn ExamModel>>,
  prompts: Prompts,
  ws: SharedWorkspace,
  text: String,
  tx: mpsc::UnboundedSender<ChatEvent>,
) {
  let (turn, handle) = {
    let mut w = ws.lock().await;
    let Some(turn) = w.chat.begin_send(&text) else {
      return;
    };
    if w.chat_handle.is_none() {
      w.chat_handle = model.as_ref().map(|m| m.open_chat(system_context(&w.questions, &prompts)));
    }
    (turn, w.chat_handle.clone())
  };
  info!(target: "chat", text_len = turn.user.text.len(), "Chat turn started");
  let id = turn.placeholder_id.clone();
  let user_text = turn.user.text.clone();
  // Send errors only mean the listener went away; the turn carries on.
  let _ = tx.send(ChatEvent::Started(turn));

  let mut failed = handle.is_none();
  if let Some(handle) = handle {
    let mut chunks = handle.send(user_text);
    while let Some(item) = chunks.next().await {
      match item {
        Ok(text) => {
          ws.lock().await.chat.push_chunk(&id, &text);
          let _ = tx.send(ChatEvent::Chunk { id: id.clone(), text });
        }
        Err(e) => {
          error!(target: "chat", error = %e, "Chat turn failed");
          failed = true;
          break;
        }
      }
    }
  } else {
    let e = ModelError::NotConfigured;
    error!(target: "chat", error = %e, "Chat turn failed");
  }

  let done = {
    let mut w = ws.lock().await;
    if failed { w.chat.fail(&id) } else { w.chat.complete(&id) }
  };
  if let Some(message) = done {
    let _ = tx.send(ChatEvent::Done(message));
  }
}

/// Clear the chat and start a new conversation on the current Question Set.
#[instrument(level = "info", skip(state, ws))]
pub async fn chat_reset(state: &AppState, ws: &SharedWorkspace) -> Vec<ChatMessage> {
  let mut w = ws.lock().await;
  w.chat.reset();
  w.chat_handle = state
    .model
    .as_ref()
    .map(|m| m.open_chat(system_context(&w.questions, &state.prompts)));
  w.chat.messages().to_vec()
}
