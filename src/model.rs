//! Seam to the hosted generation service.
//!
//! `ExamModel` produces raw structured text for an exam request and opens chat
//! sessions; `ChatHandle` is the opaque per-session conversation the chat state
//! machine talks to. The Gemini client implements both; tests use `FakeModel`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::request::ExamRequest;

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("generation service is not configured (missing GEMINI_API_KEY)")]
  NotConfigured,
  #[error("model HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("transport error: {0}")]
  Transport(String),
  #[error("no response text from model")]
  EmptyResponse,
  #[error("could not decode model response: {0}")]
  Decode(String),
}

impl From<reqwest::Error> for ModelError {
  fn from(e: reqwest::Error) -> Self {
    ModelError::Transport(e.to_string())
  }
}

#[async_trait]
pub trait ExamModel: Send + Sync {
  /// Model name for logs.
  fn name(&self) -> &str;

  /// One structured generation call. Returns the raw JSON text.
  async fn generate(&self, request: &ExamRequest) -> Result<String, ModelError>;

  /// Start a conversation seeded with `system_context`.
  fn open_chat(&self, system_context: String) -> Arc<dyn ChatHandle>;
}

pub trait ChatHandle: Send + Sync {
  /// Send one user turn. The stream yields text fragments in arrival order
  /// and ends when the turn completes.
  fn send(&self, text: String) -> BoxStream<'static, Result<String, ModelError>>;
}
