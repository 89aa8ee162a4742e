//! Minimal Gemini REST client for our use-cases.
//!
//! Two calls: `:generateContent` with a JSON response schema (exam generation,
//! optional inline PDF) and `:streamGenerateContent?alt=sse` for chat turns.
//! Calls are instrumented and log model names, latencies and sizes (not contents).
//!
//! NOTE: We never log the API key or the uploaded file.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use base64::Engine;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::model::{ChatHandle, ExamModel, ModelError};
use crate::request::ExamRequest;
use crate::util::trunc_for_log;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY (or API_KEY); otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").or_else(|_| std::env::var("API_KEY")).ok()?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into());
    let timeout = std::env::var("GEMINI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(120);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model })
  }

  fn url(&self, method: &str) -> String {
    format!("{}/models/{}:{}", self.base_url, self.model, method)
  }
}

#[async_trait]
impl ExamModel for Gemini {
  fn name(&self) -> &str {
    &self.model
  }

  #[instrument(level = "info", skip(self, request), fields(model = %self.model, instr_len = request.instruction.len(), has_file = request.attachment.is_some()))]
  async fn generate(&self, request: &ExamRequest) -> Result<String, ModelError> {
    let mut parts = Vec::new();
    if let Some(att) = &request.attachment {
      parts.push(Part::inline(&att.mime_type, &att.bytes));
    }
    parts.push(Part::text(&request.instruction));

    let body = GenerateRequest {
      system_instruction: None,
      contents: vec![Content { role: "user".into(), parts }],
      generation_config: Some(GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: request.schema.clone(),
      }),
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(self.url("generateContent"))
      .header(USER_AGENT, "mathgen9-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.api_key)
      .json(&body)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      error!(elapsed = ?start.elapsed(), status = %status, "Gemini generateContent failed");
      return Err(ModelError::Http { status: status.as_u16(), message });
    }

    let body: GenerateResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let text = body.text();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");
    if text.trim().is_empty() {
      return Err(ModelError::EmptyResponse);
    }
    Ok(text)
  }

  fn open_chat(&self, system_context: String) -> Arc<dyn ChatHandle> {
    Arc::new(GeminiChat {
      gemini: self.clone(),
      system: system_context,
      history: Arc::new(Mutex::new(Vec::new())),
    })
  }
}

/// One conversation. The REST API is stateless, so the handle keeps the turns.
pub struct GeminiChat {
  gemini: Gemini,
  system: String,
  history: Arc<Mutex<Vec<Content>>>,
}

impl ChatHandle for GeminiChat {
  fn send(&self, text: String) -> BoxStream<'static, Result<String, ModelError>> {
    let gemini = self.gemini.clone();
    let system = self.system.clone();
    let history = self.history.clone();

    let s = stream! {
      let user = Content { role: "user".into(), parts: vec![Part::text(&text)] };
      let mut contents = history.lock().await.clone();
      contents.push(user.clone());

      let body = GenerateRequest {
        system_instruction: Some(SystemInstruction { parts: vec![Part::text(&system)] }),
        contents,
        generation_config: None,
      };

      let start = std::time::Instant::now();
      let res = match gemini
        .client
        .post(format!("{}?alt=sse", gemini.url("streamGenerateContent")))
        .header(USER_AGENT, "mathgen9-backend/0.1")
        .header(CONTENT_TYPE, "application/json")
        .header(API_KEY_HEADER, &gemini.api_key)
        .json(&body)
        .send()
        .await
      {
        Ok(r) => r,
        Err(e) => {
          yield Err(ModelError::from(e));
          return;
        }
      };

      if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        let message = extract_gemini_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
        yield Err(ModelError::Http { status: status.as_u16(), message });
        return;
      }

      let mut bytes = res.bytes_stream();
      // Raw bytes: a multi-byte character may straddle two network chunks.
      let mut buf: Vec<u8> = Vec::new();
      let mut full = String::new();
      while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
          Ok(c) => c,
          Err(e) => {
            yield Err(ModelError::from(e));
            return;
          }
        };
        buf.extend_from_slice(&chunk);
        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
          let line: Vec<u8> = buf.drain(..=pos).collect();
          match parse_sse_line(&String::from_utf8_lossy(&line)) {
            Ok(Some(text)) => {
              full.push_str(&text);
              yield Ok(text);
            }
            Ok(None) => {}
            Err(e) => {
              yield Err(e);
              return;
            }
          }
        }
      }
      if let Ok(Some(text)) = parse_sse_line(&String::from_utf8_lossy(&buf)) {
        full.push_str(&text);
        yield Ok(text);
      }

      info!(target: "chat", elapsed = ?start.elapsed(), reply_len = full.len(), "Chat turn streamed");
      let mut h = history.lock().await;
      h.push(user);
      h.push(Content { role: "model".into(), parts: vec![Part::text(&full)] });
    };
    s.boxed()
  }
}

/// Text carried by one `data:` line, if any.
fn parse_sse_line(line: &str) -> Result<Option<String>, ModelError> {
  let line = line.trim();
  let Some(json) = line.strip_prefix("data:") else { return Ok(None) };
  let json = json.trim();
  if json.is_empty() || json == "[DONE]" {
    return Ok(None);
  }
  match serde_json::from_str::<GenerateResponse>(json) {
    Ok(r) => {
      let text = r.text();
      Ok(if text.is_empty() { None } else { Some(text) })
    }
    Err(e) => {
      if let Some(message) = extract_gemini_error(json) {
        return Err(ModelError::Http { status: 500, message });
      }
      warn!(target: "chat", error = %e, "Skipping undecodable SSE line");
      Ok(None)
    }
  }
}

// --- REST DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<SystemInstruction>,
  contents: Vec<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct SystemInstruction {
  parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  response_mime_type: String,
  response_schema: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Content {
  #[serde(default)]
  role: String,
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  inline_data: Option<InlineData>,
}

impl Part {
  fn text(s: &str) -> Self {
    Part { text: Some(s.to_string()), inline_data: None }
  }

  fn inline(mime_type: &str, bytes: &[u8]) -> Self {
    Part {
      text: None,
      inline_data: Some(InlineData {
        mime_type: mime_type.to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
      }),
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
  mime_type: String,
  data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}

impl GenerateResponse {
  fn text(&self) -> String {
    self
      .candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<String>())
      .unwrap_or_default()
  }
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)]
  prompt_token_count: Option<u32>,
  #[serde(default)]
  candidates_token_count: Option<u32>,
  #[serde(default)]
  total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sse_line_yields_candidate_text() {
    let line = r#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"Chào "},{"text":"em"}]}}]}"#;
    assert_eq!(parse_sse_line(line).unwrap(), Some("Chào em".into()));
    assert_eq!(parse_sse_line(": keep-alive").unwrap(), None);
    assert_eq!(parse_sse_line("data: [DONE]").unwrap(), None);
    assert_eq!(parse_sse_line("").unwrap(), None);
  }

  #[test]
  fn sse_error_payload_is_an_error() {
    let line = r#"data: {"error":{"code":429,"message":"quota"}}"#;
    assert!(matches!(parse_sse_line(line), Err(ModelError::Http { .. })));
  }

  #[test]
  fn request_body_uses_camel_case_and_inline_data() {
    let body = GenerateRequest {
      system_instruction: None,
      contents: vec![Content { role: "user".into(), parts: vec![Part::inline("application/pdf", b"abc"), Part::text("hi")] }],
      generation_config: Some(GenerationConfig { response_mime_type: "application/json".into(), response_schema: serde_json::json!({"type": "ARRAY"}) }),
    };
    let v = serde_json::to_value(&body).unwrap();
    assert_eq!(v["contents"][0]["parts"][0]["inlineData"]["data"], "YWJj");
    assert_eq!(v["contents"][0]["parts"][0]["inlineData"]["mimeType"], "application/pdf");
    assert_eq!(v["contents"][0]["parts"][1]["text"], "hi");
    assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
    assert!(v.get("systemInstruction").is_none());
  }

  #[test]
  fn error_body_extraction() {
    assert_eq!(extract_gemini_error(r#"{"error":{"code":400,"message":"API key not valid"}}"#), Some("API key not valid".into()));
    assert_eq!(extract_gemini_error("<html>"), None);
  }
}
