//! Chat session state machine: message history plus the Idle → Sending →
//! Streaming → Idle cycle of one assistant turn.
//!
//! The session never talks to the model itself; callers feed it chunks from a
//! `ChatHandle` stream. Failures become a regular assistant message.

use serde::Serialize;
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{ChatMessage, ChatRole, Question};

pub const WELCOME_TEXT: &str = "Xin chào! Thầy là trợ lý AI Toán học. Em cần thầy giúp gì về đề thi này không?";
pub const RESET_TEXT: &str = "Đã xóa lịch sử trò chuyện.";
pub const FAILURE_TEXT: &str = "Xin lỗi, có lỗi xảy ra khi kết nối. Em vui lòng thử lại.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
  Idle,
  Sending,
  Streaming,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
  messages: Vec<ChatMessage>,
  status: ChatStatus,
  pending: Option<String>,
}

/// What `begin_send` accepted: the user text to forward and the placeholder id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
  pub user: ChatMessage,
  pub placeholder_id: String,
}

fn assistant(id: String, text: &str, is_streaming: bool) -> ChatMessage {
  ChatMessage { id, role: ChatRole::Assistant, text: text.to_string(), is_streaming }
}

impl Default for ChatSession {
  fn default() -> Self {
    Self::new()
  }
}

impl ChatSession {
  pub fn new() -> Self {
    Self { messages: vec![assistant("welcome".into(), WELCOME_TEXT, false)], status: ChatStatus::Idle, pending: None }
  }

  pub fn messages(&self) -> &[ChatMessage] {
    &self.messages
  }

  pub fn status(&self) -> ChatStatus {
    self.status
  }

  pub fn is_busy(&self) -> bool {
    self.status != ChatStatus::Idle
  }

  /// Idle → Sending. Appends the user message and an empty streaming
  /// placeholder. Blank text or a turn already in flight is a no-op.
  pub fn begin_send(&mut self, text: &str) -> Option<Turn> {
    let text = text.trim();
    if text.is_empty() || self.is_busy() {
      return None;
    }
    let user = ChatMessage { id: Uuid::new_v4().to_string(), role: ChatRole::User, text: text.to_string(), is_streaming: false };
    let placeholder_id = Uuid::new_v4().to_string();
    self.messages.push(user.clone());
    self.messages.push(assistant(placeholder_id.clone(), "", true));
    self.pending = Some(placeholder_id.clone());
    self.status = ChatStatus::Sending;
    Some(Turn { user, placeholder_id })
  }

  // Only the turn still pending may touch its placeholder; a reset in
  // between orphans the old turn.
  fn placeholder_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
    if self.pending.as_deref() != Some(id) {
      return None;
    }
    self.messages.iter_mut().rev().find(|m| m.id == id)
  }

  /// Sending/Streaming → Streaming. Appends in arrival order.
  pub fn push_chunk(&mut self, placeholder_id: &str, chunk: &str) {
    if let Some(m) = self.placeholder_mut(placeholder_id) {
      m.text.push_str(chunk);
      self.status = ChatStatus::Streaming;
    }
  }

  /// Turn finished: clear the streaming flag and go back to Idle.
  pub fn complete(&mut self, placeholder_id: &str) -> Option<ChatMessage> {
    let m = self.placeholder_mut(placeholder_id)?;
    m.is_streaming = false;
    let done = m.clone();
    self.pending = None;
    self.status = ChatStatus::Idle;
    Some(done)
  }

  /// Turn failed: the placeholder text becomes the fixed apology.
  pub fn fail(&mut self, placeholder_id: &str) -> Option<ChatMessage> {
    let m = self.placeholder_mut(placeholder_id)?;
    m.text = FAILURE_TEXT.to_string();
    self.complete(placeholder_id)
  }

  /// Drop the whole history, leaving one fresh notice.
  pub fn reset(&mut self) {
    self.messages = vec![assistant(Uuid::new_v4().to_string(), RESET_TEXT, false)];
    self.pending = None;
    self.status = ChatStatus::Idle;
  }

  /// When an exam arrives while the history holds only its opening message,
  /// that message becomes a notice about the new exam. Returns whether it did.
  pub fn seed_from_exam(&mut self, question_count: usize) -> bool {
    if question_count == 0 || self.messages.len() != 1 || self.is_busy() {
      return false;
    }
    self.messages = vec![assistant(
      "new-context".into(),
      &format!("Thầy đã nhận được dữ liệu đề thi gồm {question_count} câu. Em hãy hỏi về bất kỳ câu nào nhé!"),
      false,
    )];
    true
  }
}

/// System instruction for a chat opened on the current Question Set.
pub fn system_context(questions: &[Question], prompts: &Prompts) -> String {
  let mut ctx = prompts.chat_persona.clone();
  if questions.is_empty() {
    ctx.push('\n');
    ctx.push_str(&prompts.chat_no_exam);
    return ctx;
  }

  ctx.push_str("\n\n");
  ctx.push_str(&prompts.chat_exam_intro);
  ctx.push('\n');
  for (idx, q) in questions.iter().enumerate() {
    ctx.push_str(&format!("\n--- Câu {} ({}) ---\n", idx + 1, q.kind.label()));
    ctx.push_str(&format!("Nội dung: {}\n", q.content));
    if let Some(opts) = &q.options {
      ctx.push_str(&format!("Các đáp án: {}\n", opts.join(", ")));
    }
    if let Some(subs) = &q.sub_questions {
      ctx.push_str("Các ý đúng sai:\n");
      for s in subs {
        ctx.push_str(&format!(
          "- {}) {} -> {} ({})\n",
          s.id,
          s.content,
          s.is_correct,
          s.explanation.as_deref().unwrap_or("")
        ));
      }
    }
    if let Some(ans) = q.correct_answer.as_deref().filter(|a| !a.is_empty()) {
      ctx.push_str(&format!("Đáp án/Lời giải: {ans}\n"));
    }
  }
  ctx.push_str("\n\n");
  ctx.push_str(&prompts.chat_task);
  ctx
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuestionType;
  use crate::questions::tests::q;

  #[test]
  fn blank_send_is_noop() {
    let mut s = ChatSession::new();
    assert!(s.begin_send("").is_none());
    assert!(s.begin_send("   ").is_none());
    assert_eq!(s.messages().len(), 1);
    assert_eq!(s.status(), ChatStatus::Idle);
  }

  #[test]
  fn streaming_turn_appends_chunks_in_order() {
    let mut s = ChatSession::new();
    let turn = s.begin_send("  Câu 1 làm sao?  ").unwrap();
    let id = turn.placeholder_id.as_str();
    assert_eq!(turn.user.text, "Câu 1 làm sao?");
    assert_eq!(s.status(), ChatStatus::Sending);
    assert_eq!(s.messages().len(), 3);
    assert!(s.messages()[2].is_streaming);

    // A second send while busy is ignored.
    assert!(s.begin_send("nữa").is_none());

    s.push_chunk(id, "Em ");
    assert_eq!(s.status(), ChatStatus::Streaming);
    s.push_chunk(id, "thử ");
    s.push_chunk(id, "Em ");
    let done = s.complete(id).unwrap();
    assert_eq!(done.text, "Em thử Em ");
    assert!(!done.is_streaming);
    assert_eq!(s.status(), ChatStatus::Idle);
  }

  #[test]
  fn failure_replaces_partial_text_and_keeps_history() {
    let mut s = ChatSession::new();
    let a = s.begin_send("a").unwrap();
    s.complete(&a.placeholder_id);
    let b = s.begin_send("b").unwrap();
    s.push_chunk(&b.placeholder_id, "partial");
    let msg = s.fail(&b.placeholder_id).unwrap();
    assert_eq!(msg.text, FAILURE_TEXT);
    assert_eq!(s.messages().len(), 5);
    assert_eq!(s.messages()[1].text, "a");
    assert_eq!(s.status(), ChatStatus::Idle);
  }

  #[test]
  fn reset_leaves_exactly_one_message() {
    let mut s = ChatSession::new();
    let turn = s.begin_send("x").unwrap();
    s.push_chunk(&turn.placeholder_id, "y");
    s.reset();
    assert_eq!(s.messages().len(), 1);
    assert_eq!(s.messages()[0].text, RESET_TEXT);
    assert_eq!(s.status(), ChatStatus::Idle);

    // The orphaned turn can no longer write into the history.
    s.push_chunk(&turn.placeholder_id, "late");
    assert!(s.complete(&turn.placeholder_id).is_none());
    s.reset();
    assert_eq!(s.messages().len(), 1);
  }

  #[test]
  fn seeding_only_while_history_is_untouched() {
    let mut s = ChatSession::new();
    assert!(!s.seed_from_exam(0));
    assert!(s.seed_from_exam(22));
    assert!(s.messages()[0].text.contains("gồm 22 câu"));

    let turn = s.begin_send("hỏi").unwrap();
    s.complete(&turn.placeholder_id);
    assert!(!s.seed_from_exam(10));
    assert_eq!(s.messages().len(), 3);
  }

  #[test]
  fn context_lists_questions_with_global_numbers() {
    let qs = vec![q("m", QuestionType::MultipleChoice), q("t", QuestionType::TrueFalse)];
    let ctx = system_context(&qs, &Prompts::default());
    assert!(ctx.contains("--- Câu 1 (Trắc nghiệm nhiều lựa chọn) ---"));
    assert!(ctx.contains("--- Câu 2 (Trắc nghiệm đúng sai) ---"));
    assert!(ctx.contains("Các đáp án: $1$, $2$, $3$, $4$"));
    assert!(ctx.contains("- a) Ý a -> true (Vì a)"));
    assert!(ctx.contains("NHIỆM VỤ CỦA BẠN"));

    let empty = system_context(&[], &Prompts::default());
    assert!(empty.contains("chưa có đề thi"));
  }
}
