//! Domain models: curriculum, exam configuration, questions and chat messages.

use serde::{Deserialize, Serialize};

/// One curriculum topic. Owned by exactly one chapter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
  pub id: String,
  pub name: String,
}

/// A chapter and its topics, in textbook order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
  pub id: String,
  pub name: String,
  pub topics: Vec<Topic>,
}

/// What drives generation: an uploaded sample exam or the curriculum picker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExamMode {
  #[default]
  File,
  Curriculum,
}

/// Overall difficulty, following the four Vietnamese assessment levels.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
  Expert,
}

impl Difficulty {
  /// Label used inside prompts.
  pub fn label(self) -> &'static str {
    match self {
      Difficulty::Easy => "Nhận biết",
      Difficulty::Medium => "Thông hiểu",
      Difficulty::Hard => "Vận dụng",
      Difficulty::Expert => "Vận dụng cao",
    }
  }
}

/// The four exam parts. The wire value is the Vietnamese label the model is
/// constrained to; snake_case names are accepted on input as well.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QuestionType {
  #[serde(rename = "Trắc nghiệm nhiều lựa chọn", alias = "multiple_choice")]
  MultipleChoice,
  #[serde(rename = "Trắc nghiệm đúng sai", alias = "true_false")]
  TrueFalse,
  #[serde(rename = "Trả lời ngắn", alias = "short_answer")]
  ShortAnswer,
  #[serde(rename = "Tự luận", alias = "essay")]
  Essay,
}

impl QuestionType {
  /// Fixed section order on screen, in print and in the export.
  pub const ORDER: [QuestionType; 4] = [
    QuestionType::MultipleChoice,
    QuestionType::TrueFalse,
    QuestionType::ShortAnswer,
    QuestionType::Essay,
  ];

  pub fn label(self) -> &'static str {
    match self {
      QuestionType::MultipleChoice => "Trắc nghiệm nhiều lựa chọn",
      QuestionType::TrueFalse => "Trắc nghiệm đúng sai",
      QuestionType::ShortAnswer => "Trả lời ngắn",
      QuestionType::Essay => "Tự luận",
    }
  }
}

/// One a/b/c/d statement of a true/false question.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubQuestion {
  pub id: String,
  pub content: String,
  pub is_correct: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

/// A generated exam question. `options` is only set for multiple choice,
/// `sub_questions` only for true/false.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: QuestionType,
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sub_questions: Option<Vec<SubQuestion>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub correct_answer: Option<String>,
  pub points: f64,
}

/// Raw bytes of the uploaded sample exam.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
  pub name: String,
  pub mime_type: String,
  pub bytes: Vec<u8>,
}

/// Exam generation parameters for one workspace. Ephemeral, never persisted.
#[derive(Clone, Debug, Default)]
pub struct ExamConfig {
  pub mode: ExamMode,
  pub num_mc: u32,
  pub num_tf: u32,
  pub num_short: u32,
  pub num_essay: u32,
  pub difficulty: Difficulty,
  pub uploaded_file: Option<UploadedFile>,
  pub selected_chapters: Vec<String>,
  pub selected_topics: Vec<String>,
}

pub const MAX_MC: u32 = 50;
pub const MAX_TF: u32 = 10;
pub const MAX_SHORT: u32 = 20;
pub const MAX_ESSAY: u32 = 10;

impl ExamConfig {
  /// Session-start defaults: file mode, 12/2/4/4, medium.
  pub fn initial() -> Self {
    Self { num_mc: 12, num_tf: 2, num_short: 4, num_essay: 4, ..Default::default() }
  }

  pub fn total_questions(&self) -> u32 {
    self.num_mc + self.num_tf + self.num_short + self.num_essay
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
  User,
  Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
  pub id: String,
  pub role: ChatRole,
  pub text: String,
  pub is_streaming: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn question_type_accepts_label_and_alias() {
    let a: QuestionType = serde_json::from_str("\"Tự luận\"").unwrap();
    let b: QuestionType = serde_json::from_str("\"essay\"").unwrap();
    assert_eq!(a, QuestionType::Essay);
    assert_eq!(b, QuestionType::Essay);
    assert_eq!(serde_json::to_string(&QuestionType::TrueFalse).unwrap(), "\"Trắc nghiệm đúng sai\"");
  }

  #[test]
  fn initial_config_matches_form_defaults() {
    let cfg = ExamConfig::initial();
    assert_eq!(cfg.mode, ExamMode::File);
    assert_eq!(cfg.difficulty, Difficulty::Medium);
    assert_eq!(cfg.total_questions(), 22);
    assert!(cfg.uploaded_file.is_none());
  }
}
