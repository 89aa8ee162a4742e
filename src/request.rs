//! Exam request builder: configuration → instruction text + response schema
//! (+ the uploaded PDF as an inline attachment).
//!
//! Validation fails fast and no request is produced on error. A configuration
//! asking for zero questions yields `Ok(None)`: nothing to send.

use serde_json::{json, Value};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::config::Prompts;
use crate::domain::{ExamConfig, ExamMode, QuestionType};
use crate::util::fill_template;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
  #[error("Vui lòng upload file đề mẫu (PDF) để AI có thể tạo đề tương tự.")]
  MissingFile,
  #[error("Vui lòng chọn ít nhất một chương hoặc bài học để tạo đề.")]
  NoTopicsSelected,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
  pub mime_type: String,
  pub bytes: Vec<u8>,
}

/// Everything the generation service needs for one call.
#[derive(Clone, Debug, PartialEq)]
pub struct ExamRequest {
  pub instruction: String,
  pub attachment: Option<Attachment>,
  pub schema: Value,
}

pub fn validate(config: &ExamConfig) -> Result<(), ValidationError> {
  match config.mode {
    ExamMode::File if config.uploaded_file.is_none() => Err(ValidationError::MissingFile),
    ExamMode::Curriculum if config.selected_topics.is_empty() => Err(ValidationError::NoTopicsSelected),
    _ => Ok(()),
  }
}

pub fn build(config: &ExamConfig, catalog: &Catalog, prompts: &Prompts) -> Result<Option<ExamRequest>, ValidationError> {
  validate(config)?;
  if config.total_questions() == 0 {
    return Ok(None);
  }

  let (context, attachment) = match config.mode {
    ExamMode::File => {
      let attachment = config
        .uploaded_file
        .as_ref()
        .map(|f| Attachment { mime_type: f.mime_type.clone(), bytes: f.bytes.clone() });
      (prompts.file_context.clone(), attachment)
    }
    ExamMode::Curriculum => {
      let labels = catalog.topic_labels(&config.selected_topics);
      if labels.is_empty() {
        // Selected ids that the catalog does not know.
        return Err(ValidationError::NoTopicsSelected);
      }
      let lines = labels.iter().map(|l| format!("- {l}")).collect::<Vec<_>>().join("\n");
      (fill_template(&prompts.curriculum_context, &[("topics", &lines)]), None)
    }
  };

  let instruction = fill_template(
    &prompts.exam_user_template,
    &[
      ("context", &context),
      ("difficulty", config.difficulty.label()),
      ("num_mc", &config.num_mc.to_string()),
      ("num_tf", &config.num_tf.to_string()),
      ("num_short", &config.num_short.to_string()),
      ("num_essay", &config.num_essay.to_string()),
    ],
  );

  Ok(Some(ExamRequest { instruction, attachment, schema: output_schema() }))
}

/// Response schema in the service's OpenAPI subset: an array of questions.
pub fn output_schema() -> Value {
  let sub_question = json!({
    "type": "OBJECT",
    "properties": {
      "id": { "type": "STRING", "description": "a, b, c, or d" },
      "content": { "type": "STRING", "description": "Nội dung ý nhỏ" },
      "isCorrect": { "type": "BOOLEAN", "description": "True nếu mệnh đề đúng, False nếu sai" },
      "explanation": { "type": "STRING", "description": "Giải thích ngắn gọn" }
    },
    "required": ["id", "content", "isCorrect"]
  });

  let kinds: Vec<&str> = QuestionType::ORDER.iter().map(|k| k.label()).collect();
  let question = json!({
    "type": "OBJECT",
    "properties": {
      "id": { "type": "STRING" },
      "type": { "type": "STRING", "enum": kinds },
      "content": { "type": "STRING" },
      "options": {
        "type": "ARRAY",
        "items": { "type": "STRING" },
        "description": "Chỉ dành cho Trắc nghiệm nhiều lựa chọn (4 đáp án)"
      },
      "subQuestions": {
        "type": "ARRAY",
        "items": sub_question,
        "description": "Chỉ dành cho Trắc nghiệm Đúng/Sai (4 ý)"
      },
      "correctAnswer": { "type": "STRING", "description": "Đáp án đúng hoặc lời giải chi tiết" },
      "points": { "type": "NUMBER" }
    },
    "required": ["id", "type", "content", "points"]
  });

  json!({ "type": "ARRAY", "items": question })
}
