//! Question Set: fail-closed decode of model output, the failure placeholder,
//! and the per-type partition shared by the screen, print and export surfaces.

use thiserror::Error;

use crate::domain::{Question, QuestionType};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
  #[error("response is not a JSON list of questions: {0}")]
  Json(String),
  #[error("question {id}: {reason}")]
  Shape { id: String, reason: String },
}

fn shape(q: &Question, reason: impl Into<String>) -> DecodeError {
  DecodeError::Shape { id: q.id.clone(), reason: reason.into() }
}

/// Parse raw model text into a Question Set, rejecting anything that does
/// not fit the question shape for its type.
pub fn decode(raw: &str) -> Result<Vec<Question>, DecodeError> {
  let text = strip_code_fence(raw.trim());
  let mut questions: Vec<Question> = serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
  for q in &mut questions {
    normalize(q);
    check(q)?;
  }
  Ok(questions)
}

// Some responses still arrive wrapped in ```json fences.
fn strip_code_fence(s: &str) -> &str {
  let Some(rest) = s.strip_prefix("```") else { return s };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn normalize(q: &mut Question) {
  if q.options.as_ref().is_some_and(|o| o.is_empty()) {
    q.options = None;
  }
  if q.sub_questions.as_ref().is_some_and(|s| s.is_empty()) {
    q.sub_questions = None;
  }
  // "a)" and " b " become the bare letter.
  for s in q.sub_questions.iter_mut().flatten() {
    s.id = s.id.trim().trim_end_matches(')').trim().to_string();
  }
}

fn check(q: &Question) -> Result<(), DecodeError> {
  if !q.points.is_finite() || q.points < 0.0 {
    return Err(shape(q, format!("invalid points {}", q.points)));
  }
  match q.kind {
    QuestionType::MultipleChoice => {
      if q.sub_questions.is_some() {
        return Err(shape(q, "multiple choice must not carry sub-questions"));
      }
      match &q.options {
        Some(o) if o.len() == 4 => {}
        Some(o) => return Err(shape(q, format!("expected 4 options, got {}", o.len()))),
        None => return Err(shape(q, "multiple choice without options")),
      }
    }
    QuestionType::TrueFalse => {
      if q.options.is_some() {
        return Err(shape(q, "true/false must not carry options"));
      }
      let subs = q.sub_questions.as_ref().ok_or_else(|| shape(q, "true/false without sub-questions"))?;
      if subs.len() > 4 {
        return Err(shape(q, format!("expected at most 4 sub-questions, got {}", subs.len())));
      }
      let mut seen: Vec<&str> = Vec::new();
      for s in subs {
        let id = s.id.as_str();
        if !matches!(id, "a" | "b" | "c" | "d") || seen.contains(&id) {
          return Err(shape(q, format!("bad sub-question id '{}'", s.id)));
        }
        seen.push(id);
      }
    }
    QuestionType::ShortAnswer | QuestionType::Essay => {
      if q.options.is_some() || q.sub_questions.is_some() {
        return Err(shape(q, "short answer and essay carry neither options nor sub-questions"));
      }
    }
  }
  Ok(())
}

/// Single essay question standing in for a failed generation.
pub fn failure_placeholder(cause: &str) -> Question {
  Question {
    id: "error-1".into(),
    kind: QuestionType::Essay,
    content: format!("Có lỗi xảy ra khi kết nối API hoặc xử lý. Vui lòng thử lại. Lỗi: {cause}"),
    options: None,
    sub_questions: None,
    correct_answer: Some(String::new()),
    points: 0.0,
  }
}

/// A question together with its 1-based number inside its partition.
#[derive(Debug, Clone, Copy)]
pub struct Numbered<'a> {
  pub number: usize,
  pub question: &'a Question,
}

#[derive(Debug, Clone)]
pub struct Partition<'a> {
  pub kind: QuestionType,
  pub items: Vec<Numbered<'a>>,
}

/// Split by type in the fixed MC, TF, short, essay order. Relative order is
/// kept, numbering restarts at 1 per partition and empty partitions are left out.
pub fn partition(questions: &[Question]) -> Vec<Partition<'_>> {
  QuestionType::ORDER
    .iter()
    .filter_map(|&kind| {
      let items: Vec<Numbered<'_>> = questions
        .iter()
        .filter(|q| q.kind == kind)
        .enumerate()
        .map(|(i, q)| Numbered { number: i + 1, question: q })
        .collect();
      if items.is_empty() { None } else { Some(Partition { kind, items }) }
    })
    .collect()
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::domain::SubQuestion;

  pub fn q(id: &str, kind: QuestionType) -> Question {
    let (options, sub_questions) = match kind {
      QuestionType::MultipleChoice => (Some(vec!["$1$".into(), "$2$".into(), "$3$".into(), "$4$".into()]), None),
      QuestionType::TrueFalse => (
        None,
        Some(
          ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, l)| SubQuestion {
              id: l.to_string(),
              content: format!("Ý {l}"),
              is_correct: i % 2 == 0,
              explanation: Some(format!("Vì {l}")),
            })
            .collect(),
        ),
      ),
      _ => (None, None),
    };
    Question {
      id: id.into(),
      kind,
      content: format!("Nội dung {id}"),
      options,
      sub_questions,
      correct_answer: Some(format!("Đáp án {id}")),
      points: 0.25,
    }
  }

  #[test]
  fn decodes_well_formed_list() {
    let raw = r#"[
      {"id":"1","type":"Trắc nghiệm nhiều lựa chọn","content":"$x^2=4$","options":["2","-2","±2","4"],"subQuestions":[],"correctAnswer":"C","points":0.25},
      {"id":"2","type":"Trắc nghiệm đúng sai","content":"Cho hàm số","subQuestions":[{"id":"a","content":"..","isCorrect":true},{"id":"b","content":"..","isCorrect":false}],"points":1},
      {"id":"3","type":"Tự luận","content":"Giải phương trình","options":[],"points":1.5}
    ]"#;
    let qs = decode(raw).unwrap();
    assert_eq!(qs.len(), 3);
    assert!(qs[0].sub_questions.is_none());
    assert!(qs[2].options.is_none());
    assert_eq!(qs[1].sub_questions.as_ref().unwrap()[1].is_correct, false);
  }

  #[test]
  fn accepts_fenced_json() {
    let raw = "```json\n[{\"id\":\"1\",\"type\":\"Trả lời ngắn\",\"content\":\"1+1\",\"points\":0.5}]\n```";
    assert_eq!(decode(raw).unwrap().len(), 1);
  }

  #[test]
  fn rejects_structural_mismatches() {
    assert!(matches!(decode("{\"id\":1}"), Err(DecodeError::Json(_))));
    assert!(matches!(decode(r#"[{"id":"1","type":"Tiếng Anh","content":"x","points":1}]"#), Err(DecodeError::Json(_))));
    let three = r#"[{"id":"1","type":"Trắc nghiệm nhiều lựa chọn","content":"x","options":["a","b","c"],"points":1}]"#;
    assert!(matches!(decode(three), Err(DecodeError::Shape { .. })));
    let essay_with_opts = r#"[{"id":"9","type":"Tự luận","content":"x","options":["a","b","c","d"],"points":1}]"#;
    assert!(matches!(decode(essay_with_opts), Err(DecodeError::Shape { .. })));
    let dup = r#"[{"id":"2","type":"Trắc nghiệm đúng sai","content":"x","subQuestions":[{"id":"a","content":"","isCorrect":true},{"id":"a","content":"","isCorrect":true}],"points":1}]"#;
    assert!(matches!(decode(dup), Err(DecodeError::Shape { .. })));
    let negative = r#"[{"id":"3","type":"Trả lời ngắn","content":"x","points":-1}]"#;
    assert!(matches!(decode(negative), Err(DecodeError::Shape { .. })));
  }

  #[test]
  fn sub_question_ids_are_stored_as_bare_letters() {
    let raw = r#"[{"id":"2","type":"Trắc nghiệm đúng sai","content":"x","subQuestions":[{"id":"a)","content":"","isCorrect":true},{"id":" b ","content":"","isCorrect":false}],"points":1}]"#;
    let qs = decode(raw).unwrap();
    let ids: Vec<&str> = qs[0].sub_questions.as_ref().unwrap().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let html = crate::render::print_html(&qs, &crate::config::PaperMeta::default());
    assert!(html.contains("<b>a)</b>"));
    assert!(!html.contains("a))"));
  }

  #[test]
  fn placeholder_is_zero_point_essay() {
    let p = failure_placeholder("timeout");
    assert_eq!(p.kind, QuestionType::Essay);
    assert_eq!(p.points, 0.0);
    assert!(p.content.ends_with("Lỗi: timeout"));
  }

  #[test]
  fn partition_numbers_locally_in_fixed_order() {
    let qs = vec![
      q("e1", QuestionType::Essay),
      q("m1", QuestionType::MultipleChoice),
      q("t1", QuestionType::TrueFalse),
      q("m2", QuestionType::MultipleChoice),
    ];
    let parts = partition(&qs);
    let kinds: Vec<QuestionType> = parts.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![QuestionType::MultipleChoice, QuestionType::TrueFalse, QuestionType::Essay]);
    let mc: Vec<(usize, &str)> = parts[0].items.iter().map(|n| (n.number, n.question.id.as_str())).collect();
    assert_eq!(mc, vec![(1, "m1"), (2, "m2")]);
    assert_eq!(parts[1].items[0].number, 1);
    assert_eq!(parts[2].items[0].number, 1);
  }

  #[test]
  fn empty_set_has_no_partitions() {
    assert!(partition(&[]).is_empty());
  }
}
