//! Exam renderer: the on-screen projection (JSON sections with an optional
//! answer-key overlay) and the printable exam paper (HTML).

use serde::Serialize;

use crate::config::PaperMeta;
use crate::domain::{Question, QuestionType};
use crate::questions::{partition, Partition};
use crate::util::{escape_html, html_text, option_label};

pub fn screen_title(kind: QuestionType) -> &'static str {
  match kind {
    QuestionType::MultipleChoice => "PHẦN I. TRẮC NGHIỆM NHIỀU LỰA CHỌN",
    QuestionType::TrueFalse => "PHẦN II. TRẮC NGHIỆM ĐÚNG SAI",
    QuestionType::ShortAnswer => "PHẦN III. TRẮC NGHIỆM TRẢ LỜI NGẮN",
    QuestionType::Essay => "PHẦN IV. TỰ LUẬN",
  }
}

const ANSWER_PENDING: &str = "Đang cập nhật...";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSection {
  pub kind: QuestionType,
  pub title: &'static str,
  pub items: Vec<RenderedQuestion>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedQuestion {
  pub number: usize,
  pub id: String,
  pub content: String,
  pub points: f64,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub options: Vec<LabeledOption>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub statements: Vec<Statement>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub answer: Option<AnswerKey>,
}

#[derive(Debug, Serialize)]
pub struct LabeledOption {
  pub label: char,
  pub text: String,
}

#[derive(Debug, Serialize)]
pub struct Statement {
  pub id: String,
  pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKey {
  Text { text: String },
  TrueFalse { verdicts: Vec<Verdict> },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
  pub id: String,
  pub is_correct: bool,
  pub label: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

fn answer_key(q: &Question) -> AnswerKey {
  match (&q.kind, &q.sub_questions) {
    (QuestionType::TrueFalse, Some(subs)) => AnswerKey::TrueFalse {
      verdicts: subs
        .iter()
        .map(|s| Verdict {
          id: s.id.clone(),
          is_correct: s.is_correct,
          label: if s.is_correct { "ĐÚNG" } else { "SAI" },
          explanation: s.explanation.clone(),
        })
        .collect(),
    },
    _ => AnswerKey::Text {
      text: q
        .correct_answer
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(ANSWER_PENDING)
        .to_string(),
    },
  }
}

/// Project a Question Set into its screen sections. The overlay only adds the
/// answer fields; the Question Set itself is untouched.
pub fn project(questions: &[Question], show_answers: bool) -> Vec<RenderedSection> {
  partition(questions).into_iter().map(|p| render_section(&p, show_answers)).collect()
}

fn render_section(p: &Partition<'_>, show_answers: bool) -> RenderedSection {
  RenderedSection {
    kind: p.kind,
    title: screen_title(p.kind),
    items: p
      .items
      .iter()
      .map(|n| {
        let q = n.question;
        RenderedQuestion {
          number: n.number,
          id: q.id.clone(),
          content: q.content.clone(),
          points: q.points,
          options: q
            .options
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, o)| LabeledOption { label: option_label(i), text: o.clone() })
            .collect(),
          statements: q
            .sub_questions
            .iter()
            .flatten()
            .map(|s| Statement { id: s.id.clone(), content: s.content.clone() })
            .collect(),
          answer: show_answers.then(|| answer_key(q)),
        }
      })
      .collect(),
  }
}

/// Estimated page count printed in the header, five questions a page.
pub fn page_estimate(question_count: usize) -> usize {
  question_count.div_ceil(5).max(1)
}

/// Printable exam paper. Header, student fields, sections and the closing
/// marker; no controls, no chat and no answer key.
pub fn print_html(questions: &[Question], paper: &PaperMeta) -> String {
  let mut body = String::new();
  body.push_str("<div class=\"exam-header\">");
  body.push_str("<table class=\"meta\"><tr><td class=\"authority\">");
  body.push_str(&format!("<h3>{}</h3><h3>................................</h3>", escape_html(&paper.authority)));
  body.push_str("</td><td class=\"subject\">");
  body.push_str(&format!(
    "<h3>{}</h3><p>{}</p><p>{}</p>",
    escape_html(&paper.subject_title),
    escape_html(&paper.school_year),
    escape_html(&paper.duration)
  ));
  body.push_str("</td></tr></table>");
  body.push_str(&format!(
    "<h1>{}</h1><p class=\"pages\">(Đề thi gồm có {} trang)</p>",
    escape_html(&paper.exam_title),
    page_estimate(questions.len())
  ));
  body.push_str("<div class=\"student\"><div>Họ và tên thí sinh: ...........................................................</div>");
  body.push_str("<div>Số báo danh: ...................................................................</div></div>");
  body.push_str("</div>");

  if !questions.is_empty() {
    for p in partition(questions) {
      print_section(&mut body, &p);
    }
    body.push_str("<div class=\"end\">--- HẾT ---<br/><span>(Cán bộ coi thi không giải thích gì thêm)</span></div>");
  }

  format!(
    "<!DOCTYPE html><html lang=\"vi\"><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head><body>{}</body></html>",
    escape_html(&paper.subject_title),
    PRINT_CSS,
    body
  )
}

const PRINT_CSS: &str = "body{font-family:'Times New Roman',serif;font-size:12pt;margin:2cm;}\
.exam-header{border-bottom:2px solid #000;margin-bottom:24px;padding-bottom:12px;text-align:center;}\
.meta{width:100%;}.meta td{vertical-align:top;text-align:center;width:50%;}\
h3{font-size:11pt;margin:0;text-transform:uppercase;}h1{font-size:15pt;margin:12px 0 0;}\
.student{text-align:left;margin-top:12px;line-height:2;}\
section{margin-bottom:24px;break-inside:avoid-page;}section h2{font-size:12pt;text-transform:uppercase;border-bottom:2px solid rgba(0,0,0,.1);}\
.q{margin-bottom:14px;break-inside:avoid;}.opts{display:grid;grid-template-columns:repeat(4,1fr);gap:4px 24px;margin-left:24px;}\
table.tf{border-collapse:collapse;width:100%;margin-top:6px;}table.tf td,table.tf th{border:1px solid #000;padding:4px 8px;}\
.box{display:inline-block;width:12px;height:12px;border:1px solid #000;}\
.answer-line{margin-left:24px;font-style:italic;}.essay{height:10em;}\
.end{text-align:center;font-weight:bold;margin-top:32px;}.end span{font-weight:normal;font-style:italic;font-size:10pt;}";

fn print_section(out: &mut String, p: &Partition<'_>) {
  out.push_str(&format!("<section><h2>{}</h2>", screen_title(p.kind)));
  for n in &p.items {
    let q = n.question;
    out.push_str(&format!("<div class=\"q\"><p><b>Câu {}.</b> {}</p>", n.number, html_text(&q.content)));
    match q.kind {
      QuestionType::MultipleChoice => {
        out.push_str("<div class=\"opts\">");
        for (i, o) in q.options.iter().flatten().enumerate() {
          out.push_str(&format!("<div><b>{}.</b> {}</div>", option_label(i), html_text(o)));
        }
        out.push_str("</div>");
      }
      QuestionType::TrueFalse => {
        out.push_str("<table class=\"tf\"><thead><tr><th>Ý</th><th>Nội dung khẳng định</th><th>Đúng</th><th>Sai</th></tr></thead><tbody>");
        for s in q.sub_questions.iter().flatten() {
          out.push_str(&format!(
            "<tr><td><b>{})</b></td><td>{}</td><td><span class=\"box\"></span></td><td><span class=\"box\"></span></td></tr>",
            escape_html(&s.id),
            html_text(&s.content)
          ));
        }
        out.push_str("</tbody></table>");
      }
      QuestionType::ShortAnswer => {
        out.push_str("<p class=\"answer-line\">Trả lời: ............................................................</p>");
      }
      QuestionType::Essay => {
        out.push_str("<p class=\"answer-line\">Bài làm:</p><div class=\"essay\"></div>");
      }
    }
    out.push_str("</div>");
  }
  out.push_str("</section>");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::questions::tests::q;

  #[test]
  fn two_mc_one_tf_gives_two_sections() {
    let qs = vec![
      q("t", QuestionType::TrueFalse),
      q("m1", QuestionType::MultipleChoice),
      q("m2", QuestionType::MultipleChoice),
    ];
    let sections = project(&qs, false);
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].title, "PHẦN I. TRẮC NGHIỆM NHIỀU LỰA CHỌN");
    let nums: Vec<usize> = sections[0].items.iter().map(|i| i.number).collect();
    assert_eq!(nums, vec![1, 2]);
    assert_eq!(sections[1].items[0].number, 1);
    assert_eq!(sections[0].items[0].options[3].label, 'D');
    assert!(sections[0].items[0].answer.is_none());
  }

  #[test]
  fn answer_overlay_does_not_touch_questions() {
    let mut essay = q("e", QuestionType::Essay);
    essay.correct_answer = None;
    let qs = vec![q("t", QuestionType::TrueFalse), essay];
    let before = qs.clone();
    let sections = project(&qs, true);
    assert_eq!(qs, before);
    match sections[0].items[0].answer.as_ref().unwrap() {
      AnswerKey::TrueFalse { verdicts } => {
        assert_eq!(verdicts.len(), 4);
        assert_eq!(verdicts[0].label, "ĐÚNG");
        assert_eq!(verdicts[1].label, "SAI");
      }
      other => panic!("unexpected {other:?}"),
    }
    match sections[1].items[0].answer.as_ref().unwrap() {
      AnswerKey::Text { text } => assert_eq!(text, "Đang cập nhật..."),
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn empty_set_renders_no_sections() {
    assert!(project(&[], true).is_empty());
    let html = print_html(&[], &PaperMeta::default());
    assert!(!html.contains("<section>"));
    assert!(!html.contains("HẾT"));
  }

  #[test]
  fn print_page_has_header_sections_and_end_marker_without_answers() {
    let qs = vec![q("s", QuestionType::ShortAnswer), q("m", QuestionType::MultipleChoice)];
    let html = print_html(&qs, &PaperMeta::default());
    assert!(html.contains("SỞ GIÁO DỤC VÀ ĐÀO TẠO"));
    assert!(html.contains("(Đề thi gồm có 1 trang)"));
    assert!(html.contains("Họ và tên thí sinh"));
    assert!(html.find("PHẦN I.").unwrap() < html.find("PHẦN III.").unwrap());
    assert!(html.contains("--- HẾT ---"));
    assert!(!html.contains("Đáp án s"));
  }

  #[test]
  fn page_estimate_rounds_up() {
    assert_eq!(page_estimate(0), 1);
    assert_eq!(page_estimate(5), 1);
    assert_eq!(page_estimate(22), 5);
  }
}
