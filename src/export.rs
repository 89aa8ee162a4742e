//! Word export: the Question Set as Word-compatible HTML (`.doc`), with the
//! same partition and numbering as the on-screen exam.

use crate::config::PaperMeta;
use crate::domain::{Question, QuestionType};
use crate::questions::partition;
use crate::util::{escape_html, html_text, option_label};

pub const EXPORT_FILE_NAME: &str = "de_kiem_tra_toan_9.doc";
pub const EXPORT_MIME: &str = "application/msword";

pub fn export_title(kind: QuestionType) -> &'static str {
  match kind {
    QuestionType::MultipleChoice => "PHẦN I. TRẮC NGHIỆM KHÁCH QUAN",
    QuestionType::TrueFalse => "PHẦN II. TRẮC NGHIỆM ĐÚNG SAI",
    QuestionType::ShortAnswer => "PHẦN III. TRẮC NGHIỆM TRẢ LỜI NGẮN",
    QuestionType::Essay => "PHẦN IV. TỰ LUẬN",
  }
}

/// Build the document bytes. `None` when there is nothing to export.
pub fn export_doc(questions: &[Question], paper: &PaperMeta) -> Option<Vec<u8>> {
  if questions.is_empty() {
    return None;
  }

  let mut body = String::new();
  for p in partition(questions) {
    body.push_str(&format!(
      "<h3 style=\"margin-top: 20px; text-transform: uppercase;\">{}</h3>",
      export_title(p.kind)
    ));
    for n in &p.items {
      let q = n.question;
      body.push_str("<div style=\"margin-bottom: 15px;\">");
      body.push_str(&format!("<p><b>Câu {}.</b> {}</p>", n.number, html_text(&q.content)));
      match q.kind {
        QuestionType::MultipleChoice => {
          body.push_str("<div style=\"margin-left: 20px;\">");
          for (i, opt) in q.options.iter().flatten().enumerate() {
            body.push_str(&format!("<p><b>{}.</b> {}</p>", option_label(i), html_text(opt)));
          }
          body.push_str("</div>");
        }
        QuestionType::TrueFalse => {
          body.push_str("<table border=\"1\" style=\"border-collapse: collapse; width: 100%; margin-top: 5px;\">");
          for sub in q.sub_questions.iter().flatten() {
            body.push_str(&format!(
              "<tr><td style=\"padding: 5px; width: 30px;\"><b>{})</b></td><td style=\"padding: 5px;\">{}</td><td style=\"width: 100px; text-align: center;\">Đ / S</td></tr>",
              escape_html(&sub.id),
              html_text(&sub.content)
            ));
          }
          body.push_str("</table>");
        }
        QuestionType::ShortAnswer => {
          body.push_str("<p><i>Trả lời: ............................................................</i></p>");
        }
        QuestionType::Essay => {}
      }
      body.push_str("</div>");
    }
  }

  let header = format!(
    "<html xmlns:o='urn:schemas-microsoft-com:office:office' xmlns:w='urn:schemas-microsoft-com:office:word' xmlns='http://www.w3.org/TR/REC-html40'>\
<head><meta charset='utf-8'><title>Exam Export</title>\
<style>body {{ font-family: 'Times New Roman', serif; font-size: 12pt; }}</style>\
</head><body>\
<div style=\"text-align: center; font-weight: bold; margin-bottom: 20px;\">\
<p style=\"margin: 0;\">{}</p><p style=\"margin: 0; text-transform: uppercase;\">{}</p></div>",
    escape_html(&paper.authority),
    escape_html(&paper.subject_title)
  );

  Some(format!("{header}{body}</body></html>").into_bytes())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::questions::tests::q;
  use crate::render::project;

  fn numbers_in(doc: &str, title: &str, next: Option<&str>) -> Vec<usize> {
    let start = doc.find(title).unwrap();
    let end = next.and_then(|n| doc.find(n)).unwrap_or(doc.len());
    doc[start..end]
      .match_indices("<b>Câu ")
      .map(|(i, _)| {
        let rest = &doc[start + i + "<b>Câu ".len()..];
        rest[..rest.find('.').unwrap()].parse().unwrap()
      })
      .collect()
  }

  #[test]
  fn empty_set_exports_nothing() {
    assert!(export_doc(&[], &PaperMeta::default()).is_none());
  }

  #[test]
  fn numbering_matches_screen_projection() {
    let qs = vec![
      q("e1", QuestionType::Essay),
      q("m1", QuestionType::MultipleChoice),
      q("s1", QuestionType::ShortAnswer),
      q("m2", QuestionType::MultipleChoice),
      q("e2", QuestionType::Essay),
      q("t1", QuestionType::TrueFalse),
    ];
    let doc = String::from_utf8(export_doc(&qs, &PaperMeta::default()).unwrap()).unwrap();
    let sections = project(&qs, false);

    let titles: Vec<&str> = sections.iter().map(|s| export_title(s.kind)).collect();
    for (i, title) in titles.iter().enumerate() {
      let got = numbers_in(&doc, title, titles.get(i + 1).copied());
      let want: Vec<usize> = sections[i].items.iter().map(|it| it.number).collect();
      assert_eq!(got, want, "section {title}");
    }
  }

  #[test]
  fn document_layout() {
    let qs = vec![q("t1", QuestionType::TrueFalse), q("s1", QuestionType::ShortAnswer), q("m1", QuestionType::MultipleChoice)];
    let doc = String::from_utf8(export_doc(&qs, &PaperMeta::default()).unwrap()).unwrap();
    assert!(doc.starts_with("<html xmlns:o="));
    assert!(doc.contains("ĐỀ KIỂM TRA MÔN TOÁN 9"));
    assert!(doc.find("PHẦN I. TRẮC NGHIỆM KHÁCH QUAN").unwrap() < doc.find("PHẦN II.").unwrap());
    assert_eq!(doc.matches("Đ / S").count(), 4);
    assert!(doc.contains("<p><b>D.</b> $4$</p>"));
    assert!(doc.contains("<i>Trả lời: "));
    assert!(doc.ends_with("</body></html>"));
  }
}
