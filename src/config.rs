//! Loading exam configuration (prompts + paper header + optional curriculum) from TOML.
//!
//! See `ExamFileConfig`, `Prompts` and `PaperMeta` for expected schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExamFileConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub paper: PaperMeta,
  #[serde(default)]
  pub chapters: Vec<ChapterCfg>,
}

/// Curriculum chapter accepted in TOML configuration. Replaces the built-in catalog.
#[derive(Clone, Debug, Deserialize)]
pub struct ChapterCfg {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub topics: Vec<TopicCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TopicCfg {
  pub id: String,
  pub name: String,
}

/// Prompts sent to the model. Defaults target the grade-9 Vietnamese curriculum
/// (GDPT 2018, "Chân trời sáng tạo" textbooks).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// Placeholders: {context} {difficulty} {num_mc} {num_tf} {num_short} {num_essay}
  pub exam_user_template: String,
  pub file_context: String,
  /// Placeholder: {topics} (one "- chapter - topic" line each)
  pub curriculum_context: String,
  pub chat_persona: String,
  pub chat_exam_intro: String,
  pub chat_task: String,
  pub chat_no_exam: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      exam_user_template: "Đóng vai là một giáo viên Toán lớp 9 giỏi chuyên môn, am hiểu chương trình GDPT 2018 (Sách giáo khoa Chân trời sáng tạo).
Hãy soạn một đề kiểm tra {context}

YÊU CẦU CHUNG:
1. Tạo ra các câu hỏi MỚI, không sao chép y nguyên sách giáo khoa hay tài liệu mẫu.
2. Đảm bảo số liệu hợp lý, tính toán ra kết quả đẹp (nếu có thể).
3. Mức độ đánh giá chung: {difficulty}.

CẤU TRÚC ĐỀ THI (BẮT BUỘC PHẢI ĐỦ SỐ LƯỢNG):
1. PHẦN 1: {num_mc} câu Trắc nghiệm nhiều lựa chọn (Chọn 1 đáp án đúng A,B,C,D).
2. PHẦN 2: {num_tf} câu Trắc nghiệm Đúng/Sai. Mỗi câu hỏi có một đề bài chính và 4 ý nhỏ (a, b, c, d). Học sinh phải xác định mỗi ý là Đúng hay Sai.
3. PHẦN 3: {num_short} câu Trả lời ngắn. Học sinh tính toán và điền kết quả (thường là số hoặc biểu thức đơn giản).
4. PHẦN 4: {num_essay} câu Tự luận. Yêu cầu trình bày lời giải chi tiết.

YÊU CẦU KỸ THUẬT:
- Các công thức toán học PHẢI bọc trong dấu $ (ví dụ $x^2$, $\\frac{1}{2}$).
- Không sử dụng các môi trường LaTeX phức tạp không được MathJax hỗ trợ cơ bản.".into(),
      file_context: "dựa trên TÀI LIỆU ĐÍNH KÈM (File PDF). Phân tích kỹ nội dung, dạng bài, và kiến thức trong file để tạo đề tương tự.".into(),
      curriculum_context: "tập trung vào các CHỦ ĐỀ KIẾN THỨC SAU:\n{topics}".into(),
      chat_persona: "Bạn là một trợ lý AI thông minh, giỏi Toán lớp 9 (Chương trình GDPT 2018).".into(),
      chat_exam_intro: "Học sinh đang làm một đề thi Toán với các câu hỏi sau:".into(),
      chat_task: "NHIỆM VỤ CỦA BẠN:
- Giải đáp thắc mắc của học sinh về các câu hỏi này.
- Gợi ý cách làm (không đưa ra đáp án ngay nếu học sinh chưa thử).
- Giải thích các khái niệm Toán học liên quan.
- Luôn dùng công thức Toán trong dấu $ (ví dụ $x^2$) để hiển thị đẹp.
- Giọng văn thân thiện, khuyến khích học tập.".into(),
      chat_no_exam: "Hiện tại chưa có đề thi nào được tạo. Hãy hướng dẫn học sinh tạo đề hoặc giải đáp thắc mắc chung về Toán 9.".into(),
    }
  }
}

/// Header block printed on the exam paper and in the Word export.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PaperMeta {
  pub authority: String,
  pub subject_title: String,
  pub school_year: String,
  pub duration: String,
  pub exam_title: String,
}

impl Default for PaperMeta {
  fn default() -> Self {
    Self {
      authority: "SỞ GIÁO DỤC VÀ ĐÀO TẠO".into(),
      subject_title: "ĐỀ KIỂM TRA MÔN TOÁN 9".into(),
      school_year: "Năm học 2024 - 2025".into(),
      duration: "Thời gian làm bài: 90 phút".into(),
      exam_title: "ĐỀ KIỂM TRA ĐÁNH GIÁ ĐỊNH KỲ".into(),
    }
  }
}

/// Attempt to load `ExamFileConfig` from EXAM_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_exam_config_from_env() -> Option<ExamFileConfig> {
  let path = std::env::var("EXAM_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_exam_config(&s) {
      Ok(cfg) => {
        info!(target: "mathgen", %path, chapters = cfg.chapters.len(), "Loaded exam config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "mathgen", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mathgen", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_exam_config(s: &str) -> Result<ExamFileConfig, toml::de::Error> {
  toml::from_str::<ExamFileConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg = parse_exam_config(
      r#"
[paper]
school_year = "Năm học 2025 - 2026"

[[chapters]]
id = "k1"
name = "Chương A"
  [[chapters.topics]]
  id = "k1_t1"
  name = "Bài 1"
"#,
    )
    .unwrap();
    assert_eq!(cfg.paper.school_year, "Năm học 2025 - 2026");
    assert_eq!(cfg.paper.authority, "SỞ GIÁO DỤC VÀ ĐÀO TẠO");
    assert_eq!(cfg.chapters.len(), 1);
    assert_eq!(cfg.chapters[0].topics[0].id, "k1_t1");
    assert!(cfg.prompts.exam_user_template.contains("{num_mc}"));
  }

  #[test]
  fn empty_toml_is_default() {
    let cfg = parse_exam_config("").unwrap();
    assert!(cfg.chapters.is_empty());
    assert!(cfg.prompts.curriculum_context.contains("{topics}"));
  }
}
