//! Curriculum catalog: built-in grade-9 chapters, or the TOML override.

use tracing::error;

use crate::config::ChapterCfg;
use crate::domain::{Chapter, Topic};

/// Read-only chapter list, loaded once at start-up.
#[derive(Clone, Debug)]
pub struct Catalog {
  chapters: Vec<Chapter>,
}

impl Catalog {
  pub fn new(chapters: Vec<Chapter>) -> Self {
    Self { chapters }
  }

  /// Use the configured chapters when any are valid, otherwise the built-in list.
  pub fn from_config(chapters: &[ChapterCfg]) -> Self {
    let mut out = Vec::new();
    for c in chapters {
      if c.id.trim().is_empty() || c.topics.is_empty() {
        error!(target: "mathgen", id = %c.id, "Skipping catalog chapter: missing id or topics.");
        continue;
      }
      out.push(Chapter {
        id: c.id.clone(),
        name: c.name.clone(),
        topics: c.topics.iter().map(|t| Topic { id: t.id.clone(), name: t.name.clone() }).collect(),
      });
    }
    if out.is_empty() { Self::builtin() } else { Self::new(out) }
  }

  pub fn builtin() -> Self {
    let ch = |id: &str, name: &str, topics: &[(&str, &str)]| Chapter {
      id: id.into(),
      name: name.into(),
      topics: topics.iter().map(|(i, n)| Topic { id: (*i).into(), name: (*n).into() }).collect(),
    };
    Self::new(vec![
      ch("c1", "Chương 1: Phương trình và Hệ phương trình", &[
        ("c1_t1", "Phương trình quy về phương trình bậc nhất một ẩn"),
        ("c1_t2", "Phương trình bậc nhất hai ẩn và hệ hai phương trình bậc nhất hai ẩn"),
        ("c1_t3", "Giải hệ hai phương trình bậc nhất hai ẩn"),
      ]),
      ch("c2", "Chương 2: Bất đẳng thức. Bất phương trình bậc nhất một ẩn", &[
        ("c2_t1", "Bất đẳng thức"),
        ("c2_t2", "Bất phương trình bậc nhất một ẩn"),
      ]),
      ch("c3", "Chương 3: Căn thức", &[
        ("c3_t1", "Căn bậc hai"),
        ("c3_t2", "Căn bậc ba"),
        ("c3_t3", "Tính chất của phép khai phương"),
        ("c3_t4", "Biến đổi đơn giản biểu thức chứa căn thức bậc hai"),
      ]),
      ch("c4", "Chương 4: Hệ thức lượng trong tam giác vuông", &[
        ("c4_t1", "Tỉ số lượng giác của góc nhọn"),
        ("c4_t2", "Hệ thức giữa cạnh và góc của tam giác vuông"),
      ]),
      ch("c5", "Chương 5: Đường tròn", &[
        ("c5_t1", "Đường tròn"),
        ("c5_t2", "Tiếp tuyến của đường tròn"),
        ("c5_t3", "Góc ở tâm, góc nội tiếp"),
        ("c5_t4", "Hình quạt tròn và hình vành khuyên"),
      ]),
      ch("c6", "Chương 6: Hàm số y = ax^2 (a ≠ 0) và Phương trình bậc hai một ẩn", &[
        ("c6_t1", "Hàm số y = ax^2 (a ≠ 0)"),
        ("c6_t2", "Phương trình bậc hai một ẩn"),
        ("c6_t3", "Định lí Viète"),
      ]),
      ch("c7", "Chương 7: Một số yếu tố Thống kê", &[
        ("c7_t1", "Bảng tần số và biểu đồ tần số"),
        ("c7_t2", "Bảng tần số tương đối và biểu đồ tần số tương đối"),
      ]),
      ch("c8", "Chương 8: Một số yếu tố Xác suất", &[
        ("c8_t1", "Không gian mẫu và biến cố"),
        ("c8_t2", "Xác suất của biến cố"),
      ]),
      ch("c9", "Chương 9: Tứ giác nội tiếp. Đa giác đều", &[
        ("c9_t1", "Đường tròn ngoại tiếp tam giác. Đường tròn nội tiếp tam giác"),
        ("c9_t2", "Tứ giác nội tiếp"),
        ("c9_t3", "Đa giác đều và phép quay"),
      ]),
      ch("c10", "Chương 10: Các hình khối trong thực tiễn", &[
        ("c10_t1", "Hình trụ"),
        ("c10_t2", "Hình nón"),
        ("c10_t3", "Hình cầu"),
      ]),
    ])
  }

  pub fn chapters(&self) -> &[Chapter] {
    &self.chapters
  }

  pub fn chapter(&self, id: &str) -> Option<&Chapter> {
    self.chapters.iter().find(|c| c.id == id)
  }

  /// Topics of all selected chapters, in catalog order.
  pub fn available_topics(&self, selected_chapters: &[String]) -> Vec<&Topic> {
    self
      .chapters
      .iter()
      .filter(|c| selected_chapters.contains(&c.id))
      .flat_map(|c| c.topics.iter())
      .collect()
  }

  /// "chapter - topic" labels for the selected topics, chapter order then topic order.
  pub fn topic_labels(&self, selected_topics: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for c in &self.chapters {
      for t in &c.topics {
        if selected_topics.contains(&t.id) {
          out.push(format!("{} - {}", c.name, t.name));
        }
      }
    }
    out
  }
}
