//! Topic selection: reconcile selected topics when chapters are added or removed.

use crate::catalog::Catalog;

/// New topic selection after the chapter selection changed from `prev_chapters`
/// to `new_chapters`. Added chapters contribute all their topics (no duplicates),
/// removed chapters take all of theirs away. Unknown chapter ids are ignored.
pub fn resolve(
  prev_chapters: &[String],
  new_chapters: &[String],
  prev_topics: &[String],
  catalog: &Catalog,
) -> Vec<String> {
  let mut topics: Vec<String> = prev_topics.to_vec();

  for id in new_chapters.iter().filter(|id| !prev_chapters.contains(id)) {
    if let Some(ch) = catalog.chapter(id) {
      for t in &ch.topics {
        if !topics.contains(&t.id) {
          topics.push(t.id.clone());
        }
      }
    }
  }

  let removed: Vec<&String> = prev_chapters.iter().filter(|id| !new_chapters.contains(id)).collect();
  if !removed.is_empty() {
    let drop: Vec<&str> = removed
      .iter()
      .filter_map(|id| catalog.chapter(id))
      .flat_map(|ch| ch.topics.iter().map(|t| t.id.as_str()))
      .collect();
    topics.retain(|t| !drop.contains(&t.as_str()));
  }

  topics
}

/// Keep only topics offered by the selected chapters, dropping duplicates.
pub fn restrict_to_available(requested: &[String], selected_chapters: &[String], catalog: &Catalog) -> Vec<String> {
  let available = catalog.available_topics(selected_chapters);
  let mut out: Vec<String> = Vec::new();
  for id in requested {
    if available.iter().any(|t| &t.id == id) && !out.contains(id) {
      out.push(id.clone());
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn s(v: &[&str]) -> Vec<String> {
    v.iter().map(|x| x.to_string()).collect()
  }

  #[test]
  fn select_then_deselect_chapter() {
    let cat = Catalog::builtin();
    let topics = resolve(&[], &s(&["c1"]), &[], &cat);
    assert_eq!(topics, s(&["c1_t1", "c1_t2", "c1_t3"]));
    let topics = resolve(&s(&["c1"]), &[], &topics, &cat);
    assert!(topics.is_empty());
  }

  #[test]
  fn repeated_identical_toggle_is_idempotent() {
    let cat = Catalog::builtin();
    let once = resolve(&[], &s(&["c3"]), &s(&["c3_t2"]), &cat);
    let twice = resolve(&[], &s(&["c3"]), &once, &cat);
    assert_eq!(once, twice);
    assert_eq!(once, s(&["c3_t2", "c3_t1", "c3_t3", "c3_t4"]));
  }

  #[test]
  fn removing_one_chapter_keeps_the_other_and_manual_picks() {
    let cat = Catalog::builtin();
    let prev = s(&["c1", "c2"]);
    let topics = s(&["c1_t1", "c2_t2"]);
    let out = resolve(&prev, &s(&["c2"]), &topics, &cat);
    assert_eq!(out, s(&["c2_t2"]));
  }

  #[test]
  fn unknown_chapter_is_a_noop() {
    let cat = Catalog::builtin();
    let out = resolve(&[], &s(&["zz"]), &s(&["c1_t1"]), &cat);
    assert_eq!(out, s(&["c1_t1"]));
    let out = resolve(&s(&["zz"]), &[], &out, &cat);
    assert_eq!(out, s(&["c1_t1"]));
  }

  #[test]
  fn restrict_drops_topics_of_unselected_chapters() {
    let cat = Catalog::builtin();
    let out = restrict_to_available(&s(&["c1_t2", "c5_t1", "c1_t2", "nope"]), &s(&["c1"]), &cat);
    assert_eq!(out, s(&["c1_t2"]));
  }
}
