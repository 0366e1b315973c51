//! Working-order construction and filtered projections over a deck.
//!
//! The queue is an ordered, de-duplicated list of card ids. It is rebuilt
//! only when empty or when a fresh deck is loaded; order is stable for the
//! rest of the session. Filtered views are pure projections recomputed on
//! demand, with no caching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::{Card, Deck, Grade, LastGrade};

/// Which subset of the queue is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueFilter {
  #[default]
  All,
  Marked,
  Hard,
}

impl QueueFilter {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::All => "all",
      Self::Marked => "marked",
      Self::Hard => "hard",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "all" => Some(Self::All),
      "marked" => Some(Self::Marked),
      "hard" => Some(Self::Hard),
      _ => None,
    }
  }

  fn admits(&self, card: &Card) -> bool {
    match self {
      Self::All => true,
      Self::Marked => card.marked,
      Self::Hard => card.last_grade == LastGrade::Hard,
    }
  }
}

/// Whether a passing grade moves the cursor forward on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
  /// Only Know advances automatically
  #[default]
  KnowOnly,
  /// Hard and Know both advance
  PassAdvances,
}

impl AdvancePolicy {
  pub fn auto_advances(&self, grade: Grade) -> bool {
    match self {
      Self::KnowOnly => grade == Grade::Know,
      Self::PassAdvances => grade.is_pass(),
    }
  }
}

/// Build the working order for a card collection.
///
/// Three groups, concatenated in this fixed order:
/// 1. cards already due (`due <= now`), in collection order
/// 2. never-reviewed cards (`reps == 0`) not in group 1, in collection order
/// 3. everything else, sorted ascending by due date
///
/// First match wins, so each id lands in exactly one group and the result
/// carries no duplicates.
pub fn build_queue(cards: &[Card], now: DateTime<Utc>) -> Vec<String> {
  let mut seen: HashSet<&str> = HashSet::with_capacity(cards.len());
  let mut due_now = Vec::new();
  let mut unseen = Vec::new();
  let mut later: Vec<&Card> = Vec::new();

  for card in cards {
    if !seen.insert(card.id.as_str()) {
      continue;
    }
    if card.due <= now {
      due_now.push(card.id.clone());
    } else if card.reps == 0 {
      unseen.push(card.id.clone());
    } else {
      later.push(card);
    }
  }

  later.sort_by_key(|c| c.due);

  due_now
    .into_iter()
    .chain(unseen)
    .chain(later.into_iter().map(|c| c.id.clone()))
    .collect()
}

/// Project the queue through a filter, preserving order.
pub fn filtered_view(queue: &[String], deck: &Deck, filter: QueueFilter) -> Vec<String> {
  queue
    .iter()
    .filter(|id| deck.get(id.as_str()).is_some_and(|card| filter.admits(card)))
    .cloned()
    .collect()
}

/// Move a cursor by a signed delta, clamped to `[0, len - 1]`. Never wraps.
pub fn advance(cursor: usize, delta: isize, len: usize) -> usize {
  if len == 0 {
    return 0;
  }
  let target = cursor as isize + delta;
  target.clamp(0, len as isize - 1) as usize
}

/// Clamp a cursor after the visible list changed. `None` when it is empty.
pub fn clamp_cursor(cursor: usize, len: usize) -> Option<usize> {
  if len == 0 {
    None
  } else {
    Some(cursor.min(len - 1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use crate::domain::DeckRow;

  fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
      .unwrap()
      .with_timezone(&Utc)
  }

  fn card(id: &str, reps: i64, due: DateTime<Utc>) -> Card {
    let mut c = Card::new(id.to_string(), id.to_string(), "back".to_string(), 10);
    c.reps = reps;
    c.due = due;
    c
  }

  #[test]
  fn test_build_queue_group_order() {
    let cards = vec![
      card("future", 3, now() + Duration::days(5)),
      card("due", 2, now() - Duration::hours(1)),
      card("fresh", 0, now() + Duration::days(1)),
      card("soon", 1, now() + Duration::days(2)),
    ];

    let queue = build_queue(&cards, now());
    assert_eq!(queue, vec!["due", "fresh", "soon", "future"]);
  }

  #[test]
  fn test_build_queue_due_group_wins_over_unseen() {
    // reps == 0 but already due: first match puts it in group 1
    let cards = vec![card("new-due", 0, now() - Duration::minutes(5))];

    let queue = build_queue(&cards, now());
    assert_eq!(queue, vec!["new-due"]);
  }

  #[test]
  fn test_build_queue_group3_sorted_by_due() {
    let cards = vec![
      card("z", 4, now() + Duration::days(9)),
      card("a", 4, now() + Duration::days(3)),
      card("m", 4, now() + Duration::days(6)),
    ];

    let queue = build_queue(&cards, now());
    assert_eq!(queue, vec!["a", "m", "z"]);
  }

  #[test]
  fn test_build_queue_no_duplicates() {
    let mut cards = vec![
      card("dup", 0, now() - Duration::hours(2)),
      card("other", 1, now() + Duration::days(1)),
    ];
    // Same id, same due date, twice more
    cards.push(card("dup", 0, now() - Duration::hours(2)));
    cards.push(card("dup", 2, now() + Duration::days(4)));

    let queue = build_queue(&cards, now());
    let unique: HashSet<&String> = queue.iter().collect();
    assert_eq!(queue.len(), unique.len());
    assert_eq!(queue.len(), 2);
  }

  #[test]
  fn test_build_queue_partition_covers_every_card() {
    let cards = vec![
      card("a", 0, now() - Duration::days(1)),
      card("b", 0, now() + Duration::days(1)),
      card("c", 3, now() + Duration::days(2)),
      card("d", 5, now() - Duration::minutes(1)),
    ];

    let queue = build_queue(&cards, now());
    assert_eq!(queue.len(), cards.len());
    for c in &cards {
      assert!(queue.contains(&c.id));
    }
  }

  #[test]
  fn test_build_queue_empty_input() {
    assert!(build_queue(&[], now()).is_empty());
  }

  #[test]
  fn test_filtered_view_preserves_order() {
    let mut deck = Deck::from_rows(
      vec![
        DeckRow::new("a", "1", None),
        DeckRow::new("b", "2", None),
        DeckRow::new("c", "3", None),
      ],
      30,
    );
    deck.toggle_mark("c0");
    deck.toggle_mark("c2");

    let queue: Vec<String> = vec!["c0".into(), "c1".into(), "c2".into()];
    let marked = filtered_view(&queue, &deck, QueueFilter::Marked);
    assert_eq!(marked, vec!["c0", "c2"]);
  }

  #[test]
  fn test_filtered_view_hard() {
    let mut deck = Deck::from_rows(
      vec![DeckRow::new("a", "1", None), DeckRow::new("b", "2", None)],
      30,
    );
    deck.get_mut("c1").unwrap().last_grade = LastGrade::Hard;

    let queue: Vec<String> = vec!["c0".into(), "c1".into()];
    assert_eq!(filtered_view(&queue, &deck, QueueFilter::Hard), vec!["c1"]);
    assert_eq!(
      filtered_view(&queue, &deck, QueueFilter::All),
      vec!["c0", "c1"]
    );
  }

  #[test]
  fn test_advance_clamps_both_ends() {
    assert_eq!(advance(0, -1, 5), 0);
    assert_eq!(advance(0, -10, 5), 0);
    assert_eq!(advance(4, 1, 5), 4);
    assert_eq!(advance(2, 100, 5), 4);
    assert_eq!(advance(2, 1, 5), 3);
    assert_eq!(advance(2, -1, 5), 1);
  }

  #[test]
  fn test_advance_empty_list() {
    assert_eq!(advance(3, 1, 0), 0);
  }

  #[test]
  fn test_clamp_cursor() {
    assert_eq!(clamp_cursor(0, 3), Some(0));
    assert_eq!(clamp_cursor(5, 3), Some(2));
    assert_eq!(clamp_cursor(0, 0), None);
  }

  #[test]
  fn test_advance_policy() {
    assert!(AdvancePolicy::KnowOnly.auto_advances(Grade::Know));
    assert!(!AdvancePolicy::KnowOnly.auto_advances(Grade::Hard));
    assert!(!AdvancePolicy::KnowOnly.auto_advances(Grade::Again));

    assert!(AdvancePolicy::PassAdvances.auto_advances(Grade::Know));
    assert!(AdvancePolicy::PassAdvances.auto_advances(Grade::Hard));
    assert!(!AdvancePolicy::PassAdvances.auto_advances(Grade::Again));
  }

  #[test]
  fn test_filter_roundtrip() {
    for f in [QueueFilter::All, QueueFilter::Marked, QueueFilter::Hard] {
      assert_eq!(QueueFilter::from_str(f.as_str()), Some(f));
    }
    assert_eq!(QueueFilter::from_str("due"), None);
  }
}
