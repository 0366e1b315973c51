//! Study-mode session: self-paced review over the working queue.
//!
//! Navigation intents move the cursor, grading intents feed the scheduler.
//! The queue is built once per deck load and stays stable; filters are
//! projections recomputed on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Card, Deck, Grade};
use crate::queue::{self, AdvancePolicy, QueueFilter};
use crate::srs;
use crate::store::{Store, StoreError, KEY_STUDY};

/// Persisted study-session state, alongside the deck snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySnapshot {
  pub queue: Vec<String>,
  pub cursor: usize,
  pub filter: QueueFilter,
  pub policy: AdvancePolicy,
}

pub struct StudySession {
  deck: Deck,
  queue: Vec<String>,
  cursor: usize,
  filter: QueueFilter,
  policy: AdvancePolicy,
}

impl StudySession {
  pub fn new(deck: Deck, policy: AdvancePolicy, now: DateTime<Utc>) -> Self {
    let queue = queue::build_queue(&deck.cards, now);
    Self {
      deck,
      queue,
      cursor: 0,
      filter: QueueFilter::All,
      policy,
    }
  }

  pub fn deck(&self) -> &Deck {
    &self.deck
  }

  pub fn queue(&self) -> &[String] {
    &self.queue
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn filter(&self) -> QueueFilter {
    self.filter
  }

  /// The currently visible card ids, in queue order.
  pub fn view(&self) -> Vec<String> {
    queue::filtered_view(&self.queue, &self.deck, self.filter)
  }

  pub fn current_card(&self) -> Option<&Card> {
    let view = self.view();
    let id = view.get(self.cursor)?;
    self.deck.get(id)
  }

  /// Grade the current card. Returns false when nothing is visible.
  ///
  /// A passing grade may auto-advance the cursor, depending on policy.
  pub fn grade(&mut self, grade: Grade, now: DateTime<Utc>) -> bool {
    let Some(id) = self.view().get(self.cursor).cloned() else {
      return false;
    };
    let Some(card) = self.deck.get_mut(&id) else {
      return false;
    };
    srs::apply_review(card, grade, now);
    tracing::debug!("graded {} as {}", id, grade.as_str());

    // The grade may have changed filtered-view membership
    let len = self.view().len();
    match queue::clamp_cursor(self.cursor, len) {
      Some(clamped) => {
        self.cursor = clamped;
        if self.policy.auto_advances(grade) {
          self.cursor = queue::advance(self.cursor, 1, len);
        }
      }
      None => self.cursor = 0,
    }
    true
  }

  pub fn navigate(&mut self, delta: isize) {
    self.cursor = queue::advance(self.cursor, delta, self.view().len());
  }

  /// Switch the visible filter, clamping the cursor to the new view.
  pub fn set_filter(&mut self, filter: QueueFilter) {
    self.filter = filter;
    self.cursor = queue::clamp_cursor(self.cursor, self.view().len()).unwrap_or(0);
  }

  pub fn toggle_mark(&mut self, id: &str) -> bool {
    self.deck.toggle_mark(id)
  }

  pub fn toggle_mark_current(&mut self) -> bool {
    match self.current_card().map(|c| c.id.clone()) {
      Some(id) => self.toggle_mark(&id),
      None => false,
    }
  }

  /// Rebuild the working order. Only meaningful when the queue has run
  /// empty; a populated queue is left untouched to keep order stable.
  pub fn rebuild_if_empty(&mut self, now: DateTime<Utc>) -> bool {
    if !self.queue.is_empty() {
      return false;
    }
    self.queue = queue::build_queue(&self.deck.cards, now);
    self.cursor = 0;
    true
  }

  // ==================== Persistence ====================

  pub fn snapshot(&self) -> StudySnapshot {
    StudySnapshot {
      queue: self.queue.clone(),
      cursor: self.cursor,
      filter: self.filter,
      policy: self.policy,
    }
  }

  pub fn save(&self, store: &Store) -> Result<(), StoreError> {
    store.save_deck(&self.deck)?;
    store.set_json(KEY_STUDY, &self.snapshot())
  }

  /// Restore the persisted session, if a deck snapshot exists.
  pub fn load(store: &Store) -> Result<Option<Self>, StoreError> {
    let Some(deck) = store.load_deck()? else {
      return Ok(None);
    };
    let snapshot: Option<StudySnapshot> = store.get_json(KEY_STUDY)?;
    Ok(Some(match snapshot {
      Some(s) => Self {
        deck,
        queue: s.queue,
        cursor: s.cursor,
        filter: s.filter,
        policy: s.policy,
      },
      None => Self::new(deck, AdvancePolicy::default(), Utc::now()),
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{DeckRow, LastGrade};

  fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
      .unwrap()
      .with_timezone(&Utc)
  }

  fn sample_session(policy: AdvancePolicy) -> StudySession {
    let deck = Deck::from_rows(
      vec![
        DeckRow::new("abate", "减弱", Some(10)),
        DeckRow::new("banal", "陈腐", Some(10)),
        DeckRow::new("cajole", "哄骗", Some(10)),
      ],
      30,
    );
    StudySession::new(deck, policy, now())
  }

  #[test]
  fn test_new_session_shows_first_card() {
    let session = sample_session(AdvancePolicy::KnowOnly);
    assert_eq!(session.view().len(), 3);
    assert_eq!(session.current_card().unwrap().front, "abate");
  }

  #[test]
  fn test_know_auto_advances() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);

    assert!(session.grade(Grade::Know, now()));
    assert_eq!(session.cursor(), 1);
    assert_eq!(session.current_card().unwrap().front, "banal");

    // The graded card carries its new scheduling state
    let first = session.deck().get("c0").unwrap();
    assert_eq!(first.reps, 1);
    assert_eq!(first.interval_days, 1.0);
    assert_eq!(first.last_grade, LastGrade::Know);
  }

  #[test]
  fn test_hard_does_not_advance_under_know_only() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);

    session.grade(Grade::Hard, now());
    assert_eq!(session.cursor(), 0);
    assert_eq!(session.current_card().unwrap().front, "abate");
  }

  #[test]
  fn test_hard_advances_under_pass_advances() {
    let mut session = sample_session(AdvancePolicy::PassAdvances);

    session.grade(Grade::Hard, now());
    assert_eq!(session.cursor(), 1);
  }

  #[test]
  fn test_again_stays_in_place() {
    let mut session = sample_session(AdvancePolicy::PassAdvances);

    session.grade(Grade::Again, now());
    assert_eq!(session.cursor(), 0);
    let first = session.deck().get("c0").unwrap();
    assert_eq!(first.reps, 0);
    assert_eq!(first.interval_days, 0.02);
  }

  #[test]
  fn test_navigate_clamps() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);

    session.navigate(-5);
    assert_eq!(session.cursor(), 0);
    session.navigate(10);
    assert_eq!(session.cursor(), 2);
    session.navigate(-1);
    assert_eq!(session.cursor(), 1);
  }

  #[test]
  fn test_grade_on_empty_view_is_noop() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);
    session.set_filter(QueueFilter::Marked);

    assert!(session.current_card().is_none());
    assert!(!session.grade(Grade::Know, now()));
  }

  #[test]
  fn test_filter_switch_clamps_cursor() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);
    session.toggle_mark("c2");
    session.navigate(2);
    assert_eq!(session.cursor(), 2);

    // Only one card is marked, so the cursor snaps to it
    session.set_filter(QueueFilter::Marked);
    assert_eq!(session.cursor(), 0);
    assert_eq!(session.current_card().unwrap().id, "c2");

    // Back to the full view, cursor stays in bounds
    session.set_filter(QueueFilter::All);
    assert_eq!(session.view().len(), 3);
  }

  #[test]
  fn test_mark_changes_view_membership_only() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);
    let before = session.queue().to_vec();

    session.toggle_mark_current();
    assert_eq!(session.queue(), before.as_slice());
    assert_eq!(
      queue::filtered_view(session.queue(), session.deck(), QueueFilter::Marked),
      vec!["c0"]
    );
  }

  #[test]
  fn test_hard_filter_shrinks_after_regrade() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);
    session.grade(Grade::Hard, now());
    session.set_filter(QueueFilter::Hard);
    assert_eq!(session.view(), vec!["c0"]);

    // Grading the card out of Hard empties the view
    session.grade(Grade::Know, now());
    assert!(session.current_card().is_none());
  }

  #[test]
  fn test_queue_order_stable_across_grading() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);
    let before = session.queue().to_vec();

    session.grade(Grade::Know, now());
    session.grade(Grade::Again, now());
    session.grade(Grade::Hard, now());

    assert_eq!(session.queue(), before.as_slice());
  }

  #[test]
  fn test_rebuild_only_when_empty() {
    let mut session = sample_session(AdvancePolicy::KnowOnly);
    let before = session.queue().to_vec();
    assert!(!session.rebuild_if_empty(now()));
    assert_eq!(session.queue(), before.as_slice());

    let mut empty = StudySession::new(Deck::default(), AdvancePolicy::KnowOnly, now());
    assert!(empty.rebuild_if_empty(now()));
    assert!(empty.queue().is_empty());
  }

  #[test]
  fn test_save_and_load_roundtrip() {
    let store = Store::open_in_memory().unwrap();
    let mut session = sample_session(AdvancePolicy::PassAdvances);
    session.grade(Grade::Know, now());
    session.set_filter(QueueFilter::All);
    session.save(&store).unwrap();

    let restored = StudySession::load(&store).unwrap().unwrap();
    assert_eq!(restored.cursor(), session.cursor());
    assert_eq!(restored.queue(), session.queue());
    assert_eq!(restored.filter(), QueueFilter::All);
    assert_eq!(restored.deck().get("c0").unwrap().reps, 1);
  }

  #[test]
  fn test_load_empty_store() {
    let store = Store::open_in_memory().unwrap();
    assert!(StudySession::load(&store).unwrap().is_none());
  }
}
