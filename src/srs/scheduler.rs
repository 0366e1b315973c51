use chrono::{DateTime, Duration, Utc};

use crate::domain::{Card, Grade, LastGrade};

const MIN_EASE_FACTOR: f64 = 1.3;

/// Interval applied on a failed review, in days (~29 minutes).
const AGAIN_INTERVAL_DAYS: f64 = 0.02;

const MS_PER_DAY: f64 = 86_400_000.0;

pub struct ScheduleResult {
  pub ease: f64,
  pub interval_days: f64,
  pub reps: i64,
  pub due: DateTime<Utc>,
}

/// Map a grade onto new scheduling fields.
///
/// Deterministic given `(grade, ease, interval_days, reps, now)`; no other
/// inputs, no side effects.
pub fn schedule(
  grade: Grade,
  ease: f64,
  interval_days: f64,
  reps: i64,
  now: DateTime<Utc>,
) -> ScheduleResult {
  if !grade.is_pass() {
    // Failed review: streak resets, ease is untouched
    return ScheduleResult {
      ease,
      interval_days: AGAIN_INTERVAL_DAYS,
      reps: 0,
      due: due_after(now, AGAIN_INTERVAL_DAYS),
    };
  }

  // Interval grows with the pre-update ease; the ease adjustment below
  // only affects subsequent reviews.
  let new_interval = match reps {
    0 => 1.0,
    1 => 3.0,
    _ => (interval_days * ease).round().max(1.0),
  };

  // EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
  let q = grade as u8 as f64;
  let ease_delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
  let new_ease = (ease + ease_delta).max(MIN_EASE_FACTOR);

  ScheduleResult {
    ease: new_ease,
    interval_days: new_interval,
    reps: reps + 1,
    due: due_after(now, new_interval),
  }
}

fn due_after(now: DateTime<Utc>, interval_days: f64) -> DateTime<Utc> {
  now + Duration::milliseconds((interval_days * MS_PER_DAY).round() as i64)
}

/// Apply a review to a card in place.
pub fn apply_review(card: &mut Card, grade: Grade, now: DateTime<Utc>) {
  let result = schedule(grade, card.ease, card.interval_days, card.reps, now);
  card.ease = result.ease;
  card.interval_days = result.interval_days;
  card.reps = result.reps;
  card.due = result.due;
  card.last_grade = LastGrade::from(grade);
}
