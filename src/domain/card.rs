use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User feedback on a review. The numeric values feed the scheduling
/// formula directly, so they are part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
  Again = 1,
  Hard = 3,
  Know = 5,
}

impl Grade {
  pub fn from_u8(value: u8) -> Option<Self> {
    match value {
      1 => Some(Self::Again),
      3 => Some(Self::Hard),
      5 => Some(Self::Know),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Again => "again",
      Self::Hard => "hard",
      Self::Know => "know",
    }
  }

  /// A passing grade keeps the repetition streak alive; Again breaks it.
  pub fn is_pass(&self) -> bool {
    (*self as u8) >= 3
  }
}

/// The most recent grade a card received, Unseen until the first review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LastGrade {
  #[default]
  Unseen,
  Again,
  Hard,
  Know,
}

impl LastGrade {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unseen => "unseen",
      Self::Again => "again",
      Self::Hard => "hard",
      Self::Know => "know",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "unseen" => Some(Self::Unseen),
      "again" => Some(Self::Again),
      "hard" => Some(Self::Hard),
      "know" => Some(Self::Know),
      _ => None,
    }
  }
}

impl From<Grade> for LastGrade {
  fn from(grade: Grade) -> Self {
    match grade {
      Grade::Again => Self::Again,
      Grade::Hard => Self::Hard,
      Grade::Know => Self::Know,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
  /// Unique within a deck, stable across sessions
  pub id: String,
  pub front: String,
  pub back: String,
  /// Test-mode time budget for this card, always positive
  pub duration_sec: u32,

  // Scheduling state, written only by the review scheduler
  pub ease: f64,
  pub interval_days: f64,
  pub reps: i64,
  pub due: DateTime<Utc>,
  pub last_grade: LastGrade,

  /// User flag, independent of scheduling
  pub marked: bool,
}

impl Card {
  pub fn new(id: String, front: String, back: String, duration_sec: u32) -> Self {
    Self {
      id,
      front,
      back,
      duration_sec,
      ease: 2.5,
      interval_days: 0.0,
      reps: 0,
      due: Utc::now(),
      last_grade: LastGrade::Unseen,
      marked: false,
    }
  }
}
