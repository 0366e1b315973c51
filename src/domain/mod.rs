pub mod card;
pub mod deck;

pub use card::{Card, Grade, LastGrade};
pub use deck::{Deck, DeckRow};

use serde::{Deserialize, Serialize};

/// Which of the two app modes is selected. Persisted across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  #[default]
  Study,
  Test,
}

impl Mode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Study => "study",
      Self::Test => "test",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "study" => Some(Self::Study),
      "test" => Some(Self::Test),
      _ => None,
    }
  }
}
