//! Deck construction from external sources.
//!
//! A deck source supplies ordered `(front, back, durationSec?)` rows, either
//! as plain text (one row per line, tab-separated with a comma fallback) or
//! as a hydrated JSON document. Rows missing front or back after trimming
//! are dropped silently; a missing or non-positive duration takes the
//! caller-supplied default. Both are filtering rules, not errors.

use serde::{Deserialize, Serialize};

use crate::domain::Card;

/// One row of a deck source, before card construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckRow {
    pub front: String,
    pub back: String,
    #[serde(rename = "durationSec", default)]
    pub duration_sec: Option<i64>,
}

impl DeckRow {
    pub fn new(front: &str, back: &str, duration_sec: Option<i64>) -> Self {
        Self {
            front: front.to_string(),
            back: back.to_string(),
            duration_sec,
        }
    }
}

/// The full card collection for one loaded deck.
///
/// Replaced wholesale when a new deck is loaded, never edited mid-session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deck {
    pub cards: Vec<Card>,
}

impl Deck {
    /// Build a deck from source rows, applying the leniency policy.
    ///
    /// Card ids are positional (`c0`, `c1`, ...) over the surviving rows,
    /// so the same deck text always yields the same ids.
    pub fn from_rows(rows: Vec<DeckRow>, default_duration_sec: u32) -> Self {
        let mut cards = Vec::with_capacity(rows.len());
        let mut dropped = 0usize;

        for row in rows {
            let front = row.front.trim();
            let back = row.back.trim();
            if front.is_empty() || back.is_empty() {
                dropped += 1;
                continue;
            }

            let duration = match row.duration_sec {
                Some(secs) if secs > 0 => secs as u32,
                _ => default_duration_sec,
            };

            let id = format!("c{}", cards.len());
            cards.push(Card::new(id, front.to_string(), back.to_string(), duration));
        }

        if dropped > 0 {
            tracing::debug!("dropped {} deck rows missing front or back", dropped);
        }

        Self { cards }
    }

    /// Parse a raw deck text into a deck.
    ///
    /// Each non-empty line is one row: `front<TAB>back[<TAB>seconds]`, with
    /// comma separation accepted for lines without tabs.
    pub fn parse_text(raw: &str, default_duration_sec: u32) -> Self {
        let rows = raw.lines().filter_map(parse_line).collect();
        Self::from_rows(rows, default_duration_sec)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    /// Flip the user mark on a card. Unknown ids are ignored.
    ///
    /// Queue order is unaffected; only filtered-view membership changes on
    /// the next recompute.
    pub fn toggle_mark(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(card) => {
                card.marked = !card.marked;
                true
            }
            None => {
                tracing::debug!("toggle_mark: unknown card id {}", id);
                false
            }
        }
    }
}

fn parse_line(line: &str) -> Option<DeckRow> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let fields: Vec<&str> = if line.contains('\t') {
        line.split('\t').collect()
    } else {
        line.splitn(3, ',').collect()
    };

    let front = fields.first().copied().unwrap_or_default();
    let back = fields.get(1).copied().unwrap_or_default();
    let duration = fields.get(2).and_then(|f| f.trim().parse::<i64>().ok());

    Some(DeckRow::new(front, back, duration))
}
