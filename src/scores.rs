//! Score and streak keeping, plus the player's saved records.

use crate::round::Outcome;
use crate::storage_utils::AsyncStorageManager;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const HISTORY_LIMIT: usize = 20;
const SCORES_FILE: &str = "scores";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Left,
    Right,
}

impl Swipe {
    pub fn guess(self) -> Outcome {
        match self {
            Swipe::Right => Outcome::Bullish,
            Swipe::Left => Outcome::Bearish,
        }
    }
}

pub fn streak_message(streak: u32) -> &'static str {
    match streak {
        10.. => "LEGENDARY!",
        7..=9 => "ON FIRE!",
        5..=6 => "UNSTOPPABLE!",
        3..=4 => "HOT STREAK!",
        _ => "Nice!",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct { streak: u32 },
    /// The run that just ended, before the streak was reset.
    Wrong { lost_streak: u32, score: u32 },
}

/// Counters for one sitting. Score survives a wrong answer, the streak does not.
#[derive(Debug, Default, Clone)]
pub struct Session {
    pub score: u32,
    pub streak: u32,
}

impl Session {
    pub fn answer(&mut self, swipe: Swipe, actual: Outcome) -> Verdict {
        if swipe.guess() == actual {
            self.score += 1;
            self.streak += 1;
            Verdict::Correct {
                streak: self.streak,
            }
        } else {
            let lost_streak = self.streak;
            self.streak = 0;
            Verdict::Wrong {
                lost_streak,
                score: self.score,
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub name: String,
    pub streak: u32,
    pub score: u32,
    pub date: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ScoreBook {
    pub player_name: Option<String>,
    pub high_streak: u32,
    pub high_score: u32,
    /// Newest first.
    pub history: Vec<ScoreEntry>,
}

impl ScoreBook {
    pub async fn load(storage: &AsyncStorageManager) -> Result<Self> {
        storage.load_or_init(SCORES_FILE).await
    }

    pub async fn save(&self, storage: &AsyncStorageManager) -> Result<()> {
        storage.save(SCORES_FILE, self).await
    }

    /// Stores the trimmed name; blank input is refused.
    pub fn set_player_name(&mut self, raw: &str) -> bool {
        let name = raw.trim();
        if name.is_empty() {
            return false;
        }
        self.player_name = Some(name.to_string());
        true
    }

    /// Records a finished run. Nothing is kept until the player has a name.
    pub fn record_run(&mut self, streak: u32, score: u32, at: DateTime<Utc>) {
        let Some(name) = self.player_name.clone() else {
            return;
        };

        self.high_streak = self.high_streak.max(streak);
        self.high_score = self.high_score.max(score);

        self.history.insert(
            0,
            ScoreEntry {
                name,
                streak,
                score,
                date: at,
            },
        );
        self.history.truncate(HISTORY_LIMIT);
    }
}
