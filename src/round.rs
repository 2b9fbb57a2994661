//! Picks one playable round: a symbol, the chart the player sees, and the
//! hidden week they are guessing.

use crate::dramatic_moves::{self, DramaticMove};
use crate::quotes::{Quote, QuoteProvider};
use crate::storage_utils::SelectionConfig;
use chrono::{Duration, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Bullish,
    Bearish,
}

impl Outcome {
    /// Strictly positive is bullish; a flat week counts as bearish.
    pub fn from_percent_change(pct: f64) -> Self {
        if pct > 0.0 {
            Outcome::Bullish
        } else {
            Outcome::Bearish
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Bullish => f.write_str("BULLISH"),
            Outcome::Bearish => f.write_str("BEARISH"),
        }
    }
}

/// A quote reduced to what the chart draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl From<&Quote> for ChartPoint {
    fn from(q: &Quote) -> Self {
        Self {
            time: q.date.format("%Y-%m-%d").to_string(),
            open: q.open,
            high: q.high,
            low: q.low,
            close: q.close,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub symbol: String,
    pub visible_data: Vec<ChartPoint>,
    pub future_data: Vec<ChartPoint>,
    pub outcome: Outcome,
    /// Last visible close to last future close. This grades the answer and
    /// is not the same number as the scanner's window change.
    pub percent_change: f64,
    pub dramatic_move: bool,
}

#[derive(Debug, Error)]
pub enum RoundError {
    #[error("no dramatic move found after {attempts} attempts")]
    Exhausted { attempts: usize },
    #[error("symbol catalog is empty")]
    EmptyCatalog,
}

/// Why a single symbol was passed over. Never shown to the player.
#[derive(Debug, Error, PartialEq)]
pub enum SkipReason {
    #[error("provider failed: {0}")]
    Provider(String),
    #[error("only {got} quotes, need {need}")]
    InsufficientHistory { got: usize, need: usize },
    #[error("no dramatic window")]
    NoDramaticMove,
    #[error("move at index {start} leaves no room for the visible window")]
    NoLookback { start: usize },
    #[error("windows too short: {visible} visible, {future} future")]
    ShortWindows { visible: usize, future: usize },
    #[error("window ends on a missing or zero close")]
    MissingClose,
}

fn last_close(points: &[ChartPoint]) -> Option<f64> {
    points
        .last()
        .and_then(|p| p.close)
        .filter(|c| *c != 0.0 && !c.is_nan())
}

/// Cuts a round out of one symbol's history, picking the move at random.
pub fn build_round<R: Rng + ?Sized>(
    symbol: &str,
    quotes: &[Quote],
    config: &SelectionConfig,
    rng: &mut R,
) -> Result<Round, SkipReason> {
    let moves = dramatic_moves::find_dramatic_moves(quotes, &config.scan);
    let selected: &DramaticMove = moves.choose(rng).ok_or(SkipReason::NoDramaticMove)?;

    let visible_start = selected
        .start_index
        .checked_sub(config.scan.lookback)
        .ok_or(SkipReason::NoLookback {
            start: selected.start_index,
        })?;

    let visible_data: Vec<ChartPoint> = quotes[visible_start..selected.start_index]
        .iter()
        .map(ChartPoint::from)
        .collect();
    let future_data: Vec<ChartPoint> = quotes[selected.start_index..=selected.end_index]
        .iter()
        .map(ChartPoint::from)
        .collect();

    if visible_data.len() < config.min_visible || future_data.len() < config.min_future {
        return Err(SkipReason::ShortWindows {
            visible: visible_data.len(),
            future: future_data.len(),
        });
    }

    let (Some(last_visible), Some(last_future)) =
        (last_close(&visible_data), last_close(&future_data))
    else {
        return Err(SkipReason::MissingClose);
    };

    let percent_change = dramatic_moves::percent_change(last_visible, last_future);

    Ok(Round {
        symbol: symbol.to_string(),
        visible_data,
        future_data,
        outcome: Outcome::from_percent_change(percent_change),
        percent_change,
        dramatic_move: true,
    })
}

/// Walks a shuffled symbol pool until one symbol yields a round.
pub struct RoundSelector<'a> {
    provider: &'a dyn QuoteProvider,
    config: &'a SelectionConfig,
    history_days: i64,
}

impl<'a> RoundSelector<'a> {
    pub fn new(
        provider: &'a dyn QuoteProvider,
        config: &'a SelectionConfig,
        history_days: i64,
    ) -> Self {
        Self {
            provider,
            config,
            history_days,
        }
    }

    pub async fn select<R: Rng + Send + ?Sized>(
        &self,
        symbols: &[String],
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<Round, RoundError> {
        if symbols.is_empty() {
            return Err(RoundError::EmptyCatalog);
        }

        let mut pool = symbols.to_vec();
        pool.shuffle(rng);

        let from = today - Duration::days(self.history_days);

        for attempt in 0..self.config.max_attempts {
            let symbol = &pool[attempt % pool.len()];

            match self.try_symbol(symbol, from, today, rng).await {
                Ok(round) => {
                    info!(
                        symbol = %round.symbol,
                        attempt = attempt + 1,
                        outcome = %round.outcome,
                        "selected round"
                    );
                    return Ok(round);
                }
                Err(reason @ SkipReason::Provider(_)) => {
                    warn!(symbol = %symbol, attempt = attempt + 1, "{}", reason);
                }
                Err(reason) => {
                    debug!(symbol = %symbol, attempt = attempt + 1, "skipped: {}", reason);
                }
            }
        }

        Err(RoundError::Exhausted {
            attempts: self.config.max_attempts,
        })
    }

    async fn try_symbol<R: Rng + Send + ?Sized>(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        rng: &mut R,
    ) -> Result<Round, SkipReason> {
        let quotes = self
            .provider
            .fetch_daily(symbol, from, to)
            .await
            .map_err(|e| SkipReason::Provider(format!("{:#}", e)))?;

        if quotes.len() < self.config.min_quotes {
            return Err(SkipReason::InsufficientHistory {
                got: quotes.len(),
                need: self.config.min_quotes,
            });
        }

        build_round(symbol, &quotes, self.config, rng)
    }
}
