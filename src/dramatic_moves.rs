//! Detection of sharp multi-day price moves in a daily quote series.

use crate::quotes::Quote;
use serde::{Deserialize, Serialize};

/// Tunables for the scan. `lookback` days of history must precede every
/// window so the player always has a full chart to read.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ScanParams {
    pub threshold_pct: f64,
    pub lookback: usize,
    pub window: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            threshold_pct: 6.0,
            lookback: 60,
            window: 7,
        }
    }
}

impl ScanParams {
    /// Shortest series that can contain a single candidate.
    pub fn min_len(&self) -> usize {
        self.lookback.saturating_add(self.window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DramaticMove {
    pub start_index: usize,
    /// Inclusive; always `start_index + window - 1`.
    pub end_index: usize,
    /// Signed, from the first to the last close of the window.
    pub percent_change: f64,
}

/// A close usable as a ratio endpoint: present, non-zero and not NaN.
pub fn usable_close(quote: &Quote) -> Option<f64> {
    quote.close.filter(|c| *c != 0.0 && !c.is_nan())
}

pub fn percent_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

/// Every window whose move meets the threshold, in ascending start order.
/// Overlapping windows are each reported; holes in the closes are skipped.
pub fn find_dramatic_moves(quotes: &[Quote], params: &ScanParams) -> Vec<DramaticMove> {
    if params.window == 0 || quotes.len() < params.min_len() {
        return Vec::new();
    }

    let span = params.window - 1;

    (params.lookback..=quotes.len() - params.window)
        .filter_map(|i| {
            let start_close = usable_close(&quotes[i])?;
            let end_close = usable_close(&quotes[i + span])?;
            let pct = percent_change(start_close, end_close);

            (pct.abs() >= params.threshold_pct).then_some(DramaticMove {
                start_index: i,
                end_index: i + span,
                percent_change: pct,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::quotes::tests::{quote, series};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// 100 flat, 110 on day 66, then 105: only the window starting at 60 qualifies.
    pub(crate) fn jump_at_60() -> Vec<f64> {
        let mut closes = vec![100.0; 120];
        closes[66] = 110.0;
        for c in closes[67..].iter_mut() {
            *c = 105.0;
        }
        closes
    }

    #[test]
    fn short_series_has_no_moves() {
        let params = ScanParams::default();
        for len in [0, 1, 60, 66] {
            let mut closes = vec![100.0; len];
            if len > 0 {
                closes[len - 1] = 500.0;
            }
            assert!(find_dramatic_moves(&series(&closes), &params).is_empty());
        }
    }

    #[test]
    fn flat_series_has_no_moves() {
        let quotes = series(&[100.0; 67]);
        let params = ScanParams::default();
        assert!(find_dramatic_moves(&quotes, &params).is_empty());
    }

    #[test]
    fn single_ten_percent_jump_at_lookback() {
        let quotes = series(&jump_at_60());
        let moves = find_dramatic_moves(&quotes, &ScanParams::default());

        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].start_index, 60);
        assert_eq!(moves[0].end_index, 66);
        assert!((moves[0].percent_change - 10.0).abs() < 1e-9);
    }

    #[test]
    fn moves_before_lookback_are_ignored() {
        let mut closes = vec![100.0; 80];
        closes[10] = 50.0;
        closes[16] = 100.0;
        let params = ScanParams::default();
        assert!(find_dramatic_moves(&series(&closes), &params).is_empty());
    }

    #[test]
    fn last_possible_window_is_scanned() {
        let mut closes = vec![100.0; 70];
        closes[69] = 90.0;
        let moves = find_dramatic_moves(&series(&closes), &ScanParams::default());

        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].start_index, 63);
        assert_eq!(moves[0].end_index, 69);
        assert!((moves[0].percent_change + 10.0).abs() < 1e-9);
    }

    #[test]
    fn threshold_is_inclusive() {
        let params = ScanParams {
            threshold_pct: 6.25,
            ..ScanParams::default()
        };
        let mut closes = vec![100.0; 67];
        closes[66] = 106.25;
        let moves = find_dramatic_moves(&series(&closes), &params);
        assert_eq!(moves.len(), 1);

        closes[66] = 106.24;
        assert!(find_dramatic_moves(&series(&closes), &params).is_empty());
    }

    #[test]
    fn missing_or_zero_closes_are_skipped() {
        let params = ScanParams::default();
        let mut quotes = series(&[100.0; 67]);
        quotes[66] = quote(66, Some(200.0));
        quotes[60] = quote(60, None);
        let moves = find_dramatic_moves(&quotes, &params);
        assert!(moves.is_empty());

        quotes[60] = quote(60, Some(0.0));
        assert!(find_dramatic_moves(&quotes, &params).is_empty());

        quotes[60] = quote(60, Some(f64::NAN));
        assert!(find_dramatic_moves(&quotes, &params).is_empty());
    }

    #[test]
    fn missing_or_zero_end_closes_are_skipped() {
        let params = ScanParams::default();
        let mut quotes = series(&[100.0; 67]);
        for end in [None, Some(0.0), Some(f64::NAN)] {
            quotes[66] = quote(66, end);
            assert!(find_dramatic_moves(&quotes, &params).is_empty());
        }

        quotes[66] = quote(66, Some(200.0));
        assert_eq!(find_dramatic_moves(&quotes, &params).len(), 1);
    }

    #[test]
    fn oversized_params_return_empty() {
        let quotes = series(&[100.0; 10]);
        let huge_lookback = ScanParams {
            lookback: usize::MAX,
            ..ScanParams::default()
        };
        assert!(find_dramatic_moves(&quotes, &huge_lookback).is_empty());

        let huge_window = ScanParams {
            window: usize::MAX,
            ..ScanParams::default()
        };
        assert!(find_dramatic_moves(&quotes, &huge_window).is_empty());
    }

    #[test]
    fn overlapping_windows_are_all_reported() {
        let mut closes = vec![100.0; 80];
        for c in closes[70..].iter_mut() {
            *c = 120.0;
        }
        let moves = find_dramatic_moves(&series(&closes), &ScanParams::default());
        let starts: Vec<usize> = moves.iter().map(|m| m.start_index).collect();
        assert_eq!(starts, vec![64, 65, 66, 67, 68, 69]);
    }

    #[test]
    fn random_walk_respects_invariants_and_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut price = 100.0;
        let closes: Vec<f64> = (0..500)
            .map(|_| {
                price *= 1.0 + rng.gen_range(-0.04..0.04);
                price
            })
            .collect();
        let quotes = series(&closes);
        let params = ScanParams::default();

        let moves = find_dramatic_moves(&quotes, &params);
        assert!(!moves.is_empty());
        for m in &moves {
            assert_eq!(m.end_index, m.start_index + 6);
            assert!(m.start_index >= 60);
            assert!(m.end_index < quotes.len());
            assert!(m.percent_change.abs() >= 6.0);
        }
        assert!(
            moves
                .windows(2)
                .all(|w| w[0].start_index < w[1].start_index)
        );
        assert_eq!(moves, find_dramatic_moves(&quotes, &params));
    }

    #[test]
    fn custom_params_change_the_floor() {
        let params = ScanParams {
            threshold_pct: 1.0,
            lookback: 5,
            window: 3,
        };
        let quotes = series(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.5]);
        let moves = find_dramatic_moves(&quotes, &params);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].start_index, 5);
        assert_eq!(moves[0].end_index, 7);
    }
}
