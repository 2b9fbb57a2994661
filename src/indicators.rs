use crate::round::ChartPoint;
use ta::Next;
use ta::indicators::RelativeStrengthIndex;

/// RSI at the last close of the visible chart; `None` when the window is
/// shorter than the period.
pub fn calculate_rsi(points: &[ChartPoint], period: u32) -> Option<f64> {
    let mut rsi_indicator = RelativeStrengthIndex::new(period as usize).ok()?;

    let close_prices: Vec<f64> = points.iter().filter_map(|p| p.close).collect();

    if close_prices.len() < period as usize {
        return None;
    }

    close_prices
        .into_iter()
        .map(|price| rsi_indicator.next(price))
        .last()
}
