use crate::storage_utils::AsyncStorageManager;
use anyhow::{Context, Result};
use regex::Regex;
use tracing::info;

/// Liquid NSE large caps, in Yahoo's `.NS` notation.
pub const NSE_SYMBOLS: &[&str] = &[
    "RELIANCE.NS",
    "TCS.NS",
    "HDFCBANK.NS",
    "ICICIBANK.NS",
    "INFY.NS",
    "HINDUNILVR.NS",
    "ITC.NS",
    "SBIN.NS",
    "BHARTIARTL.NS",
    "KOTAKBANK.NS",
    "LT.NS",
    "AXISBANK.NS",
    "ASIANPAINT.NS",
    "MARUTI.NS",
    "SUNPHARMA.NS",
    "TITAN.NS",
    "BAJFINANCE.NS",
    "ULTRACEMCO.NS",
    "WIPRO.NS",
    "NESTLEIND.NS",
    "HCLTECH.NS",
    "TATAMOTORS.NS",
    "TATASTEEL.NS",
    "POWERGRID.NS",
    "NTPC.NS",
    "ONGC.NS",
    "ADANIENT.NS",
    "ADANIPORTS.NS",
    "JSWSTEEL.NS",
    "M&M.NS",
    "TECHM.NS",
    "COALINDIA.NS",
    "HINDALCO.NS",
    "DRREDDY.NS",
    "CIPLA.NS",
    "BAJAJFINSV.NS",
    "GRASIM.NS",
    "DIVISLAB.NS",
    "EICHERMOT.NS",
    "HEROMOTOCO.NS",
    "BRITANNIA.NS",
    "APOLLOHOSP.NS",
    "INDUSINDBK.NS",
    "BPCL.NS",
    "TATACONSUM.NS",
    "ZOMATO.NS",
    "DMART.NS",
    "PIDILITIND.NS",
    "HAVELLS.NS",
    "IRCTC.NS",
];

/// Keeps the symbols matching `pattern`; no pattern keeps everything.
pub fn filter_symbols(symbols: Vec<String>, pattern: Option<&str>) -> Result<Vec<String>> {
    let Some(pattern) = pattern else {
        return Ok(symbols);
    };

    let re = Regex::new(pattern)
        .with_context(|| format!("invalid symbol_filter {:?}", pattern))?;
    Ok(symbols.into_iter().filter(|s| re.is_match(s)).collect())
}

/// Ticker without the exchange suffix, as shown to the player.
pub fn display_name(symbol: &str) -> &str {
    symbol.strip_suffix(".NS").unwrap_or(symbol)
}

/// The playable pool: `symbols.json` from storage when present, otherwise the
/// built-in list, then narrowed by the configured filter.
pub async fn load_catalog(
    storage: &AsyncStorageManager,
    filter: Option<&str>,
) -> Result<Vec<String>> {
    let symbols = match storage.load_optional::<Vec<String>>("symbols").await? {
        Some(custom) => {
            info!(count = custom.len(), "using symbols.json catalog");
            custom
        }
        None => NSE_SYMBOLS.iter().map(|s| s.to_string()).collect(),
    };

    filter_symbols(symbols, filter)
}
