//! Wires config, catalog and the quote provider into single round requests.

use crate::api::RoundResponse;
use crate::quotes::{QuoteProvider, YahooChartProvider};
use crate::round::{Round, RoundSelector};
use crate::storage_utils::{AppConfig, AsyncStorageManager};
use crate::symbols;
use anyhow::Result;
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::info;

/// Everything a round request needs, loaded once and shared read-only.
pub struct Game {
    pub config: AppConfig,
    symbols: Vec<String>,
    provider: Arc<dyn QuoteProvider>,
}

impl Game {
    /// Config and catalog from storage, quotes from Yahoo.
    pub async fn load(storage: &AsyncStorageManager) -> Result<Self> {
        let config: AppConfig = storage.load_or_init("config").await?;
        let symbols = symbols::load_catalog(storage, config.symbol_filter.as_deref()).await?;
        let provider = Arc::new(YahooChartProvider::new(&config.provider)?);

        info!(symbols = symbols.len(), "game loaded");

        Ok(Self::with_provider(config, symbols, provider))
    }

    pub fn with_provider(
        config: AppConfig,
        symbols: Vec<String>,
        provider: Arc<dyn QuoteProvider>,
    ) -> Self {
        Self {
            config,
            symbols,
            provider,
        }
    }

    /// One round, with fresh randomness per call.
    pub async fn next_round(&self) -> Result<Round> {
        let mut rng = StdRng::from_entropy();
        let selector = RoundSelector::new(
            self.provider.as_ref(),
            &self.config.selection,
            self.config.provider.history_days,
        );

        let round = selector
            .select(&self.symbols, Utc::now().date_naive(), &mut rng)
            .await?;
        Ok(round)
    }

    /// `count` independent requests run concurrently.
    pub async fn next_rounds(&self, count: usize) -> Vec<Result<Round>> {
        let requests = (0..count).map(|_| self.next_round());
        futures::future::join_all(requests).await
    }

    /// `count` requests shaped as the JSON records `chart-swipe round` prints.
    pub async fn round_responses(&self, count: usize) -> Vec<RoundResponse> {
        self.next_rounds(count)
            .await
            .into_iter()
            .map(RoundResponse::from_result)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EXHAUSTED_MESSAGE;
    use crate::dramatic_moves::tests::jump_at_60;
    use crate::quotes::tests::series;
    use crate::round::tests::FakeProvider;
    use std::sync::atomic::Ordering;

    fn catalog() -> Vec<String> {
        ["TCS.NS", "INFY.NS", "ITC.NS"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn concurrent_requests_each_build_a_round() {
        let mut fake = FakeProvider::default();
        for symbol in catalog() {
            fake.data.insert(symbol, series(&jump_at_60()));
        }
        let provider = Arc::new(fake);
        let game = Game::with_provider(AppConfig::default(), catalog(), provider.clone());

        let results = game.next_rounds(4).await;
        assert_eq!(results.len(), 4);
        for result in results {
            let round = result.unwrap();
            assert!(catalog().contains(&round.symbol));
            assert_eq!(round.visible_data.len(), 60);
            assert_eq!(round.future_data.len(), 7);
            assert!(round.dramatic_move);
        }

        // Every request fetched on its own; nothing was shared or cached.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failing_provider_maps_every_response_to_exhausted() {
        let provider = Arc::new(FakeProvider {
            fail_first: usize::MAX,
            ..FakeProvider::default()
        });
        let game = Game::with_provider(AppConfig::default(), catalog(), provider.clone());

        let responses = game.round_responses(3).await;
        assert_eq!(responses.len(), 3);
        for response in &responses {
            assert_eq!(response.status(), 500);
            let json = serde_json::to_value(response).unwrap();
            assert_eq!(json, serde_json::json!({ "error": EXHAUSTED_MESSAGE }));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3 * 15);
    }

    #[tokio::test]
    async fn successful_response_serializes_the_round() {
        let fake = FakeProvider::default().with("TCS.NS", series(&jump_at_60()));
        let symbols = vec!["TCS.NS".to_string()];
        let game = Game::with_provider(AppConfig::default(), symbols, Arc::new(fake));

        let responses = game.round_responses(1).await;
        assert_eq!(responses[0].status(), 200);
        let json = serde_json::to_value(&responses[0]).unwrap();
        assert_eq!(json["symbol"], "TCS.NS");
        assert_eq!(json["outcome"], "BULLISH");
        assert_eq!(json["futureData"].as_array().unwrap().len(), 7);
    }
}
