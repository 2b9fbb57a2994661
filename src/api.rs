//! JSON shape handed to whatever draws the round.

use crate::round::{Round, RoundError};
use serde::Serialize;
use tracing::error;

pub const EXHAUSTED_MESSAGE: &str = "Failed to find dramatic stock moves after retries";
pub const INTERNAL_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RoundResponse {
    Round(Round),
    Failure { error: String },
}

impl RoundResponse {
    /// Exhausted retries keep their own message so the caller can offer
    /// "try again"; anything else collapses to a generic internal error.
    pub fn from_result(result: anyhow::Result<Round>) -> Self {
        match result {
            Ok(round) => RoundResponse::Round(round),
            Err(e) => {
                let message = match e.downcast_ref::<RoundError>() {
                    Some(RoundError::Exhausted { .. }) => EXHAUSTED_MESSAGE,
                    _ => {
                        error!("round request failed: {:#}", e);
                        INTERNAL_MESSAGE
                    }
                };
                RoundResponse::Failure {
                    error: message.to_string(),
                }
            }
        }
    }

    /// HTTP-style status for the response.
    pub fn status(&self) -> u16 {
        match self {
            RoundResponse::Round(_) => 200,
            RoundResponse::Failure { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dramatic_moves::tests::jump_at_60;
    use crate::quotes::tests::series;
    use crate::round::build_round;
    use crate::storage_utils::SelectionConfig;
    use anyhow::anyhow;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::Value;

    #[test]
    fn success_uses_camel_case_fields() {
        let mut rng = StdRng::seed_from_u64(2);
        let round = build_round(
            "INFY.NS",
            &series(&jump_at_60()),
            &SelectionConfig::default(),
            &mut rng,
        )
        .unwrap();

        let response = RoundResponse::from_result(Ok(round));
        assert_eq!(response.status(), 200);

        let json: Value = serde_json::to_value(&response).unwrap();
        assert_eq!(json["symbol"], "INFY.NS");
        assert_eq!(json["outcome"], "BULLISH");
        assert_eq!(json["dramaticMove"], true);
        assert_eq!(json["visibleData"].as_array().unwrap().len(), 60);
        assert_eq!(json["futureData"].as_array().unwrap().len(), 7);
        assert_eq!(json["futureData"][0]["time"], "2024-03-01");
        assert_eq!(json["futureData"][6]["close"], 110.0);
        assert!(json["percentChange"].as_f64().unwrap() > 9.99);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn exhausted_retries_have_their_own_message() {
        let err = anyhow::Error::from(RoundError::Exhausted { attempts: 15 });
        let response = RoundResponse::from_result(Err(err));
        assert_eq!(response.status(), 500);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "error": EXHAUSTED_MESSAGE }));
    }

    #[test]
    fn other_errors_are_internal() {
        let response = RoundResponse::from_result(Err(anyhow!("disk full")));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"], INTERNAL_MESSAGE);

        let empty = anyhow::Error::from(RoundError::EmptyCatalog);
        let json = serde_json::to_value(RoundResponse::from_result(Err(empty))).unwrap();
        assert_eq!(json["error"], INTERNAL_MESSAGE);
    }
}
