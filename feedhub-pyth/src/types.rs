//! Pyth Hermes API response types
//!
//! These types mirror the `/v2/updates/price/latest` response and are
//! converted to feedhub-core types for use in the application.

use feedhub_core::PriceSample;
use serde::{Deserialize, Serialize};

/// Public Hermes endpoint
pub const HERMES_API_BASE: &str = "https://hermes.pyth.network";

/// Path of the latest price update endpoint
pub const LATEST_PRICES_PATH: &str = "/v2/updates/price/latest";

/// A price with its confidence interval
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriceQuote {
    /// Price as an integer string, scaled by `10^expo`
    pub price: String,
    /// Confidence interval, same scale as `price`
    pub conf: String,
    /// Decimal exponent
    pub expo: i32,
    /// Unix seconds
    pub publish_time: i64,
}

/// Slot metadata attached to a parsed update
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PriceMetadata {
    #[serde(default)]
    pub slot: Option<i64>,
    #[serde(default)]
    pub proof_available_time: Option<i64>,
    #[serde(default)]
    pub prev_publish_time: Option<i64>,
}

/// One parsed price update
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParsedPriceUpdate {
    /// Feed identifier (hex, without `0x`)
    pub id: String,
    pub price: PriceQuote,
    #[serde(default)]
    pub ema_price: Option<PriceQuote>,
    #[serde(default)]
    pub metadata: Option<PriceMetadata>,
}

impl ParsedPriceUpdate {
    /// Convert to the hub's sample type (spot price, not EMA)
    pub fn to_sample(&self) -> PriceSample {
        PriceSample::new(
            self.id.clone(),
            self.price.price.clone(),
            self.price.publish_time,
        )
    }
}

/// Encoded update data, kept for completeness
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinaryUpdate {
    pub encoding: String,
    pub data: Vec<String>,
}

/// Response of the latest price update endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatestPricesResponse {
    #[serde(default)]
    pub binary: Option<BinaryUpdate>,
    #[serde(default)]
    pub parsed: Vec<ParsedPriceUpdate>,
}

impl LatestPricesResponse {
    pub fn to_samples(&self) -> Vec<PriceSample> {
        self.parsed.iter().map(|update| update.to_sample()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_prices_response() {
        let json = r#"
        {
            "binary": {
                "encoding": "hex",
                "data": ["504e4155"]
            },
            "parsed": [
                {
                    "id": "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43",
                    "price": {
                        "price": "6512345678900",
                        "conf": "3456789",
                        "expo": -8,
                        "publish_time": 1718000000
                    },
                    "ema_price": {
                        "price": "6510000000000",
                        "conf": "3400000",
                        "expo": -8,
                        "publish_time": 1718000000
                    },
                    "metadata": {
                        "slot": 150000000,
                        "proof_available_time": 1718000001,
                        "prev_publish_time": 1717999999
                    }
                }
            ]
        }
        "#;

        let response: LatestPricesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.parsed.len(), 1);
        assert_eq!(response.parsed[0].price.expo, -8);

        let samples = response.to_samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(
            samples[0].id,
            "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43"
        );
        assert_eq!(samples[0].value, "6512345678900");
        assert_eq!(samples[0].timestamp, 1718000000);
    }

    #[test]
    fn test_parse_response_without_optional_sections() {
        let json = r#"{"parsed":[{"id":"ab","price":{"price":"1","conf":"0","expo":0,"publish_time":5}}]}"#;
        let response: LatestPricesResponse = serde_json::from_str(json).unwrap();
        assert!(response.binary.is_none());
        assert!(response.parsed[0].ema_price.is_none());
        assert_eq!(response.to_samples()[0].timestamp, 5);
    }
}
