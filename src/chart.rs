//! Price history normalization
//!
//! `/coins/{id}/market_chart` returns three parallel `[[ms, value], ...]`
//! arrays. Charts want one row per timestamp.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// One chart row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// 0 when the volume series has no sample at this timestamp
    pub volume: f64,
    /// 0 when the market cap series has no sample at this timestamp
    pub market_cap: f64,
}

/// Summary of a price series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartStats {
    pub first: f64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    /// Percent change from first to last; `None` when the first price is 0
    pub change_pct: Option<f64>,
}

/// Normalized price history
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PriceHistory {
    pub points: Vec<PricePoint>,
}

/// Reads `[[ms, value], ...]`, skipping malformed pairs
fn read_series(payload: &Value, key: &str) -> Vec<(i64, f64)> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let pair = row.as_array()?;
                    let ts = pair.first()?.as_f64()? as i64;
                    let value = pair.get(1)?.as_f64()?;
                    Some((ts, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

impl PriceHistory {
    /// Builds a history from a market-chart payload
    ///
    /// A payload without a `prices` array yields an empty history.
    pub fn from_payload(payload: &Value) -> Self {
        let volumes: HashMap<i64, f64> =
            read_series(payload, "total_volumes").into_iter().collect();
        let market_caps: HashMap<i64, f64> =
            read_series(payload, "market_caps").into_iter().collect();

        let points = read_series(payload, "prices")
            .into_iter()
            .filter_map(|(ts, price)| {
                let timestamp = Utc.timestamp_millis_opt(ts).single()?;
                Some(PricePoint {
                    timestamp,
                    price,
                    volume: volumes.get(&ts).copied().unwrap_or(0.0),
                    market_cap: market_caps.get(&ts).copied().unwrap_or(0.0),
                })
            })
            .collect();

        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// First/last/min/max and percent change; `None` for an empty series
    pub fn stats(&self) -> Option<ChartStats> {
        let first = self.points.first()?.price;
        let last = self.points.last()?.price;

        let (min, max) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.price), hi.max(p.price))
            });

        let change_pct = (first != 0.0).then(|| (last - first) / first * 100.0);

        Some(ChartStats {
            first,
            last,
            min,
            max,
            change_pct,
        })
    }

    /// Prices only, oldest first (sparkline input)
    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }
}
