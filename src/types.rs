//! Types for coin records, filters and sorting

use crate::constants::{ALL_CATEGORIES, PERFORMANCE_THRESHOLD_PCT};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Horizon of a percentage price change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeHorizon {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "1y")]
    OneYear,
}

impl ChangeHorizon {
    /// Upstream query-string token for this horizon
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeHorizon::OneHour => "1h",
            ChangeHorizon::OneDay => "24h",
            ChangeHorizon::SevenDays => "7d",
            ChangeHorizon::ThirtyDays => "30d",
            ChangeHorizon::OneYear => "1y",
        }
    }

    /// All horizons, shortest first
    pub fn all() -> &'static [ChangeHorizon] {
        &[
            ChangeHorizon::OneHour,
            ChangeHorizon::OneDay,
            ChangeHorizon::SevenDays,
            ChangeHorizon::ThirtyDays,
            ChangeHorizon::OneYear,
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SparklineIn7d {
    #[serde(default)]
    price: Vec<f64>,
}

fn sparkline_prices<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<SparklineIn7d>::deserialize(deserializer)?;
    Ok(raw.map(|s| s.price))
}

/// One tradable asset, as returned by `/coins/markets`
///
/// Every field except `id` may be missing or null upstream. Percentage
/// changes stay `None` when absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoinRecord {
    pub id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub ath_change_percentage: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_7d_in_currency: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_30d_in_currency: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_1y_in_currency: Option<f64>,
    #[serde(default)]
    pub categories: Option<BTreeSet<String>>,
    #[serde(
        default,
        rename = "sparkline_in_7d",
        deserialize_with = "sparkline_prices",
        skip_serializing
    )]
    pub sparkline: Option<Vec<f64>>,
}

impl CoinRecord {
    /// Creates a record with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Percentage change for the given horizon
    pub fn change(&self, horizon: ChangeHorizon) -> Option<f64> {
        match horizon {
            ChangeHorizon::OneHour => self.price_change_percentage_1h_in_currency,
            ChangeHorizon::OneDay => self.price_change_percentage_24h,
            ChangeHorizon::SevenDays => self.price_change_percentage_7d_in_currency,
            ChangeHorizon::ThirtyDays => self.price_change_percentage_30d_in_currency,
            ChangeHorizon::OneYear => self.price_change_percentage_1y_in_currency,
        }
    }

    /// True when the record lists `category`
    pub fn has_category(&self, category: &str) -> bool {
        self.categories
            .as_ref()
            .is_some_and(|categories| categories.contains(category))
    }
}

/// Inclusive numeric range used by the filter panel
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub label: String,
    pub min: f64,
    /// May be `f64::INFINITY`
    pub max: f64,
}

impl Range {
    pub fn new(label: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            label: label.into(),
            min,
            max,
        }
    }

    /// True when `value` is present and within `[min, max]`
    pub fn contains(&self, value: Option<f64>) -> bool {
        value.is_some_and(|v| v >= self.min && v <= self.max)
    }
}

/// 24h performance class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Performance {
    #[default]
    All,
    /// 24h change above +5%
    Gainers,
    /// 24h change below -5%
    Losers,
    /// 24h change within -5%..=+5%
    Stable,
}

impl Performance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Performance::All => "all",
            Performance::Gainers => "gainers",
            Performance::Losers => "losers",
            Performance::Stable => "stable",
        }
    }

    /// Whether a 24h change falls in this class; a missing change only matches `All`
    pub fn matches(&self, change_24h: Option<f64>) -> bool {
        let threshold = PERFORMANCE_THRESHOLD_PCT;
        match (self, change_24h) {
            (Performance::All, _) => true,
            (_, None) => false,
            (Performance::Gainers, Some(c)) => c > threshold,
            (Performance::Losers, Some(c)) => c < -threshold,
            (Performance::Stable, Some(c)) => (-threshold..=threshold).contains(&c),
        }
    }
}

impl FromStr for Performance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Performance::All),
            "gainers" => Ok(Performance::Gainers),
            "losers" => Ok(Performance::Losers),
            "stable" => Ok(Performance::Stable),
            other => Err(format!("Unknown performance class: {}", other)),
        }
    }
}

/// Active filter, replaced wholesale on every change
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Category name, or `"All"`
    pub category: String,
    pub price_range: Option<Range>,
    pub market_cap_range: Option<Range>,
    pub volume_range: Option<Range>,
    pub performance: Performance,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            price_range: None,
            market_cap_range: None,
            volume_range: None,
            performance: Performance::All,
        }
    }
}

impl FilterSpec {
    /// True when no stage would remove anything
    pub fn is_identity(&self) -> bool {
        self.category_filter().is_none()
            && self.price_range.is_none()
            && self.market_cap_range.is_none()
            && self.volume_range.is_none()
            && self.performance == Performance::All
    }

    /// Category to filter on, if any
    pub fn category_filter(&self) -> Option<&str> {
        let category = self.category.as_str();
        (!category.is_empty() && category != ALL_CATEGORIES).then_some(category)
    }
}

/// Coin attribute a list can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    Symbol,
    Name,
    CurrentPrice,
    MarketCap,
    TotalVolume,
    MarketCapRank,
    AthChangePercentage,
    #[serde(rename = "price_change_percentage_1h_in_currency")]
    PriceChange1h,
    #[serde(rename = "price_change_percentage_24h")]
    PriceChange24h,
    #[serde(rename = "price_change_percentage_7d_in_currency")]
    PriceChange7d,
    #[serde(rename = "price_change_percentage_30d_in_currency")]
    PriceChange30d,
    #[serde(rename = "price_change_percentage_1y_in_currency")]
    PriceChange1y,
}

/// Value a record exposes for sorting
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey<'a> {
    Number(f64),
    Text(&'a str),
}

impl SortField {
    /// JSON key naming this field
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Symbol => "symbol",
            SortField::Name => "name",
            SortField::CurrentPrice => "current_price",
            SortField::MarketCap => "market_cap",
            SortField::TotalVolume => "total_volume",
            SortField::MarketCapRank => "market_cap_rank",
            SortField::AthChangePercentage => "ath_change_percentage",
            SortField::PriceChange1h => "price_change_percentage_1h_in_currency",
            SortField::PriceChange24h => "price_change_percentage_24h",
            SortField::PriceChange7d => "price_change_percentage_7d_in_currency",
            SortField::PriceChange30d => "price_change_percentage_30d_in_currency",
            SortField::PriceChange1y => "price_change_percentage_1y_in_currency",
        }
    }

    /// Sort key of `coin`; missing numbers read as 0, missing strings as ""
    pub fn key<'a>(&self, coin: &'a CoinRecord) -> SortKey<'a> {
        let number = |v: Option<f64>| SortKey::Number(v.unwrap_or(0.0));
        match self {
            SortField::Id => SortKey::Text(&coin.id),
            SortField::Symbol => SortKey::Text(coin.symbol.as_deref().unwrap_or_default()),
            SortField::Name => SortKey::Text(coin.name.as_deref().unwrap_or_default()),
            SortField::CurrentPrice => number(coin.current_price),
            SortField::MarketCap => number(coin.market_cap),
            SortField::TotalVolume => number(coin.total_volume),
            SortField::MarketCapRank => number(coin.market_cap_rank.map(f64::from)),
            SortField::AthChangePercentage => number(coin.ath_change_percentage),
            SortField::PriceChange1h => number(coin.change(ChangeHorizon::OneHour)),
            SortField::PriceChange24h => number(coin.change(ChangeHorizon::OneDay)),
            SortField::PriceChange7d => number(coin.change(ChangeHorizon::SevenDays)),
            SortField::PriceChange30d => number(coin.change(ChangeHorizon::ThirtyDays)),
            SortField::PriceChange1y => number(coin.change(ChangeHorizon::OneYear)),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim() {
            "id" => SortField::Id,
            "symbol" => SortField::Symbol,
            "name" => SortField::Name,
            "current_price" => SortField::CurrentPrice,
            "market_cap" => SortField::MarketCap,
            "total_volume" => SortField::TotalVolume,
            "market_cap_rank" => SortField::MarketCapRank,
            "ath_change_percentage" => SortField::AthChangePercentage,
            "price_change_percentage_1h" | "price_change_percentage_1h_in_currency" => {
                SortField::PriceChange1h
            }
            "price_change_percentage_24h" | "price_change_percentage_24h_in_currency" => {
                SortField::PriceChange24h
            }
            "price_change_percentage_7d" | "price_change_percentage_7d_in_currency" => {
                SortField::PriceChange7d
            }
            "price_change_percentage_30d" | "price_change_percentage_30d_in_currency" => {
                SortField::PriceChange30d
            }
            "price_change_percentage_1y" | "price_change_percentage_1y_in_currency" => {
                SortField::PriceChange1y
            }
            other => return Err(format!("Unknown sort field: {}", other)),
        };
        Ok(field)
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Active sort; `field: None` keeps upstream order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: Option<SortField>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn by(field: SortField, direction: SortDirection) -> Self {
        Self {
            field: Some(field),
            direction,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_markets_row() {
        let coin: CoinRecord = serde_json::from_value(json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "image": "https://assets.coingecko.com/coins/images/1/large/bitcoin.png",
            "current_price": 67000.5,
            "market_cap": 1.3e12,
            "market_cap_rank": 1,
            "total_volume": 3.1e10,
            "ath_change_percentage": -8.2,
            "price_change_percentage_24h": 2.4,
            "price_change_percentage_1h_in_currency": -0.1,
            "price_change_percentage_7d_in_currency": null,
            "sparkline_in_7d": { "price": [1.0, 2.0, 3.0] }
        }))
        .unwrap();

        assert_eq!(coin.symbol.as_deref(), Some("btc"));
        assert_eq!(coin.market_cap_rank, Some(1));
        assert_eq!(coin.change(ChangeHorizon::OneDay), Some(2.4));
        assert_eq!(coin.change(ChangeHorizon::OneHour), Some(-0.1));
        assert_eq!(coin.change(ChangeHorizon::SevenDays), None);
        assert_eq!(coin.change(ChangeHorizon::OneYear), None);
        assert_eq!(coin.sparkline, Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_deserialize_sparse_row() {
        let coin: CoinRecord = serde_json::from_value(json!({
            "id": "mystery",
            "current_price": null,
            "categories": ["Meme", "Meme", "DeFi"]
        }))
        .unwrap();

        assert_eq!(coin.current_price, None);
        assert!(coin.has_category("Meme"));
        assert_eq!(coin.categories.as_ref().map(|c| c.len()), Some(2));
        assert!(coin.sparkline.is_none());
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = Range::new("$1.00 - $10.00", 1.0, 10.0);
        assert!(range.contains(Some(1.0)));
        assert!(range.contains(Some(10.0)));
        assert!(!range.contains(Some(10.01)));
        assert!(!range.contains(None));

        let open = Range::new("$100.00+", 100.0, f64::INFINITY);
        assert!(open.contains(Some(1e15)));
    }

    #[test]
    fn test_performance_boundaries() {
        assert!(Performance::Gainers.matches(Some(5.01)));
        assert!(!Performance::Gainers.matches(Some(5.0)));
        assert!(Performance::Losers.matches(Some(-5.01)));
        assert!(!Performance::Losers.matches(Some(-5.0)));
        assert!(Performance::Stable.matches(Some(5.0)));
        assert!(Performance::Stable.matches(Some(-5.0)));
        assert!(!Performance::Stable.matches(None));
        assert!(Performance::All.matches(None));
        assert_eq!("Gainers".parse::<Performance>(), Ok(Performance::Gainers));
    }

    #[test]
    fn test_sort_field_parsing() {
        assert_eq!("market_cap".parse::<SortField>(), Ok(SortField::MarketCap));
        assert_eq!(
            "price_change_percentage_24h".parse::<SortField>(),
            Ok(SortField::PriceChange24h)
        );
        assert!("favorite_color".parse::<SortField>().is_err());
        assert_eq!(SortField::TotalVolume.to_string(), "total_volume");
    }

    #[test]
    fn test_default_filter_is_identity() {
        let filter = FilterSpec::default();
        assert!(filter.is_identity());
        assert_eq!(filter.category_filter(), None);

        let filter = FilterSpec {
            category: "DeFi".to_string(),
            ..FilterSpec::default()
        };
        assert_eq!(filter.category_filter(), Some("DeFi"));
    }
}
