//! Domain tables and formatters
//!
//! Pure, stateless helpers consumed by the query engine and by views:
//! bucket tables for the filter panel, the performance taxonomy, category
//! extraction and USD formatting.

use crate::{
    constants::ALL_CATEGORIES,
    types::{CoinRecord, Performance, Range, SortField},
};
use std::collections::HashSet;

/// Price buckets, contiguous from 0 to +∞
pub fn price_ranges() -> Vec<Range> {
    vec![
        Range::new("Under $0.01", 0.0, 0.01),
        Range::new("$0.01 - $0.10", 0.01, 0.1),
        Range::new("$0.10 - $1.00", 0.1, 1.0),
        Range::new("$1.00 - $10.00", 1.0, 10.0),
        Range::new("$10.00 - $100.00", 10.0, 100.0),
        Range::new("$100.00+", 100.0, f64::INFINITY),
    ]
}

/// Market cap buckets, contiguous from 0 to +∞
pub fn market_cap_ranges() -> Vec<Range> {
    vec![
        Range::new("Under $100M", 0.0, 1e8),
        Range::new("$100M - $1B", 1e8, 1e9),
        Range::new("$1B - $10B", 1e9, 1e10),
        Range::new("$10B - $50B", 1e10, 5e10),
        Range::new("$50B - $100B", 5e10, 1e11),
        Range::new("$100B - $1T", 1e11, 1e12),
        Range::new("$1T+", 1e12, f64::INFINITY),
    ]
}

/// 24h volume buckets, contiguous from 0 to +∞
pub fn volume_ranges() -> Vec<Range> {
    vec![
        Range::new("Under $100K", 0.0, 1e5),
        Range::new("$100K - $1M", 1e5, 1e6),
        Range::new("$1M - $10M", 1e6, 1e7),
        Range::new("$10M - $100M", 1e7, 1e8),
        Range::new("$100M - $1B", 1e8, 1e9),
        Range::new("$1B+", 1e9, f64::INFINITY),
    ]
}

/// Value/label pair for a selectable option
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption<T> {
    pub value: T,
    pub label: &'static str,
}

/// Performance classes offered by the filter panel
pub fn performance_options() -> Vec<SelectOption<Performance>> {
    vec![
        SelectOption {
            value: Performance::All,
            label: "All Coins",
        },
        SelectOption {
            value: Performance::Gainers,
            label: "Top Gainers",
        },
        SelectOption {
            value: Performance::Losers,
            label: "Top Losers",
        },
        SelectOption {
            value: Performance::Stable,
            label: "Stable Coins",
        },
    ]
}

/// Sort fields offered by the sorting controls
pub fn sorting_options() -> Vec<SelectOption<SortField>> {
    vec![
        SelectOption {
            value: SortField::MarketCap,
            label: "Market Cap",
        },
        SelectOption {
            value: SortField::CurrentPrice,
            label: "Price",
        },
        SelectOption {
            value: SortField::PriceChange24h,
            label: "24h Change",
        },
        SelectOption {
            value: SortField::TotalVolume,
            label: "Volume",
        },
        SelectOption {
            value: SortField::MarketCapRank,
            label: "Rank",
        },
    ]
}

/// Distinct categories across `coins`, sorted, with `"All"` first
///
/// Names are trimmed and blanks dropped. Duplicates are detected ignoring
/// case; the first spelling encountered is kept.
pub fn unique_categories(coins: &[CoinRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut categories: Vec<String> = Vec::new();

    for category in coins.iter().filter_map(|c| c.categories.as_ref()).flatten() {
        let trimmed = category.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            categories.push(trimmed.to_string());
        }
    }

    categories.sort();

    let mut result = Vec::with_capacity(categories.len() + 1);
    result.push(ALL_CATEGORIES.to_string());
    result.extend(categories);
    result
}

/// Sign of a percentage change, for arrow/colour choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirection {
    Up,
    Down,
    Unknown,
}

/// Zero counts as up; missing or NaN is unknown
pub fn change_direction(change: Option<f64>) -> ChangeDirection {
    match change {
        Some(c) if c.is_nan() => ChangeDirection::Unknown,
        Some(c) if c >= 0.0 => ChangeDirection::Up,
        Some(_) => ChangeDirection::Down,
        None => ChangeDirection::Unknown,
    }
}

/// Formats a USD amount with thousands separators and two decimals, e.g. `$1,234.56`
pub fn format_price(value: f64) -> String {
    if value.is_nan() {
        return "$NaN".to_string();
    }
    let sign = if value.is_sign_negative() && value != 0.0 { "-" } else { "" };
    if value.is_infinite() {
        return format!("{}$∞", sign);
    }

    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let digits = int_part.as_bytes();
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit as char);
    }

    format!("{}${}.{}", sign, grouped, frac_part)
}

/// Compact USD for large amounts (`$ 1.23T`, `$ 4.56B`, `$ 7.89M`), else `format_price`
///
/// Used for both market cap and volume columns.
pub fn format_compact_usd(value: f64) -> String {
    if value >= 1e12 {
        format!("$ {:.2}T", value / 1e12)
    } else if value >= 1e9 {
        format!("$ {:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("$ {:.2}M", value / 1e6)
    } else {
        format_price(value)
    }
}
