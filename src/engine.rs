//! Client-side filter, search and sort over an in-memory coin list
//!
//! Everything here is synchronous and total: missing fields never panic,
//! they fail filters and read as `0` / `""` for sorting and search. Inputs
//! are never mutated; every function returns a new vector.

use crate::{
    constants::DEFAULT_SUGGESTIONS,
    types::{
        ChangeHorizon, CoinRecord, FilterSpec, Range, SortDirection, SortField, SortKey, SortSpec,
    },
};
use std::cmp::Ordering;

/// Suggestion score for an exact symbol match
pub const SCORE_EXACT_SYMBOL: u32 = 1000;
/// Suggestion score for a symbol starting with the query
pub const SCORE_SYMBOL_PREFIX: u32 = 500;
/// Suggestion score for a name starting with the query
pub const SCORE_NAME_PREFIX: u32 = 300;
/// Suggestion score for a symbol containing the query
pub const SCORE_SYMBOL_SUBSTRING: u32 = 200;
/// Suggestion score for a name containing the query
pub const SCORE_NAME_SUBSTRING: u32 = 100;

/// Produces the displayed list: search, category, ranges, performance, then sort
///
/// # Arguments
/// * `coins` - Upstream records, in upstream order
/// * `filter` - Active filter
/// * `query` - Free-text search; ignored when blank
/// * `sort` - Active sort; `field: None` keeps upstream order
pub fn apply(
    coins: &[CoinRecord],
    filter: &FilterSpec,
    query: &str,
    sort: &SortSpec,
) -> Vec<CoinRecord> {
    let needle = (!query.trim().is_empty()).then(|| query.to_lowercase());

    let mut result: Vec<CoinRecord> = if needle.is_none() && filter.is_identity() {
        coins.to_vec()
    } else {
        coins
            .iter()
            .filter(|coin| needle.as_deref().map_or(true, |n| matches_query(coin, n)))
            .filter(|coin| matches_filter(coin, filter))
            .cloned()
            .collect()
    };

    if let Some(field) = sort.field {
        sort_records(&mut result, field, sort.direction);
    }

    result
}

/// Lower-cased name or symbol contains `needle` (already lower-cased)
pub fn matches_query(coin: &CoinRecord, needle: &str) -> bool {
    let contains =
        |s: &Option<String>| s.as_deref().is_some_and(|v| v.to_lowercase().contains(needle));
    contains(&coin.name) || contains(&coin.symbol)
}

/// Category, range and performance stages of the filter
pub fn matches_filter(coin: &CoinRecord, filter: &FilterSpec) -> bool {
    if let Some(category) = filter.category_filter() {
        if !coin.has_category(category) {
            return false;
        }
    }

    let in_range = |range: &Option<Range>, value: Option<f64>| {
        range.as_ref().map_or(true, |r| r.contains(value))
    };

    in_range(&filter.price_range, coin.current_price)
        && in_range(&filter.market_cap_range, coin.market_cap)
        && in_range(&filter.volume_range, coin.total_volume)
        && filter.performance.matches(coin.change(ChangeHorizon::OneDay))
}

/// Stable in-place sort by `field`
pub fn sort_records(coins: &mut [CoinRecord], field: SortField, direction: SortDirection) {
    coins.sort_by(|a, b| {
        let ordering = compare_keys(&field.key(a), &field.key(b));
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn compare_keys(a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
    match (a, b) {
        (SortKey::Number(x), SortKey::Number(y)) => or_zero(*x).total_cmp(&or_zero(*y)),
        (SortKey::Text(x), SortKey::Text(y)) => compare_text(x, y),
        _ => Ordering::Equal,
    }
}

/// NaN sorts like a missing number
fn or_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// Case-insensitive first, lowercase before uppercase on ties
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// Relevance of `coin` for a lower-cased query; 0 means no match
pub fn suggestion_score(coin: &CoinRecord, needle: &str) -> u32 {
    let symbol = coin.symbol.as_deref().unwrap_or_default().to_lowercase();
    let name = coin.name.as_deref().unwrap_or_default().to_lowercase();

    if symbol == needle {
        SCORE_EXACT_SYMBOL
    } else if symbol.starts_with(needle) {
        SCORE_SYMBOL_PREFIX
    } else if name.starts_with(needle) {
        SCORE_NAME_PREFIX
    } else if symbol.contains(needle) {
        SCORE_SYMBOL_SUBSTRING
    } else if name.contains(needle) {
        SCORE_NAME_SUBSTRING
    } else {
        0
    }
}

/// Ranked autocomplete suggestions
///
/// Priority-ranked substring matching, not fuzzy matching: a record either
/// contains the query in its symbol or name, or it is not suggested.
/// `max_results` defaults to [`DEFAULT_SUGGESTIONS`].
pub fn suggest(coins: &[CoinRecord], query: &str, max_results: Option<usize>) -> Vec<CoinRecord> {
    let max_results = max_results.unwrap_or(DEFAULT_SUGGESTIONS);
    if query.is_empty() || max_results == 0 {
        return Vec::new();
    }
    let needle = query.to_lowercase();

    let mut scored: Vec<(u32, &CoinRecord)> = coins
        .iter()
        .filter_map(|coin| {
            let score = suggestion_score(coin, &needle);
            (score > 0).then_some((score, coin))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(max_results)
        .map(|(_, coin)| coin.clone())
        .collect()
}

/// Largest 24h gainers, derived locally from an already fetched list
///
/// Records without a 24h change are skipped.
pub fn top_movers(coins: &[CoinRecord], n: usize) -> Vec<CoinRecord> {
    let mut movers: Vec<CoinRecord> = coins
        .iter()
        .filter(|coin| coin.change(ChangeHorizon::OneDay).is_some_and(|c| !c.is_nan()))
        .cloned()
        .collect();

    sort_records(&mut movers, SortField::PriceChange24h, SortDirection::Desc);
    movers.truncate(n);
    movers
}
