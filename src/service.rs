//! Market data service
//!
//! Typed accessors over CoinGecko and GeckoTerminal. Each accessor binds an
//! endpoint-specific cache TTL and retry budget, delegates to a
//! [`RateLimitedFetcher`], and normalizes the response shape at this
//! boundary. Failures are returned, never replaced with placeholder data.

use crate::{
    chart::PriceHistory,
    config::FetcherConfig,
    constants::{
        COIN_DETAIL_TTL_MS, COIN_RETRIES, DEFAULT_BACKOFF_MS, DEFAULT_POOL_LIMIT, DEFAULT_RETRIES,
        GLOBAL_STATS_TTL_MS, HEAVY_BACKOFF_MS, HISTORY_TTL_MS, INTRADAY_HISTORY_TTL_MS,
        MARKETS_TTL_MS, NETWORKS_TTL_MS, POOLS_TTL_MS, POOL_RETRIES, SPARKLINE_TTL_MS,
        TRENDING_TTL_MS,
    },
    error::{ConfigError, FetchError},
    fetcher::{FetchPolicy, RateLimitedFetcher},
    types::{ChangeHorizon, CoinRecord},
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Span of a price history request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartRange {
    Days(u32),
    Max,
}

impl ChartRange {
    /// Exactly one day: hourly granularity, shorter cache
    pub fn is_intraday(&self) -> bool {
        matches!(self, ChartRange::Days(1))
    }

    fn interval(&self) -> &'static str {
        if self.is_intraday() {
            "hourly"
        } else {
            "auto"
        }
    }

    fn ttl(&self) -> Duration {
        if self.is_intraday() {
            Duration::from_millis(INTRADAY_HISTORY_TTL_MS)
        } else {
            Duration::from_millis(HISTORY_TTL_MS)
        }
    }
}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartRange::Days(d) => write!(f, "{}", d),
            ChartRange::Max => f.write_str("max"),
        }
    }
}

const COIN_DETAIL_QUERY: &str = concat!(
    "?localization=false&tickers=true&market_data=true",
    "&community_data=true&developer_data=true&sparkline=true"
);

/// Sort order for `/coins/markets`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketOrder {
    MarketCapDesc,
    Change24hDesc,
    CreatedDesc,
}

impl MarketOrder {
    fn as_str(&self) -> &'static str {
        match self {
            MarketOrder::MarketCapDesc => "market_cap_desc",
            MarketOrder::Change24hDesc => "price_change_percentage_24h_desc",
            MarketOrder::CreatedDesc => "created_desc",
        }
    }
}

fn markets_query(
    order: MarketOrder,
    limit: u32,
    sparkline: bool,
    horizons: &[ChangeHorizon],
) -> String {
    let changes = horizons
        .iter()
        .map(|h| h.as_str())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "?vs_currency=usd&order={}&per_page={}&page=1&sparkline={}\
         &price_change_percentage={}&locale=en",
        order.as_str(),
        limit,
        sparkline,
        changes
    )
}

fn policy(
    ttl_ms: u64,
    retries: u32,
    backoff_ms: u64,
    cancel: Option<CancellationToken>,
) -> FetchPolicy {
    FetchPolicy::with_ttl(Duration::from_millis(ttl_ms))
        .retries(retries)
        .backoff(Duration::from_millis(backoff_ms))
        .cancel(cancel)
}

/// Accepts a bare array or `{ "data": [...] }`
pub fn normalize_list(payload: &Value) -> Result<Vec<Value>, FetchError> {
    match payload {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(FetchError::invalid_response(
                "expected an array or an object with a `data` array",
            )),
        },
        _ => Err(FetchError::invalid_response(format!(
            "expected a list payload, got {}",
            json_kind(payload)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parses a markets list into coin records; rows that fail to parse are skipped
pub fn parse_coins(payload: &Value) -> Result<Vec<CoinRecord>, FetchError> {
    let rows = normalize_list(payload)?;
    let total = rows.len();

    let coins: Vec<CoinRecord> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<CoinRecord>(row) {
            Ok(coin) => Some(coin),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed coin row");
                None
            }
        })
        .collect();

    if coins.len() < total {
        tracing::debug!(
            parsed = coins.len(),
            total,
            "Parsed markets payload with skipped rows"
        );
    }

    Ok(coins)
}

/// Market data service
///
/// Owns one fetcher per upstream API, so cache, de-duplication and pacing
/// state live in this instance rather than in globals. Build one per
/// application and share it by reference (or clone; clones share state).
///
/// # Example
/// ```no_run
/// use coin_market_sdk::{engine, FilterSpec, MarketService, Performance, SortSpec};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = MarketService::new()?;
/// let coins = service.top_coins(100, None).await?;
///
/// let filter = FilterSpec { performance: Performance::Gainers, ..FilterSpec::default() };
/// for coin in engine::apply(&coins, &filter, "", &SortSpec::none()) {
///     println!("{}: {:?}", coin.id, coin.price_change_percentage_24h);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MarketService {
    coingecko: RateLimitedFetcher,
    geckoterminal: RateLimitedFetcher,
}

impl MarketService {
    /// Creates a service from environment-aware defaults
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_configs(FetcherConfig::coingecko_from_env(), FetcherConfig::geckoterminal())
    }

    /// Creates a service with explicit upstream configurations
    pub fn with_configs(
        coingecko: FetcherConfig,
        geckoterminal: FetcherConfig,
    ) -> Result<Self, ConfigError> {
        tracing::info!(
            coingecko_url = %coingecko.base_url,
            geckoterminal_url = %geckoterminal.base_url,
            api_key = coingecko.api_key.is_some(),
            "Starting market data service"
        );

        Ok(Self::with_fetchers(
            RateLimitedFetcher::new(coingecko)?,
            RateLimitedFetcher::new(geckoterminal)?,
        ))
    }

    /// Creates a service from prebuilt fetchers
    ///
    /// This is primarily for testing with mock transports.
    pub fn with_fetchers(
        coingecko: RateLimitedFetcher,
        geckoterminal: RateLimitedFetcher,
    ) -> Self {
        Self {
            coingecko,
            geckoterminal,
        }
    }

    /// The CoinGecko fetcher
    pub fn coingecko(&self) -> &RateLimitedFetcher {
        &self.coingecko
    }

    /// The GeckoTerminal fetcher
    pub fn geckoterminal(&self) -> &RateLimitedFetcher {
        &self.geckoterminal
    }

    /// Global market aggregates (the `data` object of `/global`)
    pub async fn global_stats(
        &self,
        cancel: Option<CancellationToken>,
    ) -> Result<Value, FetchError> {
        let policy = policy(GLOBAL_STATS_TTL_MS, 3, DEFAULT_BACKOFF_MS, cancel);
        let payload = self.coingecko.fetch("/global", "", &policy).await?;

        Ok(payload.get("data").cloned().unwrap_or_else(|| (*payload).clone()))
    }

    async fn markets(
        &self,
        order: MarketOrder,
        limit: u32,
        sparkline: bool,
        horizons: &[ChangeHorizon],
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<CoinRecord>, FetchError> {
        let query = markets_query(order, limit, sparkline, horizons);
        let policy = policy(MARKETS_TTL_MS, DEFAULT_RETRIES, DEFAULT_BACKOFF_MS, cancel);
        let payload = self.coingecko.fetch("/coins/markets", &query, &policy).await?;

        parse_coins(&payload)
    }

    /// Top coins by market cap, with sparkline and every change horizon
    pub async fn top_coins(
        &self,
        limit: u32,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<CoinRecord>, FetchError> {
        self.markets(MarketOrder::MarketCapDesc, limit, true, ChangeHorizon::all(), cancel)
            .await
    }

    /// Coins with the largest 24h gains, as ordered upstream
    pub async fn top_gainers(
        &self,
        limit: u32,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<CoinRecord>, FetchError> {
        self.markets(MarketOrder::Change24hDesc, limit, false, &[ChangeHorizon::OneDay], cancel)
            .await
    }

    /// Most recently listed coins
    pub async fn recently_added(
        &self,
        limit: u32,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<CoinRecord>, FetchError> {
        self.markets(MarketOrder::CreatedDesc, limit, false, &[ChangeHorizon::OneDay], cancel)
            .await
    }

    /// Trending search results, raw
    pub async fn trending_coins(
        &self,
        cancel: Option<CancellationToken>,
    ) -> Result<Arc<Value>, FetchError> {
        let policy = policy(TRENDING_TTL_MS, DEFAULT_RETRIES, DEFAULT_BACKOFF_MS, cancel);
        self.coingecko.fetch("/search/trending", "", &policy).await
    }

    /// Full coin detail (tickers, market, community and developer data), raw
    pub async fn coin_detail(
        &self,
        id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Arc<Value>, FetchError> {
        let endpoint = format!("/coins/{}", urlencoding::encode(id));
        let query = COIN_DETAIL_QUERY;
        let policy = policy(COIN_DETAIL_TTL_MS, COIN_RETRIES, HEAVY_BACKOFF_MS, cancel);

        self.coingecko.fetch(&endpoint, query, &policy).await
    }

    /// Seven days of daily prices, for sparklines
    pub async fn sparkline(
        &self,
        id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<PriceHistory, FetchError> {
        let endpoint = format!("/coins/{}/market_chart", urlencoding::encode(id));
        let policy = policy(SPARKLINE_TTL_MS, COIN_RETRIES, HEAVY_BACKOFF_MS, cancel);
        let payload = self
            .coingecko
            .fetch(&endpoint, "?vs_currency=usd&days=7&interval=daily", &policy)
            .await?;

        Ok(PriceHistory::from_payload(&payload))
    }

    /// Price history; hourly and cached for 3 minutes when intraday, otherwise auto and 10 minutes
    pub async fn price_history(
        &self,
        id: &str,
        range: ChartRange,
        currency: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<PriceHistory, FetchError> {
        let endpoint = format!("/coins/{}/market_chart", urlencoding::encode(id));
        let query = format!(
            "?vs_currency={}&days={}&interval={}",
            urlencoding::encode(currency),
            range,
            range.interval()
        );
        let policy = FetchPolicy::with_ttl(range.ttl())
            .retries(COIN_RETRIES)
            .backoff(Duration::from_millis(HEAVY_BACKOFF_MS))
            .cancel(cancel);

        let payload = self.coingecko.fetch(&endpoint, &query, &policy).await?;
        Ok(PriceHistory::from_payload(&payload))
    }

    /// Market chart with automatic granularity
    pub async fn market_chart(
        &self,
        id: &str,
        days: u32,
        currency: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<PriceHistory, FetchError> {
        let endpoint = format!("/coins/{}/market_chart", urlencoding::encode(id));
        let query = format!(
            "?vs_currency={}&days={}&interval=auto",
            urlencoding::encode(currency),
            days
        );
        let policy = policy(COIN_DETAIL_TTL_MS, COIN_RETRIES, HEAVY_BACKOFF_MS, cancel);

        let payload = self.coingecko.fetch(&endpoint, &query, &policy).await?;
        Ok(PriceHistory::from_payload(&payload))
    }

    /// Networks supported by GeckoTerminal
    pub async fn supported_networks(
        &self,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Value>, FetchError> {
        let policy = policy(NETWORKS_TTL_MS, POOL_RETRIES, DEFAULT_BACKOFF_MS, cancel);
        let payload = self.geckoterminal.fetch("/networks", "", &policy).await?;

        normalize_list(&payload)
    }

    /// Trending pools across all networks
    pub async fn trending_pools(
        &self,
        limit: Option<u32>,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Value>, FetchError> {
        let query = format!("?limit={}", limit.unwrap_or(DEFAULT_POOL_LIMIT));
        let policy = policy(POOLS_TTL_MS, POOL_RETRIES, DEFAULT_BACKOFF_MS, cancel);
        let payload = self
            .geckoterminal
            .fetch("/networks/trending_pools", &query, &policy)
            .await?;

        normalize_list(&payload)
    }

    /// Top pools for a token contract on one network
    pub async fn top_pools_by_token(
        &self,
        network: &str,
        token_address: &str,
        limit: Option<u32>,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Value>, FetchError> {
        let endpoint = format!(
            "/networks/{}/tokens/{}/pools",
            urlencoding::encode(network),
            urlencoding::encode(token_address)
        );
        let query = format!("?limit={}", limit.unwrap_or(DEFAULT_POOL_LIMIT));
        let policy = policy(POOLS_TTL_MS, POOL_RETRIES, DEFAULT_BACKOFF_MS, cancel);

        let payload = self.geckoterminal.fetch(&endpoint, &query, &policy).await?;
        normalize_list(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine,
        transport::mock::MockTransport,
        types::{FilterSpec, Performance, SortDirection, SortField, SortSpec},
    };
    use serde_json::json;

    const CG: &str = "http://cg";
    const GT: &str = "http://gt";

    fn setup() -> (MarketService, Arc<MockTransport>, Arc<MockTransport>) {
        let cg = Arc::new(MockTransport::new());
        let gt = Arc::new(MockTransport::new());
        let service = MarketService::with_fetchers(
            RateLimitedFetcher::with_transport(
                FetcherConfig::coingecko().with_base_url(CG),
                cg.clone(),
            ),
            RateLimitedFetcher::with_transport(
                FetcherConfig::geckoterminal().with_base_url(GT),
                gt.clone(),
            ),
        );
        (service, cg, gt)
    }

    fn top_coins_url(limit: u32) -> String {
        format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1\
             &sparkline=true&price_change_percentage=1h,24h,7d,30d,1y&locale=en",
            CG, limit
        )
    }

    fn market_row(id: &str, price: f64, change_24h: Option<f64>) -> Value {
        json!({
            "id": id,
            "symbol": id,
            "name": id.to_uppercase(),
            "current_price": price,
            "market_cap": price * 1e6,
            "total_volume": price * 1e4,
            "price_change_percentage_24h": change_24h,
            "sparkline_in_7d": { "price": [price, price] }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_coins_then_gainers() {
        let (service, cg, _) = setup();
        cg.push_json(
            &top_coins_url(100),
            json!([
                market_row("aaa", 1.0, Some(12.5)),
                market_row("bbb", 2.0, Some(-6.0)),
                market_row("ccc", 3.0, Some(5.0)),
                market_row("ddd", 4.0, None),
                market_row("eee", 5.0, Some(7.25)),
            ]),
        );

        let coins = service.top_coins(100, None).await.unwrap();
        assert_eq!(coins.len(), 5);

        let filter = FilterSpec {
            performance: Performance::Gainers,
            ..FilterSpec::default()
        };
        let gainers = engine::apply(
            &coins,
            &filter,
            "",
            &SortSpec::by(SortField::PriceChange24h, SortDirection::Desc),
        );

        let ids: Vec<&str> = gainers.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "eee"]);
        assert!(gainers
            .iter()
            .all(|c| c.price_change_percentage_24h.is_some_and(|p| p > 5.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_markets_accepts_wrapped_payload_and_skips_bad_rows() {
        let (service, cg, _) = setup();
        cg.push_json(
            &top_coins_url(3),
            json!({
                "data": [
                    market_row("aaa", 1.0, None),
                    { "symbol": "no-id" },
                    market_row("ccc", 3.0, None)
                ]
            }),
        );

        let coins = service.top_coins(3, None).await.unwrap();
        let ids: Vec<&str> = coins.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "ccc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_stats_unwraps_and_caches() {
        let (service, cg, _) = setup();
        cg.push_json(
            &format!("{}/global", CG),
            json!({ "data": { "active_cryptocurrencies": 13000 } }),
        );

        let stats = service.global_stats(None).await.unwrap();
        assert_eq!(stats["active_cryptocurrencies"], 13000);

        service.global_stats(None).await.unwrap();
        assert_eq!(cg.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_history_granularity() {
        let (service, cg, _) = setup();
        let chart = format!("{}/coins/bitcoin/market_chart", CG);
        let intraday = format!("{}?vs_currency=usd&days=1&interval=hourly", chart);
        let monthly = format!("{}?vs_currency=eur&days=30&interval=auto", chart);
        let max = format!("{}?vs_currency=usd&days=max&interval=auto", chart);
        cg.push_json(&intraday, json!({ "prices": [[1, 10.0], [2, 11.0]] }));
        cg.push_json(&monthly, json!({ "prices": [[1, 9.0]] }));
        cg.push_json(&max, json!({ "prices": [] }));

        let day = service
            .price_history("bitcoin", ChartRange::Days(1), "usd", None)
            .await
            .unwrap();
        let month = service
            .price_history("bitcoin", ChartRange::Days(30), "eur", None)
            .await
            .unwrap();
        let all = service
            .price_history("bitcoin", ChartRange::Max, "usd", None)
            .await
            .unwrap();

        assert_eq!(day.len(), 2);
        assert_eq!(month.len(), 1);
        assert!(all.is_empty());
        assert_eq!(cg.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intraday_history_expires_sooner() {
        let (service, cg, _) = setup();
        let chart = format!("{}/coins/eth/market_chart", CG);
        let intraday = format!("{}?vs_currency=usd&days=1&interval=hourly", chart);
        let weekly = format!("{}?vs_currency=usd&days=7&interval=auto", chart);
        cg.push_json(&intraday, json!({ "prices": [] }));
        cg.push_json(&weekly, json!({ "prices": [] }));

        service.price_history("eth", ChartRange::Days(1), "usd", None).await.unwrap();
        service.price_history("eth", ChartRange::Days(7), "usd", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(4 * 60)).await;

        service.price_history("eth", ChartRange::Days(1), "usd", None).await.unwrap();
        service.price_history("eth", ChartRange::Days(7), "usd", None).await.unwrap();

        assert_eq!(cg.calls_for(&intraday), 2);
        assert_eq!(cg.calls_for(&weekly), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coin_detail_errors_propagate() {
        let (service, cg, _) = setup();
        let url = format!("{}/coins/not-a-coin{}", CG, COIN_DETAIL_QUERY);
        cg.push_status(&url, 404, "Not Found");

        let err = service.coin_detail("not-a-coin", None).await.unwrap_err();
        assert_eq!(err, FetchError::upstream(404, "Not Found"));
        assert!(err.is_retryable_by_user());
    }

    #[tokio::test(start_paused = true)]
    async fn test_path_segments_are_encoded() {
        let (service, _, gt) = setup();
        let url = format!("{}/networks/eth/tokens/0xabc%2F..%2Fx/pools?limit=5", GT);
        gt.push_json(&url, json!({ "data": [{ "id": "eth_0xpool" }] }));

        let pools = service
            .top_pools_by_token("eth", "0xabc/../x", Some(5), None)
            .await
            .unwrap();
        assert_eq!(pools.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_listings_normalize_without_fallback() {
        let (service, _, gt) = setup();
        gt.push_json(
            &format!("{}/networks", GT),
            json!({ "data": [{ "id": "eth" }, { "id": "bsc" }] }),
        );
        gt.push_json(
            &format!("{}/networks/trending_pools?limit=10", GT),
            json!({ "message": "maintenance" }),
        );

        let networks = service.supported_networks(None).await.unwrap();
        assert_eq!(networks.len(), 2);

        let err = service.trending_pools(None, None).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accessor_cancellation() {
        let (service, cg, _) = setup();
        cg.set_latency(Duration::from_secs(5));
        cg.push_json(&format!("{}/search/trending", CG), json!({ "coins": [] }));

        let token = CancellationToken::new();
        let (result, _) = tokio::join!(service.trending_coins(Some(token.clone())), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            token.cancel();
        });

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(service.coingecko().in_flight_len(), 0);
    }

    #[test]
    fn test_bad_api_key_fails_construction() {
        let result = MarketService::with_configs(
            FetcherConfig::coingecko().with_api_key("key\twith\u{7f}control"),
            FetcherConfig::geckoterminal(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidHeader { .. })));
    }

    #[test]
    fn test_normalize_list_shapes() {
        assert_eq!(normalize_list(&json!([1, 2])).unwrap().len(), 2);
        assert_eq!(normalize_list(&json!({ "data": [] })).unwrap().len(), 0);
        assert!(normalize_list(&json!({ "data": {} })).is_err());
        assert!(normalize_list(&json!("nope")).is_err());
    }

    #[test]
    fn test_chart_range() {
        assert!(ChartRange::Days(1).is_intraday());
        assert!(!ChartRange::Days(7).is_intraday());
        assert!(!ChartRange::Days(0).is_intraday());
        assert_eq!(ChartRange::Days(0).interval(), "auto");
        assert!(!ChartRange::Max.is_intraday());
        assert_eq!(ChartRange::Max.to_string(), "max");
        assert_eq!(ChartRange::Days(1).ttl(), Duration::from_millis(INTRADAY_HISTORY_TTL_MS));
    }
}
