//! Constants for the coin market data layer
//!
//! Compile-time defaults for endpoints, pacing and per-accessor cache
//! policies are centralized here. Runtime overrides (API key, base URL)
//! go through [`crate::config::FetcherConfig`].

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// GeckoTerminal API base URL (DEX pools and networks)
pub const GECKOTERMINAL_API_URL: &str = "https://api.geckoterminal.com/api/v2";

/// Header carrying the CoinGecko demo API key
pub const COINGECKO_API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Environment variable holding the CoinGecko API key
pub const COINGECKO_API_KEY_ENV: &str = "COINGECKO_API_KEY";

/// Environment variable overriding the CoinGecko base URL (proxies, mirrors)
pub const COINGECKO_API_URL_ENV: &str = "COINGECKO_API_URL";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "coin-market-sdk/0.1.0";

/// HTTP request timeout (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Minimum gap between two outbound attempts, across all keys (in milliseconds)
///
/// Roughly 0.8 requests per second, under the free-tier throttle.
pub const MIN_GAP_MS: u64 = 1200;

/// Default cache TTL when a call site does not pick one (in milliseconds)
pub const DEFAULT_TTL_MS: u64 = 60_000;

/// Default number of retries on HTTP 429
pub const DEFAULT_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (in milliseconds)
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Upper bound (exclusive) of the random jitter added to computed backoff (in milliseconds)
pub const BACKOFF_JITTER_MS: u64 = 250;

/// Backoff base used by the heavier per-coin endpoints (in milliseconds)
pub const HEAVY_BACKOFF_MS: u64 = 1500;

/// Longest server-requested `Retry-After` wait honored, in seconds
pub const MAX_RETRY_AFTER_SECS: u64 = 300;

/// Global stats cache TTL (in milliseconds)
pub const GLOBAL_STATS_TTL_MS: u64 = 60_000;

/// Markets list cache TTL (in milliseconds)
pub const MARKETS_TTL_MS: u64 = 5 * 60 * 1000;

/// Trending coins cache TTL (in milliseconds)
pub const TRENDING_TTL_MS: u64 = 10 * 60 * 1000;

/// Coin detail cache TTL (in milliseconds)
pub const COIN_DETAIL_TTL_MS: u64 = 3 * 60 * 1000;

/// Seven-day sparkline chart cache TTL (in milliseconds)
pub const SPARKLINE_TTL_MS: u64 = 2 * 60 * 1000;

/// Intraday (one day) price history cache TTL (in milliseconds)
pub const INTRADAY_HISTORY_TTL_MS: u64 = 3 * 60 * 1000;

/// Multi-day price history cache TTL (in milliseconds)
pub const HISTORY_TTL_MS: u64 = 10 * 60 * 1000;

/// GeckoTerminal network list cache TTL (in milliseconds)
pub const NETWORKS_TTL_MS: u64 = 10 * 60 * 1000;

/// GeckoTerminal pool listings cache TTL (in milliseconds)
pub const POOLS_TTL_MS: u64 = 5 * 60 * 1000;

/// Retries for per-coin endpoints (detail, charts)
pub const COIN_RETRIES: u32 = 4;

/// Retries for GeckoTerminal listings
pub const POOL_RETRIES: u32 = 1;

/// Default number of pools requested from GeckoTerminal
pub const DEFAULT_POOL_LIMIT: u32 = 10;

/// Sentinel category meaning "no category filter"
pub const ALL_CATEGORIES: &str = "All";

/// 24h change threshold (percent) separating gainers/losers from stable coins
pub const PERFORMANCE_THRESHOLD_PCT: f64 = 5.0;

/// Default number of autocomplete suggestions
pub const DEFAULT_SUGGESTIONS: usize = 8;
