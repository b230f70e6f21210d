//! # Coin Market SDK
//!
//! Data access for CoinGecko and GeckoTerminal market data, plus a pure
//! client-side engine for filtering, sorting and searching coin listings.
//!
//! ## Fetching
//!
//! Every request goes through a [`RateLimitedFetcher`], which layers a TTL
//! cache, in-flight request coalescing, a minimum gap between outbound
//! requests and 429-aware retries over an HTTP transport. [`MarketService`]
//! wraps one fetcher per upstream with typed accessors.
//!
//! ## Querying
//!
//! [`engine::apply`] runs search, filter and sort over a slice of
//! [`CoinRecord`]s without touching the network:
//!
//! ```no_run
//! use coin_market_sdk::{engine, FilterSpec, MarketService, SortDirection, SortField, SortSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = MarketService::new()?;
//! let coins = service.top_coins(100, None).await?;
//!
//! let sort = SortSpec::by(SortField::MarketCap, SortDirection::Desc);
//! for coin in engine::apply(&coins, &FilterSpec::default(), "eth", &sort) {
//!     println!("{} {:?}", coin.id, coin.current_price);
//! }
//!
//! for suggestion in engine::suggest(&coins, "bt", None) {
//!     println!("suggest: {}", suggestion.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod chart;
pub mod config;
pub mod constants;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod pacing;
pub mod service;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use chart::{ChartStats, PriceHistory, PricePoint};
pub use config::FetcherConfig;
pub use error::{ConfigError, FetchError};
pub use fetcher::{FetchPolicy, RateLimitedFetcher};
pub use metrics::FetchMetrics;
pub use service::{ChartRange, MarketService};
pub use transport::{HttpTransport, ReqwestTransport, TransportResponse};
pub use types::{
    ChangeHorizon, CoinRecord, FilterSpec, Performance, Range, SortDirection, SortField, SortSpec,
};
pub use tokio_util::sync::CancellationToken;
