use coin_market_sdk::domain::{format_compact_usd, format_price};
use coin_market_sdk::{
    engine, FilterSpec, MarketService, Performance, SortDirection, SortField, SortSpec,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("CoinGecko Market Snapshot");
    println!("=========================");

    let service = MarketService::new()?;

    let coins = service.top_coins(100, None).await?;
    println!("Fetched {} coins", coins.len());

    // Second call is served from cache
    let cached = service.top_coins(100, None).await?;
    assert_eq!(cached.len(), coins.len());

    let filter = FilterSpec {
        performance: Performance::Gainers,
        ..FilterSpec::default()
    };
    let sort = SortSpec::by(SortField::PriceChange24h, SortDirection::Desc);
    let gainers = engine::apply(&coins, &filter, "", &sort);

    println!("\nTop gainers (24h > 5%)");
    println!("{:-<64}", "");
    for coin in gainers.iter().take(10) {
        println!(
            "{:<8} {:>16} {:>14} {:>+8.2}%",
            coin.symbol.as_deref().unwrap_or("?").to_uppercase(),
            format_price(coin.current_price.unwrap_or(0.0)),
            format_compact_usd(coin.market_cap.unwrap_or(0.0)),
            coin.price_change_percentage_24h.unwrap_or(0.0),
        );
    }

    println!("\nSuggestions for \"eth\"");
    for coin in engine::suggest(&coins, "eth", Some(5)) {
        println!("  {} ({})", coin.name.as_deref().unwrap_or(&coin.id), coin.id);
    }

    let metrics = service.coingecko().metrics().await;
    println!(
        "\nrequests: {} cache hits: {} p50: {:.0}ms",
        metrics.network_attempts, metrics.cache_hits, metrics.latency_p50_ms
    );

    Ok(())
}
