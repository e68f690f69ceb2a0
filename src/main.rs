use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topline::cache::ResponseCache;
use topline::config::Config;
use topline::feed::{FeedController, FeedState};
use topline::fetcher::Fetcher;
use topline::models::NewsItem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration, falling back to defaults when no file exists
    let config = if std::path::Path::new("topline.toml").exists() {
        Config::load("topline.toml")?
    } else {
        Config::default()
    };
    let api_url = config.resolved_api_url();
    info!("Using news API at {}", api_url);

    let category = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());

    let fetcher = Fetcher::new(&api_url, &config);
    let cache = ResponseCache::new(config.cache_ttl_secs, config.max_cache_entries);
    let mut feed = FeedController::new(fetcher, cache, &config);

    feed.select_category(&category).await;

    match feed.state() {
        FeedState::Error(message) => println!("{}", message),
        _ if feed.items().is_empty() => println!("No news right now. Check back soon."),
        _ => {
            for item in feed.items() {
                print_item(item);
            }
            if feed.has_more() {
                println!("... more available in '{}'", category);
            }
        }
    }

    Ok(())
}

fn print_item(item: &NewsItem) {
    let published = item
        .published_at
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "undated".to_string());
    println!(
        "[{}] {} ({}) {}",
        item.source, item.title, published, item.url
    );
}
