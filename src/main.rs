mod cleaner;
mod cli;
mod config;
mod models;
mod output;
mod pipeline;
mod scrapers;

use config::Config;
use pipeline::Pipeline;
use scrapers::SiteSelectors;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let selectors = SiteSelectors::default();
    // Catch selector typos before any browser is launched
    selectors.compile_listing()?;
    selectors.listing_link_selector()?;

    info!("🏠 Listing Scout");
    info!(
        "Output directory: {}, page size: {}, concurrency: {}, {}",
        config.output_dir.display(),
        config.page_size,
        config.concurrency,
        if config.render_js { "headless Chrome" } else { "plain HTTP" }
    );

    let pipeline = Pipeline::new(config, selectors);
    cli::run(&pipeline).await
}
