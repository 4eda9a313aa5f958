pub mod browser;
pub mod http;
pub mod listing;
pub mod traits;
pub mod types;
pub mod urls;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;
pub use listing::DetailExtractor;
pub use traits::Fetcher;
pub use types::SiteSelectors;
pub use urls::UrlCollector;
