//! Builtin HTTP-backed tool adapters
//!
//! Pure payload/parsing helpers live next to the I/O that uses them so they
//! can be tested without a network.

pub mod page;
pub mod scrape_website;
pub mod search_internet;
pub mod search_website;

pub use page::PageFetcher;
pub use scrape_website::ScrapeWebsiteTool;
pub use search_internet::SearchInternetTool;
pub use search_website::SearchWebsiteTool;
