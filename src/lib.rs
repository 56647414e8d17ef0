mod parser;
pub mod query;
pub mod scraper;
pub mod types;

pub use query::{Query, QueryError};
pub use scraper::{PdcScraper, ScraperError};
pub use types::{Panels, Table};

/// Public site the scraper targets unless another base URL is given.
pub const BASE_URL: &str = "https://www.pseudomonas.com";
