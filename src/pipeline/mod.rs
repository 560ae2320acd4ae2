//! Pipeline entry points for scraper operations.
//!
//! - `Scraper::run`: Collect archive URLs, then harvest articles
//! - `validate_output`: Check a stored corpus file

pub mod pagination;
pub mod scrape;
pub mod validate;

pub use pagination::{ArchivePage, Paginator};
pub use scrape::Scraper;
pub use validate::{ValidationReport, log_report, validate_output};
