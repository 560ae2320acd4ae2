//! Service layer for the scraper.
//!
//! This module contains the extraction and collaborator logic:
//! - Archive item extraction (`ArchiveExtractor`)
//! - Article extraction (`ArticleExtractor`)
//! - Selector compilation and lookup (`selectors`)
//! - robots.txt policy (`RobotsGuard`)
//! - Header and proxy rotation (`RotatingProfile`)

mod archive;
mod article;
pub mod request;
pub mod robots;
pub mod selectors;

pub use archive::ArchiveExtractor;
pub use article::{ArticleExtraction, ArticleExtractor};
pub use request::{RequestProfile, RotatingProfile, StaticProfile};
pub use robots::{AllowAll, RobotsGuard, RobotsPolicy, RobotsTxt};
