//! Scrapers for the transcript site.
//!
//! Resolution of one date follows a consistent two-phase pattern:
//!
//! 1. **Directory**: build the per-day listing URLs and pull transcript links
//!    out of the first listing that has any ([`directory`])
//! 2. **Article**: fetch each linked page and extract its heading, asserted
//!    date and body ([`article`])
//!
//! # Submodules
//!
//! | Module | Role |
//! |--------|------|
//! | [`markup`] | `MarkupSource` capability and its `scraper` implementation |
//! | [`directory`] | Directory URL builder and link extractor |
//! | [`article`] | Article fetcher and ordered date-pattern matching |
//! | [`format`] | Transcript text to Markdown |
//!
//! The extractors only see a [`markup::MarkupSource`], so they can be
//! exercised against any parsed page without a network.

pub mod article;
pub mod directory;
pub mod format;
pub mod markup;
