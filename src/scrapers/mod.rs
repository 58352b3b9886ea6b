//! Page scrapers for lidovky.cz.
//!
//! A harvest run uses the scrapers in two phases:
//!
//! 1. **Discovery**: [`links::LinkDiscoverer`] picks article URLs off the homepage
//! 2. **Extraction**: [`article::ArticleParser`] turns each article page into an
//!    [`ArticleRecord`](crate::models::ArticleRecord)
//!
//! Where to look on a page is decided by the per-field rules in [`rules`],
//! compiled from the configurable [`RulesFile`](crate::config::RulesFile).

pub mod article;
pub mod links;
pub mod rules;
