//! Source connectors.
//!
//! A connector knows how to talk to one external catalog site: given the
//! canonical URL of a title on that site it resolves the current
//! [`Metadata`]. How it does that (scraping, an API, a feed) is entirely its
//! own business; the rest of lectern only sees the [`Connector`] trait.
//!
//! Some sites can also produce a deep link to an individual chapter. That is
//! an optional capability, [`ChapterUrlResolver`], reached through
//! [`Connector::chapter_urls`] rather than through a type tag.

pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod models;
mod registry;

#[cfg(feature = "mock")]
pub use crate::mock::{MockConnector, MockResponse};
pub use crate::models::{Metadata, SearchHit, format_chapter, normalize_key};
pub use crate::registry::Registry;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub type ConnectorHandle = Arc<dyn Connector + Send + Sync>;

/// Interface implemented once per supported source site.
///
/// All network-facing methods are asynchronous. Implementations must be
/// cheap to share: the registry hands out the same instance to the poller and
/// to every background fetch.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Source key this connector is registered under (e.g. `"mangadex"`).
    /// Compared case-insensitively.
    fn key(&self) -> &str;

    /// Hostnames served by this connector, without a `www.` prefix.
    /// Subdomains of a listed host match as well.
    fn domains(&self) -> &[&str] {
        &[]
    }

    /// Resolve the current state of the title at `url`.
    async fn resolve(&self, url: &str) -> Result<Metadata>;

    /// Search the site's catalog by title.
    ///
    /// Not used by synchronization; the default implementation finds nothing.
    async fn search_by_title(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    /// The chapter deep-link capability, if this connector offers it.
    fn chapter_urls(&self) -> Option<&dyn ChapterUrlResolver> {
        None
    }
}

/// Optional capability: resolve the URL of one specific chapter.
#[async_trait]
pub trait ChapterUrlResolver: Send + Sync {
    async fn resolve_chapter_url(&self, url: &str, chapter: f64) -> Result<String>;
}
