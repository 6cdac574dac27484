//! On-demand resolution of cover art and chapter deep links.
//!
//! Dashboard rendering asks for a cover or a chapter link per row. Answers
//! come from an expiring cache; anything not cached is fetched in the
//! background while the request gets a fallback straight away. Background
//! fetches are deduplicated per [`CacheKey`], bounded by [`FetchPools`], and
//! abandoned when the page that asked for them is no longer on screen.

mod cache;
mod inflight;
mod key;
mod page;
mod pool;
mod resolver;

pub use crate::cache::{Lookup, ResultCache};
pub use crate::inflight::{InFlight, InFlightGuard};
pub use crate::key::CacheKey;
pub use crate::page::PageLiveness;
pub use crate::pool::{FetchPools, PoolKind, PoolToken};
pub use crate::resolver::{Resolution, Resolver, ResolverOptions, TtlPolicy};
