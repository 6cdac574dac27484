use lectern_connector::{format_chapter, normalize_key};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Normalized identifier of a cached resolution.
///
/// Built only through [`CacheKey::cover`] and [`CacheKey::chapter`]. The
/// source key is trimmed and lower-cased, identifiers and URLs are trimmed
/// (their case can be significant upstream), so logically identical requests
/// always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);
impl CacheKey {
    /// Key for a cover image: the item id when there is one, the source URL
    /// otherwise.
    pub fn cover(source_key: &str, source_url: &str, item_id: Option<&str>) -> Self {
        let target = item_id.map(str::trim).filter(|id| !id.is_empty()).unwrap_or(source_url);
        Self(format!("cover|{}|{}", normalize_key(source_key), target.trim()))
    }

    pub fn chapter(source_key: &str, source_url: &str, chapter: f64) -> Self {
        Self(format!(
            "chapter|{}|{}|{}",
            normalize_key(source_key),
            source_url.trim(),
            format_chapter(chapter)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
