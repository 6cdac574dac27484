use time::UtcDateTime;

/// Current state of a title as reported by its source.
///
/// Every field is optional: sites routinely omit release dates, and some
/// never expose cover art. Only the chapter number and timestamp are ever
/// persisted; everything else is used transiently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Highest chapter currently published. Fractional chapters (`10.5`)
    /// are common on some sites.
    pub latest_chapter: Option<f64>,
    /// When the latest chapter was released, if the site says.
    pub last_updated: Option<UtcDateTime>,
    pub cover_url: Option<String>,
    /// The site's canonical identifier for the title.
    pub item_id: Option<String>,
    pub chapter_url: Option<String>,
}
impl Metadata {
    pub fn with_chapter(mut self, chapter: f64) -> Self {
        self.latest_chapter = Some(chapter);
        self
    }

    pub fn with_last_updated(mut self, at: UtcDateTime) -> Self {
        self.last_updated = Some(at);
        self
    }

    pub fn with_cover(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    /// The cover URL, unless it is missing or blank.
    pub fn usable_cover(&self) -> Option<&str> {
        self.cover_url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }
}

/// A single catalog search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub item_id: Option<String>,
    pub cover_url: Option<String>,
}

/// Canonical form of a source key: trimmed and lower-cased.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Canonical textual form of a chapter number.
///
/// Integral chapters print without a fractional part (`11`, not `11.0`) and
/// negative zero prints as `0`, so equal numbers always format identically.
pub fn format_chapter(chapter: f64) -> String {
    // -0.0 == 0.0, so this also folds negative zero.
    let chapter = if chapter == 0.0 { 0.0 } else { chapter };
    chapter.to_string()
}
