use std::sync::{PoisonError, RwLock};

/// Remembers which dashboard listing was requested most recently.
///
/// Background fetches queued for a listing check it right before contacting
/// the upstream site and give up if the user has since moved on.
#[derive(Debug, Default)]
pub struct PageLiveness {
    active: RwLock<String>,
}

impl PageLiveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, page_key: &str) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = page_key.to_string();
    }

    pub fn active(&self) -> String {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `true` if work for `page_key` is still wanted. An empty key is not tied
    /// to any listing and is always current.
    pub fn is_current(&self, page_key: &str) -> bool {
        page_key.is_empty() || *self.active.read().unwrap_or_else(PoisonError::into_inner) == page_key
    }
}
