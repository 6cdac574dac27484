use crate::{ConnectorHandle, normalize_key};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use url::Url;

/// Source key to connector lookup.
///
/// Built once at startup and shared behind an `Arc`; lookups never block.
/// Keys are normalized with [`normalize_key`], so `"MangaDex"` and
/// `" mangadex"` find the same connector.
#[derive(Clone, Default)]
pub struct Registry {
    connectors: BTreeMap<String, ConnectorHandle>,
}
impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Registry").field("connectors", &self.connectors.keys().collect::<Vec<_>>()).finish()
    }
}
impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under its own [`key`](crate::Connector::key),
    /// replacing any connector previously registered under the same key.
    pub fn register(&mut self, connector: ConnectorHandle) -> &mut Self {
        let key = normalize_key(connector.key());
        if self.connectors.insert(key.clone(), connector).is_some() {
            tracing::warn!(source = %key, "Replaced previously registered connector");
        }
        self
    }

    pub fn with(mut self, connector: ConnectorHandle) -> Self {
        self.register(connector);
        self
    }

    pub fn get(&self, key: &str) -> Option<ConnectorHandle> {
        self.connectors.get(&normalize_key(key)).cloned()
    }

    /// Find the connector whose [`domains`](crate::Connector::domains) cover
    /// the host of `url`.
    ///
    /// A leading `www.` is ignored on both sides and subdomains match their
    /// parent (`chapters.example.com` is served by `example.com`). Returns
    /// `None` for unparseable URLs or unknown hosts. When several connectors
    /// claim the same host, the one with the lowest key wins.
    pub fn infer_from_url(&self, url: &str) -> Option<ConnectorHandle> {
        let parsed = Url::parse(url.trim()).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        self.connectors
            .values()
            .find(|connector| {
                connector.domains().iter().any(|domain| {
                    let domain = domain.trim().to_ascii_lowercase();
                    let domain = domain.strip_prefix("www.").unwrap_or(&domain);
                    !domain.is_empty()
                        && (host == domain || host.strip_suffix(domain).is_some_and(|sub| sub.ends_with('.')))
                })
            })
            .cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.connectors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}
