// src/fetch/registry.rs
use std::collections::HashMap;
use std::sync::Arc;

use crate::fetch::connectors;
use crate::fetch::types::{Connector, SourceKind};

/// Source kind -> connector binding. Registering a kind twice replaces the earlier one.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<SourceKind, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in source bound to its connector.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        for c in connectors::builtin() {
            r.register(c);
        }
        r
    }

    pub fn register(&mut self, connector: Arc<dyn Connector>) -> &mut Self {
        self.connectors.insert(connector.kind(), connector);
        self
    }

    pub fn get(&self, kind: &SourceKind) -> Option<Arc<dyn Connector>> {
        self.connectors.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut v: Vec<_> = self.connectors.keys().cloned().collect();
        v.sort();
        v
    }

    /// Closest registered id to an unknown one, if reasonably close.
    pub fn suggest(&self, unknown: &str) -> Option<SourceKind> {
        self.connectors
            .keys()
            .map(|k| (k, strsim::jaro_winkler(k.as_str(), unknown)))
            .filter(|(_, score)| *score >= 0.8)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(k, _)| k.clone())
    }

    /// Summary used when nothing is registered for `kind`.
    pub fn missing_summary(&self, kind: &SourceKind) -> String {
        let mut s = format!("{} module not found.", kind.display_name());
        if let Some(k) = self.suggest(kind.as_str()) {
            s.push_str(&format!(" Did you mean '{k}'?"));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_register_all_builtins() {
        let r = ConnectorRegistry::with_defaults();
        assert_eq!(r.kinds().len(), SourceKind::BUILTIN.len());
        assert!(r.get(&SourceKind::Reddit).is_some());
        assert!(r.get(&SourceKind::Custom("myspace".into())).is_none());
    }

    #[test]
    fn missing_summary_suggests_close_ids() {
        let r = ConnectorRegistry::with_defaults();
        let s = r.missing_summary(&SourceKind::Custom("redit".into()));
        assert_eq!(s, "Redit module not found. Did you mean 'reddit'?");
        let s = r.missing_summary(&SourceKind::Custom("zzz".into()));
        assert_eq!(s, "Zzz module not found.");
    }
}
