use std::collections::HashMap;
use std::fmt;

use super::{PageSource, SourceAdapter, SourceError};
use crate::domain::{QueryKind, QueryUnit, SourceKind};

/// Adapters keyed by the `(source, kind)` slot they serve.
///
/// Built once at setup from configuration. Tests register stub
/// [`PageSource`]s in place of real adapters.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: HashMap<(SourceKind, QueryKind), Box<dyn PageSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register real adapters under their own routes.
    pub fn from_adapters(adapters: impl IntoIterator<Item = SourceAdapter>) -> Self {
        let mut registry = Self::new();
        for adapter in adapters {
            let (source, kind) = adapter.route();
            registry.register(source, kind, adapter);
        }
        registry
    }

    /// Register (or replace) the adapter for a slot.
    pub fn register(&mut self, source: SourceKind, kind: QueryKind, adapter: impl PageSource + 'static) {
        self.adapters.insert((source, kind), Box::new(adapter));
    }

    pub fn get(&self, source: SourceKind, kind: QueryKind) -> Option<&dyn PageSource> {
        self.adapters.get(&(source, kind)).map(|a| a.as_ref())
    }

    /// The adapter for a unit, or `SourceError::Unsupported`.
    pub fn for_unit(&self, unit: &QueryUnit) -> Result<&dyn PageSource, SourceError> {
        self.get(unit.source, unit.kind)
            .ok_or(SourceError::Unsupported {
                source_kind: unit.source,
                query_kind: unit.kind,
            })
    }

    pub fn supports(&self, source: SourceKind, kind: QueryKind) -> bool {
        self.adapters.contains_key(&(source, kind))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Registered slots as `source/kind`, sorted.
    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self
            .adapters
            .keys()
            .map(|(source, kind)| format!("{source}/{kind}"))
            .collect();
        routes.sort();
        routes
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("routes", &self.routes())
            .finish()
    }
}
