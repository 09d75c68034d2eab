use crate::lang::adapter::{LanguageAdapter, TreeSitterAdapter};
use crate::lang::language::Language;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lookup of language adapters by identifier.
///
/// Identifiers are matched case-insensitively. Registering an identifier
/// twice replaces the earlier adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a tree-sitter adapter for every built-in language,
    /// reachable by canonical identifier and by alias.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for language in Language::ALL {
            let adapter: Arc<dyn LanguageAdapter> = Arc::new(TreeSitterAdapter::new(language));
            registry.register(language.identifier(), Arc::clone(&adapter));
            for alias in language.aliases() {
                registry.register(alias, Arc::clone(&adapter));
            }
        }
        registry
    }

    pub fn register(&mut self, identifier: &str, adapter: Arc<dyn LanguageAdapter>) {
        self.adapters.insert(normalize(identifier), adapter);
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<dyn LanguageAdapter>> {
        self.adapters.get(&normalize(identifier)).cloned()
    }

    pub fn supports(&self, identifier: &str) -> bool {
        self.adapters.contains_key(&normalize(identifier))
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("identifiers", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize(identifier: &str) -> String {
    identifier.trim().to_ascii_lowercase()
}
