//! # Cache de Includes
//! src/templates/cache.rs
//!
//! Memoriza el resultado de `{% include "nombre" %}` por
//! (nombre, digest del contexto). Cada `set_template` incrementa la
//! generación y vacía el cache; un resultado calculado con una generación
//! vieja se descarta al insertar.
//!
//! El lock nunca se mantiene durante un render: se consulta, se suelta,
//! se renderiza y recién después se inserta.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<(String, String), String>,
}

#[derive(Debug, Default)]
pub struct IncludeCache {
    state: Mutex<CacheState>,
}

impl IncludeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generación actual; se toma antes de renderizar un include
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn get(&self, name: &str, digest: &str) -> Option<String> {
        self.lock()
            .entries
            .get(&(name.to_string(), digest.to_string()))
            .cloned()
    }

    /// Inserta solo si nadie invalidó el cache desde `generation`
    pub fn insert(&self, generation: u64, name: &str, digest: &str, rendered: String) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state
            .entries
            .insert((name.to_string(), digest.to_string()), rendered);
        true
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let cache = IncludeCache::new();
        let generation = cache.generation();

        assert_eq!(cache.get("nav.html", "d1"), None);
        assert!(cache.insert(generation, "nav.html", "d1", "<nav/>".into()));
        assert_eq!(cache.get("nav.html", "d1").as_deref(), Some("<nav/>"));
        assert_eq!(cache.get("nav.html", "d2"), None);
    }

    #[test]
    fn test_invalidate_clears_and_rejects_stale_results() {
        let cache = IncludeCache::new();
        let stale = cache.generation();
        cache.insert(stale, "a", "d", "old".into());

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(!cache.insert(stale, "a", "d", "old".into()));
        assert!(cache.insert(cache.generation(), "a", "d", "new".into()));
        assert_eq!(cache.len(), 1);
    }
}
