use crate::quiz::Collection;
use std::collections::HashMap;

/// External home for the persisted guess list. The ledger itself never does
/// I/O; callers read `guesses()` and hand the list to a store.
pub trait GuessStore {
    fn load(&self) -> Result<Vec<String>, String>;
    fn save(&mut self, guesses: &[String]) -> Result<(), String>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryGuessStore {
    guesses: Vec<String>,
}

impl MemoryGuessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guesses(guesses: Vec<String>) -> Self {
        Self { guesses }
    }
}

impl GuessStore for MemoryGuessStore {
    fn load(&self) -> Result<Vec<String>, String> {
        Ok(self.guesses.clone())
    }

    fn save(&mut self, guesses: &[String]) -> Result<(), String> {
        self.guesses = guesses.to_vec();
        Ok(())
    }
}

/// Source of named entity collections (the engine's only asynchronous
/// boundary, seen here as a completed fetch).
pub trait CollectionSource {
    fn fetch(&self, name: &str) -> Result<Collection, String>;
}

#[derive(Debug, Default, Clone)]
pub struct StaticCollectionSource {
    map: HashMap<String, Collection>,
}

impl StaticCollectionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, collection: Collection) {
        self.map.insert(name.as_ref().trim().to_string(), collection);
    }
}

impl CollectionSource for StaticCollectionSource {
    fn fetch(&self, name: &str) -> Result<Collection, String> {
        self.map
            .get(name.trim())
            .cloned()
            .ok_or_else(|| format!("unknown quiz {name}"))
    }
}

pub struct FnCollectionSource<F> {
    lookup: F,
}

impl<F> FnCollectionSource<F> {
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

impl<F> CollectionSource for FnCollectionSource<F>
where
    F: Fn(&str) -> Option<Collection>,
{
    fn fetch(&self, name: &str) -> Result<Collection, String> {
        (self.lookup)(name).ok_or_else(|| format!("unknown quiz {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuizConfig;

    fn empty_collection() -> Collection {
        Collection::new(Vec::new(), QuizConfig::default())
    }

    #[test]
    fn memory_store_round_trips_guess_list() {
        let mut store = MemoryGuessStore::new();
        store
            .save(&["Rainier".to_string(), "Baker".to_string()])
            .unwrap();
        assert_eq!(store.load().unwrap(), vec!["Rainier", "Baker"]);
    }

    #[test]
    fn static_source_fetches_known_and_rejects_unknown() {
        let mut source = StaticCollectionSource::new();
        source.insert("wa_peaks", empty_collection());
        assert!(source.fetch("wa_peaks").is_ok());
        assert!(source.fetch("nope").is_err());
    }

    #[test]
    fn fn_source_maps_found_and_missing() {
        let source = FnCollectionSource::new(|name: &str| {
            if name == "wa_peaks" {
                Some(empty_collection())
            } else {
                None
            }
        });
        assert!(source.fetch("wa_peaks").is_ok());
        assert!(source.fetch("unknown").is_err());
    }
}
