use crate::adapter::{CollectionSource, GuessStore};
use crate::quiz::Collection;

/// Foreign source handing back raw quiz documents (a browser fetch, a file
/// cache). Adapted into the engine's `CollectionSource` seam below.
pub trait ExternalQuizSource {
    fn lookup_quiz(&self, name: &str) -> Option<String>;
}

/// Foreign keyed persistence for guess lists (browser-local storage in the
/// deployed quiz).
pub trait ExternalGuessListSource {
    fn load_guesses(&self, key: &str) -> Option<Vec<String>>;
    fn store_guesses(&mut self, key: &str, guesses: &[String]) -> bool;
}

pub struct CollectionSourceAdapter<S> {
    source: S,
}

impl<S> CollectionSourceAdapter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S> CollectionSource for CollectionSourceAdapter<S>
where
    S: ExternalQuizSource,
{
    fn fetch(&self, name: &str) -> Result<Collection, String> {
        let raw = self
            .source
            .lookup_quiz(name)
            .ok_or_else(|| format!("unknown quiz {name}"))?;
        Collection::from_json_str(&raw).map_err(|e| e.to_string())
    }
}

pub struct KeyedGuessStore<S> {
    source: S,
    key: String,
}

impl<S> KeyedGuessStore<S> {
    pub fn new(source: S, key: impl AsRef<str>) -> Self {
        Self {
            source,
            key: key.as_ref().to_string(),
        }
    }
}

impl<S> GuessStore for KeyedGuessStore<S>
where
    S: ExternalGuessListSource,
{
    fn load(&self) -> Result<Vec<String>, String> {
        Ok(self.source.load_guesses(&self.key).unwrap_or_default())
    }

    fn save(&mut self, guesses: &[String]) -> Result<(), String> {
        if self.source.store_guesses(&self.key, guesses) {
            Ok(())
        } else {
            Err(format!("failed to persist guesses under {}", self.key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeExternalSource {
        quizzes: HashMap<String, String>,
        guesses: HashMap<String, Vec<String>>,
    }

    impl ExternalQuizSource for FakeExternalSource {
        fn lookup_quiz(&self, name: &str) -> Option<String> {
            self.quizzes.get(name).cloned()
        }
    }

    impl ExternalGuessListSource for FakeExternalSource {
        fn load_guesses(&self, key: &str) -> Option<Vec<String>> {
            self.guesses.get(key).cloned()
        }

        fn store_guesses(&mut self, key: &str, guesses: &[String]) -> bool {
            self.guesses.insert(key.to_string(), guesses.to_vec());
            true
        }
    }

    #[test]
    fn adapter_parses_fetched_document() {
        let mut src = FakeExternalSource::default();
        src.quizzes.insert(
            "wa_peaks".to_string(),
            r#"{"type": "FeatureCollection", "features": [
                {"id": "rainier", "properties": {"title": "Mount Rainier"}}
            ]}"#
            .to_string(),
        );
        let adapter = CollectionSourceAdapter::new(src);
        let collection = adapter.fetch("wa_peaks").unwrap();
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn adapter_surfaces_missing_and_malformed_documents() {
        let mut src = FakeExternalSource::default();
        src.quizzes
            .insert("broken".to_string(), "not json".to_string());
        let adapter = CollectionSourceAdapter::new(src);
        assert!(adapter.fetch("missing").is_err());
        assert!(adapter.fetch("broken").is_err());
    }

    #[test]
    fn keyed_store_round_trips_through_external_source() {
        let src = FakeExternalSource::default();
        let mut store = KeyedGuessStore::new(src, "wa_peaks.guesses");
        assert!(store.load().unwrap().is_empty());
        store.save(&["Rainier".to_string()]).unwrap();
        assert_eq!(store.load().unwrap(), vec!["Rainier"]);
    }
}
