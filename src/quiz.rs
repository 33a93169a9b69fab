use crate::types::{AttrValue, EntityId, MeasurementLevel};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbbreviationRule {
    pub from: String,
    pub to: String,
}

impl AbbreviationRule {
    pub fn new(from: impl AsRef<str>, to: impl AsRef<str>) -> Self {
        Self {
            from: from.as_ref().trim().to_lowercase(),
            to: to.as_ref().trim().to_lowercase(),
        }
    }
}

/// Which form each abbreviation folds toward is a per-deployment choice;
/// these defaults match the common peak-list convention.
pub fn default_abbreviations() -> Vec<AbbreviationRule> {
    vec![
        AbbreviationRule::new("saint", "st"),
        AbbreviationRule::new("mt", "mount"),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDef {
    pub name: String,
    pub measurement_level: MeasurementLevel,
}

impl AttributeDef {
    pub fn new(name: impl AsRef<str>, measurement_level: MeasurementLevel) -> Self {
        Self {
            name: name.as_ref().to_string(),
            measurement_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizConfig {
    pub title_attribute: String,
    pub alt_title_attributes: Vec<String>,
    pub ignored_words: Vec<String>,
    pub items_label: String,
    pub attribute_definitions: Vec<AttributeDef>,
    pub abbreviations: Vec<AbbreviationRule>,
    pub source: Option<String>,
    pub source_url: Option<String>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            title_attribute: "title".to_string(),
            alt_title_attributes: Vec::new(),
            ignored_words: Vec::new(),
            items_label: "items".to_string(),
            attribute_definitions: Vec::new(),
            abbreviations: default_abbreviations(),
            source: None,
            source_url: None,
        }
    }
}

impl QuizConfig {
    pub fn canonicalize(&self, raw: &str) -> String {
        canonicalize(raw, &self.ignored_words, &self.abbreviations)
    }

    fn match_attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.title_attribute.as_str())
            .chain(self.alt_title_attributes.iter().map(String::as_str))
    }
}

/// Reduces a raw string to its comparison key. Pure and total; an empty
/// result is valid and matches nothing.
pub fn canonicalize(raw: &str, ignored_words: &[String], abbreviations: &[AbbreviationRule]) -> String {
    let mut stripped = String::with_capacity(raw.len());
    for c in raw.trim().nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        for lc in c.to_lowercase() {
            if lc.is_ascii_alphanumeric() {
                stripped.push(lc);
            } else if lc.is_whitespace() {
                stripped.push(' ');
            }
        }
    }

    stripped
        .split_whitespace()
        .filter(|token| !ignored_words.iter().any(|w| w.eq_ignore_ascii_case(token)))
        .map(|token| fold_token(token, abbreviations))
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_token(token: &str, abbreviations: &[AbbreviationRule]) -> String {
    abbreviations
        .iter()
        .find(|rule| rule.from.eq_ignore_ascii_case(token))
        .map(|rule| rule.to.clone())
        .unwrap_or_else(|| token.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    properties: HashMap<String, AttrValue>,
}

impl Entity {
    pub fn new(id: EntityId, properties: HashMap<String, AttrValue>) -> Self {
        Self { id, properties }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.properties.get(name)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.properties.get(name).map(AttrValue::as_text)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.properties.get(name).and_then(AttrValue::as_f64)
    }
}

/// True when the guess canonicalizes to the same key as the entity's title
/// attribute or any configured alternate. A disjunction: probe order never
/// changes the result.
pub fn is_match(guess: &str, entity: &Entity, config: &QuizConfig) -> bool {
    let key = config.canonicalize(guess);
    if key.is_empty() {
        return false;
    }
    entity_matches_key(entity, &key, config)
}

fn entity_matches_key(entity: &Entity, key: &str, config: &QuizConfig) -> bool {
    config.match_attributes().any(|attr| {
        entity
            .text(attr)
            .map(|value| config.canonicalize(&value) == key)
            .unwrap_or(false)
    })
}

#[derive(Debug, Deserialize)]
struct FeatureDocument {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CollectionDocument {
    #[serde(rename = "type")]
    doc_type: String,
    features: Vec<FeatureDocument>,
    #[serde(default)]
    geoquiz: Option<QuizConfig>,
}

/// An immutable entity collection plus its quiz configuration. Replaced
/// wholesale on quiz switch, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    entities: Vec<Entity>,
    config: QuizConfig,
}

impl Collection {
    pub fn new(entities: Vec<Entity>, config: QuizConfig) -> Self {
        let mut collection = Self { entities, config };
        collection.coerce_numeric_attributes();
        collection
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn from_json_str(input: &str) -> Result<Self, QuizError> {
        let doc: CollectionDocument =
            serde_json::from_str(input).map_err(|e| QuizError::Parse(format!("json: {e}")))?;
        Self::from_document(doc)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, QuizError> {
        let doc: CollectionDocument =
            serde_yaml::from_str(input).map_err(|e| QuizError::Parse(format!("yaml: {e}")))?;
        Self::from_document(doc)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, QuizError> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref)
            .map_err(|e| QuizError::Load(format!("failed to read {}: {}", path_ref.display(), e)))?;
        let ext = path_ref
            .extension()
            .and_then(|v| v.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" | "geojson" => Self::from_json_str(&raw),
            "yaml" | "yml" => Self::from_yaml_str(&raw),
            _ => Err(QuizError::Load(format!(
                "unsupported collection extension '{}'; expected .json/.geojson/.yaml/.yml",
                ext
            ))),
        }
    }

    fn from_document(doc: CollectionDocument) -> Result<Self, QuizError> {
        if doc.doc_type != "FeatureCollection" {
            return Err(QuizError::Parse(format!(
                "expected FeatureCollection, got '{}'",
                doc.doc_type
            )));
        }
        let config = doc.geoquiz.unwrap_or_default();
        let mut entities = Vec::with_capacity(doc.features.len());
        for (index, feature) in doc.features.into_iter().enumerate() {
            let id = match feature.id {
                Some(serde_json::Value::String(s)) => EntityId::new(s),
                Some(serde_json::Value::Number(n)) => EntityId::new(n.to_string()),
                _ => EntityId::new(index.to_string()),
            };
            let mut properties = HashMap::new();
            for (name, value) in feature.properties {
                match value {
                    serde_json::Value::String(s) => {
                        properties.insert(name, AttrValue::Text(s));
                    }
                    serde_json::Value::Number(n) => {
                        if let Some(v) = n.as_f64() {
                            properties.insert(name, AttrValue::Number(v));
                        }
                    }
                    serde_json::Value::Bool(b) => {
                        properties.insert(name, AttrValue::Text(b.to_string()));
                    }
                    _ => {}
                }
            }
            entities.push(Entity::new(id, properties));
        }
        debug!("loaded collection with {} entities", entities.len());
        Ok(Self::new(entities, config))
    }

    // Attributes declared ordinal or rational are parsed to numbers exactly
    // once, here; values that fail to parse stay text and are absent for
    // every numeric purpose.
    fn coerce_numeric_attributes(&mut self) {
        let numeric_attrs: Vec<String> = self
            .config
            .attribute_definitions
            .iter()
            .filter(|def| def.measurement_level != MeasurementLevel::Nominal)
            .map(|def| def.name.clone())
            .collect();
        for entity in &mut self.entities {
            for attr in &numeric_attrs {
                let parsed = match entity.properties.get(attr) {
                    Some(AttrValue::Text(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
                    _ => None,
                };
                if let Some(v) = parsed {
                    entity.properties.insert(attr.clone(), AttrValue::Number(v));
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizError {
    Load(String),
    Parse(String),
    NotLoaded,
}

impl std::fmt::Display for QuizError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizError::Load(msg) => write!(f, "load failed: {msg}"),
            QuizError::Parse(msg) => write!(f, "parse failed: {msg}"),
            QuizError::NotLoaded => write!(f, "no collection loaded"),
        }
    }
}

impl std::error::Error for QuizError {}

#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub already_guessed: bool,
}

/// Ordered, duplicate-free set of raw guesses. Entries are kept verbatim
/// (pre-canonicalization) and keyed by exact string equality; accepted
/// guesses are appended at the back, so iteration order is submission order.
/// The ledger performs no persistence I/O of its own.
#[derive(Debug, Clone, Default)]
pub struct GuessLedger {
    entries: Vec<String>,
    seen: HashSet<String>,
}

impl GuessLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, raw: &str) -> SubmitOutcome {
        if raw.trim().is_empty() {
            return SubmitOutcome {
                accepted: false,
                already_guessed: false,
            };
        }
        if self.seen.contains(raw) {
            return SubmitOutcome {
                accepted: false,
                already_guessed: true,
            };
        }
        self.seen.insert(raw.to_string());
        self.entries.push(raw.to_string());
        SubmitOutcome {
            accepted: true,
            already_guessed: false,
        }
    }

    pub fn restore(&mut self, raws: impl IntoIterator<Item = String>) {
        for raw in raws {
            let _ = self.submit(&raw);
        }
    }

    pub fn guesses(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-matches every stored guess against the collection. Idempotent:
    /// unchanged inputs always yield the same correct set.
    pub fn rescore(&self, collection: &Collection) -> HashSet<EntityId> {
        let config = collection.config();
        let mut correct = HashSet::new();
        for raw in &self.entries {
            let key = config.canonicalize(raw);
            if key.is_empty() {
                continue;
            }
            for entity in collection.entities() {
                if entity_matches_key(entity, &key, config) {
                    correct.insert(entity.id().clone());
                }
            }
        }
        debug!(
            "rescore: {} guesses resolved {} of {} entities",
            self.entries.len(),
            correct.len(),
            collection.len()
        );
        correct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadSeq(u64);

#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSummary {
    pub accepted: bool,
    pub already_guessed: bool,
    pub matched: Vec<EntityId>,
    pub newly_correct: Vec<EntityId>,
    pub total_guesses: usize,
    pub total_correct: usize,
}

#[derive(Debug, Clone)]
struct LoadedQuiz {
    collection: Collection,
    correct: HashSet<EntityId>,
}

/// Owns the guess ledger and correct set. Two states: Unloaded (no
/// collection) and Loaded. Submission while Unloaded is rejected with
/// `QuizError::NotLoaded`; nothing is queued. While a load is in flight the
/// session keeps serving the previous state.
#[derive(Debug, Clone, Default)]
pub struct QuizSession {
    ledger: GuessLedger,
    loaded: Option<LoadedQuiz>,
    next_load_seq: u64,
    applied_load_seq: u64,
}

impl QuizSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-initializes the ledger from persisted state, deduplicating
    /// defensively, then rescores if a collection is present.
    pub fn restore_guesses(&mut self, raws: impl IntoIterator<Item = String>) {
        self.ledger.restore(raws);
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.correct = self.ledger.rescore(&loaded.collection);
        }
    }

    /// Tags an in-flight load. Sequence numbers are monotonically
    /// increasing; `complete_load` discards results superseded by a newer
    /// applied load (last-load-wins).
    pub fn begin_load(&mut self) -> LoadSeq {
        self.next_load_seq += 1;
        LoadSeq(self.next_load_seq)
    }

    /// Delivers the outcome of a load started with `begin_load`. Returns
    /// `Ok(true)` if the collection was applied, `Ok(false)` if it was
    /// discarded as stale. A failed load leaves the prior state untouched.
    pub fn complete_load(
        &mut self,
        seq: LoadSeq,
        result: Result<Collection, QuizError>,
    ) -> Result<bool, QuizError> {
        if seq.0 <= self.applied_load_seq {
            warn!("discarding stale load (seq {})", seq.0);
            return Ok(false);
        }
        let collection = result?;
        self.applied_load_seq = seq.0;
        let correct = self.ledger.rescore(&collection);
        self.loaded = Some(LoadedQuiz { collection, correct });
        Ok(true)
    }

    /// Synchronous convenience for callers that already hold the collection.
    pub fn load(&mut self, collection: Collection) -> Result<(), QuizError> {
        let seq = self.begin_load();
        self.complete_load(seq, Ok(collection)).map(|_| ())
    }

    pub fn submit(&mut self, raw: &str) -> Result<SubmitSummary, QuizError> {
        let loaded = self.loaded.as_mut().ok_or(QuizError::NotLoaded)?;
        let outcome = self.ledger.submit(raw);
        let mut matched = Vec::new();
        let mut newly_correct = Vec::new();
        if outcome.accepted {
            let config = loaded.collection.config();
            let key = config.canonicalize(raw);
            if !key.is_empty() {
                for entity in loaded.collection.entities() {
                    if entity_matches_key(entity, &key, config) {
                        matched.push(entity.id().clone());
                        if loaded.correct.insert(entity.id().clone()) {
                            newly_correct.push(entity.id().clone());
                        }
                    }
                }
            }
        }
        Ok(SubmitSummary {
            accepted: outcome.accepted,
            already_guessed: outcome.already_guessed,
            matched,
            newly_correct,
            total_guesses: self.ledger.len(),
            total_correct: loaded.correct.len(),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn collection(&self) -> Option<&Collection> {
        self.loaded.as_ref().map(|l| &l.collection)
    }

    pub fn correct_set(&self) -> Option<&HashSet<EntityId>> {
        self.loaded.as_ref().map(|l| &l.correct)
    }

    pub fn correct_ids(&self) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = self
            .loaded
            .as_ref()
            .map(|l| l.correct.iter().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn guesses(&self) -> &[String] {
        self.ledger.guesses()
    }
}
