use crate::quiz::Collection;
use crate::types::{EntityId, MeasurementLevel};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Rank depth for the top/bottom views.
pub const RANKING_DEPTH: usize = 10;

/// Bin key for entities lacking the attribute. They are counted, never
/// silently dropped.
pub const UNDEFINED_BIN: &str = "undefined";

/// Whole-percent ratio, rounded half away from zero. `None` when the
/// denominator is zero; no aggregate ever renders a NaN.
pub fn percent(numerator: f64, denominator: f64) -> Option<i64> {
    if denominator == 0.0 {
        None
    } else {
        Some((100.0 * numerator / denominator).round() as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinCount {
    pub correct: usize,
    pub total: usize,
}

impl BinCount {
    pub fn percent(&self) -> Option<i64> {
        percent(self.correct as f64, self.total as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NominalStats {
    pub bins: BTreeMap<String, BinCount>,
}

impl NominalStats {
    pub fn covered_bins(&self) -> usize {
        self.bins.values().filter(|b| b.correct > 0).count()
    }

    pub fn total_bins(&self) -> usize {
        self.bins.len()
    }
}

/// One ranking direction. `leading_correct` holds the first (up to
/// `RANKING_DEPTH`) correct entities in rank order; the cutoff is the value
/// of the `RANKING_DEPTH`-th entity in the full ranking, so ties at the
/// boundary can push `total_at_cutoff` beyond the depth.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectionStats {
    pub leading_correct: Vec<EntityId>,
    pub cutoff: Option<f64>,
    pub correct_at_cutoff: usize,
    pub total_at_cutoff: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RankingStats {
    pub ranked: usize,
    pub descending: DirectionStats,
    pub ascending: DirectionStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeView {
    Nominal(NominalStats),
    Ranked(RankingStats),
    RankedWeighted {
        ranking: RankingStats,
        share_percent: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeStats {
    pub name: String,
    pub level: MeasurementLevel,
    pub view: AttributeView,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizStats {
    pub total_entities: usize,
    pub correct_entities: usize,
    pub coverage_percent: Option<i64>,
    pub attributes: Vec<AttributeStats>,
}

pub fn nominal_stats(
    collection: &Collection,
    correct: &HashSet<EntityId>,
    attribute: &str,
) -> NominalStats {
    let mut bins: BTreeMap<String, BinCount> = BTreeMap::new();
    for entity in collection.entities() {
        let key = entity
            .text(attribute)
            .unwrap_or_else(|| UNDEFINED_BIN.to_string());
        let bin = bins.entry(key).or_default();
        bin.total += 1;
        if correct.contains(entity.id()) {
            bin.correct += 1;
        }
    }
    NominalStats { bins }
}

fn direction_stats(
    sorted: &[(&EntityId, f64)],
    correct: &HashSet<EntityId>,
    within: impl Fn(f64, f64) -> bool,
) -> DirectionStats {
    let leading_correct: Vec<EntityId> = sorted
        .iter()
        .filter(|&&(id, _)| correct.contains(id))
        .take(RANKING_DEPTH)
        .map(|&(id, _)| id.clone())
        .collect();
    let cutoff = match sorted.len() {
        0 => None,
        n => Some(sorted[n.min(RANKING_DEPTH) - 1].1),
    };
    let (correct_at_cutoff, total_at_cutoff) = match cutoff {
        Some(c) => {
            let mut in_correct = 0;
            let mut in_all = 0;
            for &(id, value) in sorted {
                if within(value, c) {
                    in_all += 1;
                    if correct.contains(id) {
                        in_correct += 1;
                    }
                }
            }
            (in_correct, in_all)
        }
        None => (0, 0),
    };
    DirectionStats {
        leading_correct,
        cutoff,
        correct_at_cutoff,
        total_at_cutoff,
    }
}

/// Ranking over entities with a defined numeric value; the rest are
/// excluded entirely (not counted as ties). Sorts are stable, so equal
/// values keep collection order.
pub fn ranking_stats(
    collection: &Collection,
    correct: &HashSet<EntityId>,
    attribute: &str,
) -> RankingStats {
    let ranked: Vec<(&EntityId, f64)> = collection
        .entities()
        .iter()
        .filter_map(|e| e.number(attribute).map(|v| (e.id(), v)))
        .collect();

    let mut descending = ranked.clone();
    descending.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    let mut ascending = ranked.clone();
    ascending.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    RankingStats {
        ranked: ranked.len(),
        descending: direction_stats(&descending, correct, |v, c| v >= c),
        ascending: direction_stats(&ascending, correct, |v, c| v <= c),
    }
}

/// Weighted-sum proportion for rational attributes: the correct subset's
/// share of the attribute's total. `None` when the total is zero.
pub fn weighted_share(
    collection: &Collection,
    correct: &HashSet<EntityId>,
    attribute: &str,
) -> Option<i64> {
    let mut sum_all = 0.0;
    let mut sum_correct = 0.0;
    for entity in collection.entities() {
        if let Some(value) = entity.number(attribute) {
            sum_all += value;
            if correct.contains(entity.id()) {
                sum_correct += value;
            }
        }
    }
    percent(sum_correct, sum_all)
}

/// Derives every configured attribute view plus overall coverage. A pure
/// function of (collection, correct set); recomputed on every change, never
/// stored.
pub fn compute_stats(collection: &Collection, correct: &HashSet<EntityId>) -> QuizStats {
    let attributes = collection
        .config()
        .attribute_definitions
        .iter()
        .map(|def| {
            let view = match def.measurement_level {
                MeasurementLevel::Nominal => {
                    AttributeView::Nominal(nominal_stats(collection, correct, &def.name))
                }
                MeasurementLevel::Ordinal => {
                    AttributeView::Ranked(ranking_stats(collection, correct, &def.name))
                }
                MeasurementLevel::Rational => AttributeView::RankedWeighted {
                    ranking: ranking_stats(collection, correct, &def.name),
                    share_percent: weighted_share(collection, correct, &def.name),
                },
            };
            AttributeStats {
                name: def.name.clone(),
                level: def.measurement_level,
                view,
            }
        })
        .collect();

    QuizStats {
        total_entities: collection.len(),
        correct_entities: correct.len(),
        coverage_percent: percent(correct.len() as f64, collection.len() as f64),
        attributes,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPredicate {
    pub attribute: String,
    pub minimum: f64,
}

impl ThresholdPredicate {
    pub fn new(attribute: impl AsRef<str>, minimum: f64) -> Self {
        Self {
            attribute: attribute.as_ref().to_string(),
            minimum,
        }
    }
}

/// A named cutoff with an enumerated option list, as presented by the
/// threshold controls. Changing the selection is a pure re-filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdControl {
    pub attribute: String,
    pub options: Vec<f64>,
    selected: usize,
}

impl ThresholdControl {
    pub fn new(attribute: impl AsRef<str>, options: Vec<f64>) -> Self {
        Self {
            attribute: attribute.as_ref().to_string(),
            options,
            selected: 0,
        }
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.options.len() {
            self.selected = index;
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn predicate(&self) -> Option<ThresholdPredicate> {
        self.options
            .get(self.selected)
            .map(|minimum| ThresholdPredicate::new(&self.attribute, *minimum))
    }
}

#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilteredView {
    pub all: Vec<EntityId>,
    pub correct: Vec<EntityId>,
}

impl FilteredView {
    pub fn coverage_percent(&self) -> Option<i64> {
        percent(self.correct.len() as f64, self.all.len() as f64)
    }
}

/// Conjunction of minimum-value predicates. An entity passes only when every
/// referenced attribute is defined and at or above its minimum; undefined
/// values fail the predicate (exclusion, not error).
pub fn filter_entities(
    collection: &Collection,
    correct: &HashSet<EntityId>,
    predicates: &[ThresholdPredicate],
) -> FilteredView {
    let mut view = FilteredView::default();
    for entity in collection.entities() {
        let passes = predicates.iter().all(|p| {
            entity
                .number(&p.attribute)
                .map(|v| v >= p.minimum)
                .unwrap_or(false)
        });
        if passes {
            view.all.push(entity.id().clone());
            if correct.contains(entity.id()) {
                view.correct.push(entity.id().clone());
            }
        }
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{AttributeDef, Entity, QuizConfig};
    use crate::types::AttrValue;
    use std::collections::HashMap;

    fn entity(id: &str, pairs: &[(&str, AttrValue)]) -> Entity {
        let properties: HashMap<String, AttrValue> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Entity::new(EntityId::new(id), properties)
    }

    fn text(v: &str) -> AttrValue {
        AttrValue::Text(v.to_string())
    }

    fn num(v: f64) -> AttrValue {
        AttrValue::Number(v)
    }

    fn correct_of(ids: &[&str]) -> HashSet<EntityId> {
        ids.iter().map(EntityId::new).collect()
    }

    fn country_collection() -> Collection {
        let config = QuizConfig {
            attribute_definitions: vec![AttributeDef::new("country", MeasurementLevel::Nominal)],
            ..QuizConfig::default()
        };
        Collection::new(
            vec![
                entity("a", &[("country", text("US"))]),
                entity("b", &[("country", text("US"))]),
                entity("c", &[("country", text("CA"))]),
            ],
            config,
        )
    }

    #[test]
    fn nominal_bins_count_correct_and_total() {
        let collection = country_collection();
        let stats = nominal_stats(&collection, &correct_of(&["a"]), "country");
        assert_eq!(
            stats.bins.get("US"),
            Some(&BinCount { correct: 1, total: 2 })
        );
        assert_eq!(
            stats.bins.get("CA"),
            Some(&BinCount { correct: 0, total: 1 })
        );
        assert_eq!(stats.covered_bins(), 1);
        assert_eq!(stats.total_bins(), 2);
        assert_eq!(stats.bins.get("US").unwrap().percent(), Some(50));
        assert_eq!(stats.bins.get("CA").unwrap().percent(), Some(0));
    }

    #[test]
    fn nominal_undefined_values_form_their_own_bin() {
        let collection = Collection::new(
            vec![
                entity("a", &[("country", text("US"))]),
                entity("b", &[]),
            ],
            QuizConfig::default(),
        );
        let stats = nominal_stats(&collection, &correct_of(&["b"]), "country");
        assert_eq!(
            stats.bins.get(UNDEFINED_BIN),
            Some(&BinCount { correct: 1, total: 1 })
        );
        assert_eq!(stats.total_bins(), 2);
    }

    #[test]
    fn percent_rounds_half_away_from_zero_and_guards_zero() {
        assert_eq!(percent(1.0, 3.0), Some(33));
        assert_eq!(percent(1.0, 2.0), Some(50));
        assert_eq!(percent(5.0, 1000.0), Some(1));
        assert_eq!(percent(1.0, 200.0), Some(1)); // 0.5 rounds up
        assert_eq!(percent(3.0, 0.0), None);
        assert_eq!(percent(0.0, 0.0), None);
    }

    #[test]
    fn weighted_share_reports_correct_proportion() {
        let entities = vec![
            entity("a", &[("prominence", num(250.0))]),
            entity("b", &[("prominence", num(500.0))]),
            entity("c", &[("prominence", num(250.0))]),
        ];
        let collection = Collection::new(entities, QuizConfig::default());
        assert_eq!(
            weighted_share(&collection, &correct_of(&["a"]), "prominence"),
            Some(25)
        );
    }

    #[test]
    fn weighted_share_omitted_when_sum_is_zero() {
        let entities = vec![
            entity("a", &[("prominence", num(0.0))]),
            entity("b", &[]),
        ];
        let collection = Collection::new(entities, QuizConfig::default());
        assert_eq!(
            weighted_share(&collection, &correct_of(&["a"]), "prominence"),
            None
        );
    }

    fn twelve_distinct() -> Collection {
        let entities = (1..=12)
            .map(|v| entity(&format!("e{v}"), &[("elevation", num(v as f64))]))
            .collect();
        Collection::new(entities, QuizConfig::default())
    }

    #[test]
    fn ranking_cutoff_is_value_of_tenth_entity() {
        let collection = twelve_distinct();
        let stats = ranking_stats(&collection, &correct_of(&["e12", "e3"]), "elevation");
        assert_eq!(stats.ranked, 12);
        // Descending over 12..1: the 10th largest is 3.
        assert_eq!(stats.descending.cutoff, Some(3.0));
        assert_eq!(stats.descending.total_at_cutoff, 10);
        assert_eq!(stats.descending.correct_at_cutoff, 2);
        assert_eq!(
            stats.descending.leading_correct,
            vec![EntityId::new("e12"), EntityId::new("e3")]
        );
        // Ascending: the 10th smallest is 10.
        assert_eq!(stats.ascending.cutoff, Some(10.0));
        assert_eq!(stats.ascending.total_at_cutoff, 10);
        assert_eq!(stats.ascending.correct_at_cutoff, 1);
    }

    #[test]
    fn ranking_ties_at_cutoff_extend_membership() {
        // 9 distinct high values plus three tied at the cutoff value.
        let mut entities: Vec<Entity> = (12..=20)
            .map(|v| entity(&format!("e{v}"), &[("elevation", num(v as f64))]))
            .collect();
        entities.push(entity("t1", &[("elevation", num(3.0))]));
        entities.push(entity("t2", &[("elevation", num(3.0))]));
        entities.push(entity("t3", &[("elevation", num(3.0))]));
        let collection = Collection::new(entities, QuizConfig::default());

        let stats = ranking_stats(&collection, &correct_of(&["t3"]), "elevation");
        assert_eq!(stats.descending.cutoff, Some(3.0));
        // All three tied entities are at-or-beyond the cutoff: M exceeds 10.
        assert_eq!(stats.descending.total_at_cutoff, 12);
        assert_eq!(stats.descending.correct_at_cutoff, 1);
    }

    #[test]
    fn ranking_with_fewer_than_depth_uses_last_entity() {
        let entities = vec![
            entity("a", &[("elevation", num(5.0))]),
            entity("b", &[("elevation", num(9.0))]),
        ];
        let collection = Collection::new(entities, QuizConfig::default());
        let stats = ranking_stats(&collection, &HashSet::new(), "elevation");
        assert_eq!(stats.descending.cutoff, Some(5.0));
        assert_eq!(stats.descending.total_at_cutoff, 2);
        assert_eq!(stats.ascending.cutoff, Some(9.0));
    }

    #[test]
    fn ranking_excludes_entities_without_the_attribute() {
        let entities = vec![
            entity("a", &[("elevation", num(5.0))]),
            entity("b", &[]),
            entity("c", &[("elevation", text("unknown"))]),
        ];
        let collection = Collection::new(entities, QuizConfig::default());
        let stats = ranking_stats(&collection, &correct_of(&["b"]), "elevation");
        assert_eq!(stats.ranked, 1);
        assert_eq!(stats.descending.total_at_cutoff, 1);
        assert_eq!(stats.descending.correct_at_cutoff, 0);
        assert!(stats.descending.leading_correct.is_empty());
    }

    #[test]
    fn ranking_over_empty_input_has_no_cutoff() {
        let collection = Collection::new(Vec::new(), QuizConfig::default());
        let stats = ranking_stats(&collection, &HashSet::new(), "elevation");
        assert_eq!(stats.descending.cutoff, None);
        assert_eq!(stats.descending.total_at_cutoff, 0);
    }

    #[test]
    fn compute_stats_selects_view_by_measurement_level() {
        let config = QuizConfig {
            attribute_definitions: vec![
                AttributeDef::new("country", MeasurementLevel::Nominal),
                AttributeDef::new("difficulty", MeasurementLevel::Ordinal),
                AttributeDef::new("prominence", MeasurementLevel::Rational),
            ],
            ..QuizConfig::default()
        };
        let entities = vec![
            entity(
                "a",
                &[
                    ("country", text("US")),
                    ("difficulty", num(2.0)),
                    ("prominence", num(100.0)),
                ],
            ),
            entity(
                "b",
                &[
                    ("country", text("CA")),
                    ("difficulty", num(4.0)),
                    ("prominence", num(300.0)),
                ],
            ),
        ];
        let collection = Collection::new(entities, config);
        let stats = compute_stats(&collection, &correct_of(&["a"]));

        assert_eq!(stats.total_entities, 2);
        assert_eq!(stats.correct_entities, 1);
        assert_eq!(stats.coverage_percent, Some(50));
        assert_eq!(stats.attributes.len(), 3);
        assert!(matches!(stats.attributes[0].view, AttributeView::Nominal(_)));
        assert!(matches!(stats.attributes[1].view, AttributeView::Ranked(_)));
        match &stats.attributes[2].view {
            AttributeView::RankedWeighted { share_percent, .. } => {
                assert_eq!(*share_percent, Some(25));
            }
            other => panic!("expected weighted view, got {other:?}"),
        }
    }

    #[test]
    fn compute_stats_over_empty_collection_omits_percentages() {
        let collection = Collection::new(Vec::new(), QuizConfig::default());
        let stats = compute_stats(&collection, &HashSet::new());
        assert_eq!(stats.coverage_percent, None);
    }

    fn filter_collection() -> Collection {
        Collection::new(
            vec![
                entity("a", &[("prominence", num(600.0)), ("elevation", num(2000.0))]),
                entity("b", &[("prominence", num(150.0)), ("elevation", num(3000.0))]),
                entity("c", &[("elevation", num(3000.0))]),
            ],
            QuizConfig::default(),
        )
    }

    #[test]
    fn filter_requires_every_predicate() {
        let collection = filter_collection();
        let correct = correct_of(&["a", "b"]);
        let predicates = [
            ThresholdPredicate::new("prominence", 500.0),
            ThresholdPredicate::new("elevation", 1000.0),
        ];
        let view = filter_entities(&collection, &correct, &predicates);
        assert_eq!(view.all, vec![EntityId::new("a")]);
        assert_eq!(view.correct, vec![EntityId::new("a")]);
        assert_eq!(view.coverage_percent(), Some(100));
    }

    #[test]
    fn filter_excludes_undefined_values_regardless_of_other_predicates() {
        let collection = filter_collection();
        let correct = correct_of(&["c"]);
        let predicates = [
            ThresholdPredicate::new("prominence", 100.0),
            ThresholdPredicate::new("elevation", 1000.0),
        ];
        let view = filter_entities(&collection, &correct, &predicates);
        assert!(!view.all.contains(&EntityId::new("c")));
        assert!(view.correct.is_empty());
    }

    #[test]
    fn filter_with_no_predicates_passes_everything() {
        let collection = filter_collection();
        let view = filter_entities(&collection, &correct_of(&["b"]), &[]);
        assert_eq!(view.all.len(), 3);
        assert_eq!(view.correct, vec![EntityId::new("b")]);
    }

    #[test]
    fn threshold_control_selects_enumerated_options() {
        let mut control = ThresholdControl::new("prominence", vec![0.0, 100.0, 500.0]);
        assert_eq!(
            control.predicate(),
            Some(ThresholdPredicate::new("prominence", 0.0))
        );
        assert!(control.select(2));
        assert_eq!(control.selected(), 2);
        assert_eq!(
            control.predicate(),
            Some(ThresholdPredicate::new("prominence", 500.0))
        );
        assert!(!control.select(9));
        assert_eq!(control.selected(), 2);
    }
}
