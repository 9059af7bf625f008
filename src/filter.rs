//! Feature filter predicate
//!
//! Every clause is combined with AND; an inactive clause (bound not set, flag off,
//! empty selection) always passes. Unset values are `None`, never NaN.

use crate::payload::{FeatureGroupsPayload, FeatureId, NetworkKind};
use crate::sample::{FeatureRef, SampleData};
use serde::Serialize;
use std::collections::BTreeSet;

/// Value of the network-exclusion selection that stands for blank-associated features
pub const BLANKS: &str = "blanks";

/// Closed interval with optional ends; a missing end does not constrain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ScoreRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        ScoreRange { min, max }
    }

    pub fn bounded(min: f64, max: f64) -> Self {
        ScoreRange { min: Some(min), max: Some(max) }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// A missing value is never out of range.
    pub fn admits(&self, value: Option<f64>) -> bool {
        value.map_or(true, |v| self.contains(v))
    }
}

/// Minimum fold change between two groups of one grouping category
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FoldFilter {
    pub threshold: Option<f64>,
    pub category: Option<String>,
    pub group1: Option<String>,
    pub group2: Option<String>,
}

impl FoldFilter {
    /// Active only when all four inputs are set.
    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.threshold.is_some() && self.category.is_some() && self.group1.is_some() && self.group2.is_some()
    }

    fn passes(&self, feature: &FeatureRef<'_>) -> bool {
        let (Some(threshold), Some(category), Some(g1), Some(g2)) =
            (self.threshold, &self.category, &self.group1, &self.group2)
        else {
            return true;
        };
        feature
            .fold_changes
            .get(category)
            .map(|folds| folds.iter().any(|f| f.matches_pair(g1, g2) && f.factor >= threshold))
            .unwrap_or(false)
    }
}

/// Active filter settings, rebuilt on every control interaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterConfig {
    pub novelty: ScoreRange,
    pub phenotype: ScoreRange,
    pub matching: ScoreRange,
    pub only_phenotype: bool,
    pub only_match: bool,
    pub only_annotated: bool,
    pub hide_blanks: bool,
    pub feature_id: Option<FeatureId>,
    pub mz: ScoreRange,
    pub sample_count: ScoreRange,
    pub fold: FoldFilter,
    pub required_groups: BTreeSet<String>,
    pub excluded_network_groups: BTreeSet<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            novelty: ScoreRange::bounded(0.0, 10.0),
            phenotype: ScoreRange::bounded(0.0, 1.0),
            matching: ScoreRange::bounded(0.0, 1.0),
            only_phenotype: false,
            only_match: false,
            only_annotated: false,
            hide_blanks: false,
            feature_id: None,
            mz: ScoreRange::bounded(0.0, 10000.0),
            sample_count: ScoreRange::bounded(0.0, 100.0),
            fold: FoldFilter::default(),
            required_groups: BTreeSet::new(),
            excluded_network_groups: BTreeSet::new(),
        }
    }
}

impl FilterConfig {
    /// A configuration in which no clause constrains anything.
    #[cfg(test)]
    pub fn unconstrained() -> Self {
        FilterConfig {
            novelty: ScoreRange::default(),
            phenotype: ScoreRange::default(),
            matching: ScoreRange::default(),
            mz: ScoreRange::default(),
            sample_count: ScoreRange::default(),
            ..FilterConfig::default()
        }
    }
}

/// Everything the predicate needs besides the feature itself
#[derive(Debug, Clone, Copy)]
pub struct Criteria<'a> {
    pub config: &'a FilterConfig,
    pub network: NetworkKind,
    pub feature_groups: &'a FeatureGroupsPayload,
}

impl<'a> Criteria<'a> {
    pub fn new(config: &'a FilterConfig, network: NetworkKind, feature_groups: &'a FeatureGroupsPayload) -> Self {
        Criteria { config, network, feature_groups }
    }

    fn groups_of(&self, id: &FeatureId) -> &'a [String] {
        self.feature_groups.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether feature `i` of `sample` is retained. Blank association of network
    /// neighbours is looked up in the same sample.
    pub fn retains(&self, sample: &SampleData, i: usize) -> bool {
        let feature = sample.feature(i);
        let cfg = self.config;

        cfg.novelty.admits(feature.novelty)
            && (!cfg.only_phenotype
                || feature.phenotype_score().map_or(false, |s| cfg.phenotype.contains(s)))
            && (!cfg.only_match || feature.match_score().map_or(false, |s| cfg.matching.contains(s)))
            && (!cfg.only_annotated || !feature.annotations.adducts.is_empty())
            && (!cfg.hide_blanks || !feature.blank)
            && cfg.feature_id.as_ref().map_or(true, |id| id == feature.id)
            && (cfg.mz.max.is_none() || cfg.mz.admits(feature.mz))
            && (cfg.sample_count.max.is_none() || cfg.sample_count.contains(feature.sample_count() as f64))
            && cfg.fold.passes(&feature)
            && self.in_required_group(&feature)
            && self.network_is_clean(sample, &feature)
    }

    fn in_required_group(&self, feature: &FeatureRef<'_>) -> bool {
        if self.config.required_groups.is_empty() {
            return true;
        }
        self.groups_of(feature.id)
            .iter()
            .any(|g| self.config.required_groups.contains(g))
    }

    fn network_is_clean(&self, sample: &SampleData, feature: &FeatureRef<'_>) -> bool {
        let excluded = &self.config.excluded_network_groups;
        if excluded.is_empty() {
            return true;
        }
        let members = feature.co_cluster(self.network);
        if members.is_empty() {
            return false;
        }
        let exclude_blanks = excluded.contains(BLANKS);
        !members.iter().any(|id| {
            (exclude_blanks && sample.is_blank(id)) || self.groups_of(id).iter().any(|g| excluded.contains(g))
        })
    }

    /// Number of retained features of a sample.
    pub fn count_retained(&self, sample: &SampleData) -> usize {
        (0..sample.len()).filter(|&i| self.retains(sample, i)).count()
    }
}

/// Parse a numeric text input; empty or malformed text means "no constraint".
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a free-text or select value; blank means unset.
pub fn parse_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn sample1() -> (crate::payload::Dataset, SampleData) {
        let ds = fixtures::dataset();
        let sample = SampleData::from_dataset("sample1", &ds).unwrap();
        (ds, sample)
    }

    fn retained_ids(ds: &crate::payload::Dataset, sample: &SampleData, cfg: &FilterConfig) -> Vec<String> {
        let criteria = Criteria::new(cfg, NetworkKind::ModifiedCosine, ds.feature_groups());
        (0..sample.len())
            .filter(|&i| criteria.retains(sample, i))
            .map(|i| sample.feature_id[i].to_string())
            .collect()
    }

    #[test]
    fn test_default_config_novelty_domain() {
        let (ds, sample) = sample1();
        // 104 has novelty 11, outside the 0-10 display range
        assert_eq!(retained_ids(&ds, &sample, &FilterConfig::default()), vec!["101", "102", "103"]);
    }

    #[test]
    fn test_novelty_range() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig { novelty: ScoreRange::bounded(4.0, 9.0), ..FilterConfig::default() };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101", "103"]);
    }

    #[test]
    fn test_show_only_phenotype_requires_score() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig { only_phenotype: true, ..FilterConfig::default() };
        // 103 has a phenotype record with a null score
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101"]);

        let cfg = FilterConfig {
            only_phenotype: true,
            phenotype: ScoreRange::bounded(0.95, 1.0),
            ..FilterConfig::default()
        };
        assert!(retained_ids(&ds, &sample, &cfg).is_empty());
    }

    #[test]
    fn test_show_only_match_and_annotation() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig { only_match: true, ..FilterConfig::default() };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101"]);
        let cfg = FilterConfig { only_annotated: true, ..FilterConfig::default() };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101"]);
    }

    #[test]
    fn test_hide_blanks() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig { hide_blanks: true, ..FilterConfig::default() };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101", "103"]);
    }

    #[test]
    fn test_exact_feature_id() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig { feature_id: Some(FeatureId::from("103")), ..FilterConfig::default() };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["103"]);
    }

    #[test]
    fn test_mz_and_sample_count() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig { mz: ScoreRange::bounded(300.0, 500.0), ..FilterConfig::default() };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101", "102"]);

        // no upper bound: the clause is inactive even with a lower bound set
        let cfg = FilterConfig { mz: ScoreRange::new(Some(900.0), None), ..FilterConfig::default() };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101", "102", "103"]);

        let cfg = FilterConfig { sample_count: ScoreRange::bounded(2.0, 100.0), ..FilterConfig::default() };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101", "102"]);
    }

    #[test]
    fn test_fold_clause_symmetric_and_vacuous() {
        let (ds, sample) = sample1();
        let fold = |g1: &str, g2: &str, t: f64| FilterConfig {
            fold: FoldFilter {
                threshold: Some(t),
                category: Some("site".into()),
                group1: Some(g1.into()),
                group2: Some(g2.into()),
            },
            ..FilterConfig::default()
        };
        assert_eq!(retained_ids(&ds, &sample, &fold("siteA", "siteB", 2.0)), vec!["101"]);
        assert_eq!(retained_ids(&ds, &sample, &fold("siteB", "siteA", 2.0)), vec!["101"]);
        assert!(retained_ids(&ds, &sample, &fold("siteA", "siteB", 3.0)).is_empty());

        // any unset input disables the clause
        let mut cfg = fold("siteA", "siteB", 3.0);
        cfg.fold.group2 = None;
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["101", "102", "103"]);
    }

    #[test]
    fn test_required_groups() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig::default();
        assert_eq!(retained_ids(&ds, &sample, &cfg).len(), 3);

        let cfg = FilterConfig {
            required_groups: ["drug".to_string(), "siteB".to_string()].into(),
            ..FilterConfig::default()
        };
        assert_eq!(retained_ids(&ds, &sample, &cfg), vec!["102", "103"]);
    }

    #[test]
    fn test_network_exclusion_blanks() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig {
            excluded_network_groups: [BLANKS.to_string()].into(),
            ..FilterConfig::default()
        };
        // cosine cluster [101, 102] touches blank 102; 103 has no cosine cluster
        assert!(retained_ids(&ds, &sample, &cfg).is_empty());

        let criteria = Criteria::new(&cfg, NetworkKind::Ms2DeepScore, ds.feature_groups());
        let kept: Vec<_> = (0..sample.len()).filter(|&i| criteria.retains(&sample, i)).collect();
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn test_network_exclusion_groups() {
        let (ds, sample) = sample1();
        let cfg = FilterConfig {
            excluded_network_groups: ["drug".to_string()].into(),
            ..FilterConfig::default()
        };
        let criteria = Criteria::new(&cfg, NetworkKind::Ms2DeepScore, ds.feature_groups());
        // deepscore cluster [101, 103] contains 103 which belongs to "drug"
        assert_eq!(criteria.count_retained(&sample), 0);
    }

    #[test]
    fn test_widening_never_drops_features() {
        let (ds, sample) = sample1();
        let narrow = [
            FilterConfig { novelty: ScoreRange::bounded(4.0, 6.0), ..FilterConfig::default() },
            FilterConfig { mz: ScoreRange::bounded(300.0, 310.0), ..FilterConfig::default() },
            FilterConfig { sample_count: ScoreRange::bounded(2.0, 2.0), ..FilterConfig::default() },
            FilterConfig { only_phenotype: true, phenotype: ScoreRange::bounded(0.8, 0.95), ..FilterConfig::default() },
            FilterConfig { hide_blanks: true, only_annotated: true, ..FilterConfig::default() },
        ];
        for cfg in narrow {
            let before = retained_ids(&ds, &sample, &cfg);
            let widened = [
                FilterConfig { novelty: ScoreRange::bounded(0.0, 20.0), ..cfg.clone() },
                FilterConfig { mz: ScoreRange::bounded(0.0, 10000.0), ..cfg.clone() },
                FilterConfig { sample_count: ScoreRange::new(Some(0.0), None), ..cfg.clone() },
                FilterConfig { only_phenotype: false, ..cfg.clone() },
                FilterConfig { hide_blanks: false, only_annotated: false, ..cfg.clone() },
            ];
            for wide in widened {
                let after = retained_ids(&ds, &sample, &wide);
                for id in &before {
                    assert!(after.contains(id), "{id} dropped after widening {wide:?}");
                }
            }
        }
    }

    #[test]
    fn test_count_matches_predicate() {
        let ds = fixtures::dataset();
        let configs = [
            FilterConfig::default(),
            FilterConfig::unconstrained(),
            FilterConfig { hide_blanks: true, ..FilterConfig::default() },
            FilterConfig { excluded_network_groups: [BLANKS.to_string()].into(), ..FilterConfig::default() },
        ];
        for name in ds.sample_names() {
            let sample = SampleData::from_dataset(name, &ds).unwrap();
            for cfg in &configs {
                let criteria = Criteria::new(cfg, NetworkKind::ModifiedCosine, ds.feature_groups());
                let expected = (0..sample.len()).filter(|&i| criteria.retains(&sample, i)).count();
                assert_eq!(criteria.count_retained(&sample), expected);
            }
        }
    }

    #[test]
    fn test_unconstrained_retains_everything() {
        let (ds, sample) = sample1();
        assert_eq!(retained_ids(&ds, &sample, &FilterConfig::unconstrained()).len(), 4);
    }

    #[test]
    fn test_missing_novelty_or_mz_passes_default_ranges() {
        let records: Vec<crate::payload::FeatureRecord> = serde_json::from_value(serde_json::json!([
            {"f_id": 1, "novelty": null, "mz": 250.0, "samples": ["s1"]},
            {"f_id": 2, "novelty": 3.0, "mz": null, "samples": ["s1"]},
        ]))
        .unwrap();
        let sample = SampleData::from_records("s1", &records, Default::default());
        let groups = FeatureGroupsPayload::default();

        let cfg = FilterConfig::default();
        let criteria = Criteria::new(&cfg, NetworkKind::ModifiedCosine, &groups);
        assert!(criteria.retains(&sample, 0));
        assert!(criteria.retains(&sample, 1));
        assert_eq!(criteria.count_retained(&sample), 2);

        // narrowing a range only drops features whose value lies outside it
        let cfg = FilterConfig { novelty: ScoreRange::bounded(4.0, 6.0), ..FilterConfig::default() };
        let criteria = Criteria::new(&cfg, NetworkKind::ModifiedCosine, &groups);
        assert!(criteria.retains(&sample, 0));
        assert!(!criteria.retains(&sample, 1));

        let cfg = FilterConfig { mz: ScoreRange::bounded(100.0, 200.0), ..FilterConfig::default() };
        let criteria = Criteria::new(&cfg, NetworkKind::ModifiedCosine, &groups);
        assert!(!criteria.retains(&sample, 0));
        assert!(criteria.retains(&sample, 1));
    }

    #[test]
    fn test_parse_inputs() {
        assert_eq!(parse_number(" 2.5 "), Some(2.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_text("  "), None);
        assert_eq!(parse_text("null"), None);
        assert_eq!(parse_text(" siteA "), Some("siteA".to_string()));
    }
}
