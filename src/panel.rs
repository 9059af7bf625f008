//! Filter panel state
//!
//! Holds the raw control values exactly as typed or selected, applies one edit at a
//! time with min/max constraint enforcement, and turns the raw values into the typed
//! [`FilterConfig`]. Text that does not parse leaves the corresponding clause inactive.

use crate::filter::{parse_number, parse_text, FilterConfig, FoldFilter, ScoreRange, BLANKS};
use crate::payload::{FeatureId, GroupsPayload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Paired text inputs of one range slider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeInput {
    pub min: String,
    pub max: String,
}

impl RangeInput {
    fn new(min: &str, max: &str) -> Self {
        RangeInput { min: min.to_string(), max: max.to_string() }
    }

    fn to_range(&self) -> ScoreRange {
        ScoreRange::new(parse_number(&self.min), parse_number(&self.max))
    }

    /// If min > max, move the bound that was not just edited onto the edited one.
    fn enforce(&mut self, edited: Bound) {
        let (Some(min), Some(max)) = (parse_number(&self.min), parse_number(&self.max)) else {
            return;
        };
        if min > max {
            match edited {
                Bound::Min => self.max = self.min.clone(),
                Bound::Max => self.min = self.max.clone(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeField {
    Novelty,
    Phenotype,
    Match,
    Mz,
    SampleCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowOnly {
    Phenotype,
    Match,
    Annotated,
    NonBlank,
}

/// One interaction with the filter panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum FilterEdit {
    Range { field: RangeField, bound: Bound, value: String },
    ShowOnly { flag: ShowOnly, enabled: bool },
    FindFeature { value: String },
    FoldThreshold { value: String },
    FoldCategory { value: String },
    FoldGroup1 { value: String },
    FoldGroup2 { value: String },
    RequiredGroups { values: Vec<String> },
    ExcludedNetworkGroups { values: Vec<String> },
}

/// Raw values of every filter control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FilterPreset")]
pub struct FilterInputs {
    pub novelty: RangeInput,
    pub phenotype: RangeInput,
    #[serde(rename = "match")]
    pub matching: RangeInput,
    pub mz: RangeInput,
    pub sample_count: RangeInput,
    pub only_phenotype: bool,
    pub only_match: bool,
    pub only_annotated: bool,
    pub hide_blanks: bool,
    pub feature_id: String,
    pub fold_threshold: String,
    pub fold_category: String,
    pub fold_group1: String,
    pub fold_group2: String,
    pub required_groups: BTreeSet<String>,
    pub excluded_network_groups: BTreeSet<String>,
}

impl Default for FilterInputs {
    fn default() -> Self {
        FilterInputs {
            novelty: RangeInput::new("0", "10"),
            phenotype: RangeInput::new("0", "1"),
            matching: RangeInput::new("0", "1"),
            mz: RangeInput::new("0", "10000"),
            sample_count: RangeInput::new("0", "100"),
            only_phenotype: false,
            only_match: false,
            only_annotated: false,
            hide_blanks: false,
            feature_id: String::new(),
            fold_threshold: String::new(),
            fold_category: String::new(),
            fold_group1: String::new(),
            fold_group2: String::new(),
            required_groups: BTreeSet::new(),
            excluded_network_groups: BTreeSet::new(),
        }
    }
}

/// One range of a preset; a missing bound keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RangePreset {
    min: Option<String>,
    max: Option<String>,
}

impl RangePreset {
    fn over(self, default: RangeInput) -> RangeInput {
        RangeInput {
            min: self.min.unwrap_or(default.min),
            max: self.max.unwrap_or(default.max),
        }
    }
}

/// Filter values as written in a preset, merged field by field over the defaults
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilterPreset {
    novelty: RangePreset,
    phenotype: RangePreset,
    #[serde(rename = "match")]
    matching: RangePreset,
    mz: RangePreset,
    sample_count: RangePreset,
    only_phenotype: Option<bool>,
    only_match: Option<bool>,
    only_annotated: Option<bool>,
    hide_blanks: Option<bool>,
    feature_id: Option<String>,
    fold_threshold: Option<String>,
    fold_category: Option<String>,
    fold_group1: Option<String>,
    fold_group2: Option<String>,
    required_groups: Option<BTreeSet<String>>,
    excluded_network_groups: Option<BTreeSet<String>>,
}

impl From<FilterPreset> for FilterInputs {
    fn from(p: FilterPreset) -> Self {
        let d = FilterInputs::default();
        FilterInputs {
            novelty: p.novelty.over(d.novelty),
            phenotype: p.phenotype.over(d.phenotype),
            matching: p.matching.over(d.matching),
            mz: p.mz.over(d.mz),
            sample_count: p.sample_count.over(d.sample_count),
            only_phenotype: p.only_phenotype.unwrap_or(d.only_phenotype),
            only_match: p.only_match.unwrap_or(d.only_match),
            only_annotated: p.only_annotated.unwrap_or(d.only_annotated),
            hide_blanks: p.hide_blanks.unwrap_or(d.hide_blanks),
            feature_id: p.feature_id.unwrap_or(d.feature_id),
            fold_threshold: p.fold_threshold.unwrap_or(d.fold_threshold),
            fold_category: p.fold_category.unwrap_or(d.fold_category),
            fold_group1: p.fold_group1.unwrap_or(d.fold_group1),
            fold_group2: p.fold_group2.unwrap_or(d.fold_group2),
            required_groups: p.required_groups.unwrap_or(d.required_groups),
            excluded_network_groups: p.excluded_network_groups.unwrap_or(d.excluded_network_groups),
        }
    }
}

/// Multi-select semantics: picking the empty entry deselects everything.
fn selection(values: Vec<String>) -> BTreeSet<String> {
    if values.iter().any(|v| v.is_empty()) {
        BTreeSet::new()
    } else {
        values.into_iter().collect()
    }
}

impl FilterInputs {
    fn range_mut(&mut self, field: RangeField) -> &mut RangeInput {
        match field {
            RangeField::Novelty => &mut self.novelty,
            RangeField::Phenotype => &mut self.phenotype,
            RangeField::Match => &mut self.matching,
            RangeField::Mz => &mut self.mz,
            RangeField::SampleCount => &mut self.sample_count,
        }
    }

    /// Apply one edit, enforcing the min/max constraint of range inputs.
    pub fn apply(&mut self, edit: FilterEdit) {
        match edit {
            FilterEdit::Range { field, bound, value } => {
                let range = self.range_mut(field);
                match bound {
                    Bound::Min => range.min = value,
                    Bound::Max => range.max = value,
                }
                range.enforce(bound);
            }
            FilterEdit::ShowOnly { flag, enabled } => match flag {
                ShowOnly::Phenotype => self.only_phenotype = enabled,
                ShowOnly::Match => self.only_match = enabled,
                ShowOnly::Annotated => self.only_annotated = enabled,
                ShowOnly::NonBlank => self.hide_blanks = enabled,
            },
            FilterEdit::FindFeature { value } => self.feature_id = value,
            FilterEdit::FoldThreshold { value } => self.fold_threshold = value,
            FilterEdit::FoldCategory { value } => {
                self.fold_category = value;
                self.fold_group1.clear();
                self.fold_group2.clear();
            }
            FilterEdit::FoldGroup1 { value } => self.fold_group1 = value,
            FilterEdit::FoldGroup2 { value } => self.fold_group2 = value,
            FilterEdit::RequiredGroups { values } => self.required_groups = selection(values),
            FilterEdit::ExcludedNetworkGroups { values } => self.excluded_network_groups = selection(values),
        }
    }

    pub fn reset(&mut self) {
        *self = FilterInputs::default();
    }

    pub fn to_config(&self) -> FilterConfig {
        FilterConfig {
            novelty: self.novelty.to_range(),
            phenotype: self.phenotype.to_range(),
            matching: self.matching.to_range(),
            only_phenotype: self.only_phenotype,
            only_match: self.only_match,
            only_annotated: self.only_annotated,
            hide_blanks: self.hide_blanks,
            feature_id: parse_text(&self.feature_id).map(FeatureId::new),
            mz: self.mz.to_range(),
            sample_count: self.sample_count.to_range(),
            fold: FoldFilter {
                threshold: parse_number(&self.fold_threshold),
                category: parse_text(&self.fold_category),
                group1: parse_text(&self.fold_group1),
                group2: parse_text(&self.fold_group2),
            },
            required_groups: self.required_groups.clone(),
            excluded_network_groups: self.excluded_network_groups.clone(),
        }
    }
}

/// One entry of a select control; category headers carry no value and are disabled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: Option<String>,
    pub label: String,
    pub disabled: bool,
    pub selected: bool,
}

impl SelectOption {
    fn value(value: &str, label: &str, selected: bool) -> Self {
        SelectOption { value: Some(value.to_string()), label: label.to_string(), disabled: false, selected }
    }

    fn header(label: &str) -> Self {
        SelectOption { value: None, label: label.to_string(), disabled: true, selected: false }
    }
}

/// Option lists of every select control for the current panel state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelOptions {
    pub fold_categories: Vec<SelectOption>,
    pub fold_group1: Vec<SelectOption>,
    pub fold_group2: Vec<SelectOption>,
    /// Group selects are disabled until a category is chosen
    pub fold_groups_enabled: bool,
    pub required_groups: Vec<SelectOption>,
    pub excluded_network_groups: Vec<SelectOption>,
}

fn grouped_values(groups: &GroupsPayload, selected: &BTreeSet<String>, out: &mut Vec<SelectOption>) {
    for (category, values) in groups {
        out.push(SelectOption::header(category));
        out.extend(values.iter().map(|v| SelectOption::value(v, v, selected.contains(v))));
    }
}

pub fn options(groups: &GroupsPayload, inputs: &FilterInputs) -> PanelOptions {
    let category = parse_text(&inputs.fold_category);
    let mut fold_categories = vec![SelectOption::value("", "Select category", category.is_none())];
    fold_categories.extend(
        groups
            .keys()
            .map(|c| SelectOption::value(c, c, category.as_deref() == Some(c.as_str()))),
    );

    let category_values = category.as_ref().and_then(|c| groups.get(c));
    let group_select = |placeholder: &str, chosen: &str| {
        let mut opts = vec![SelectOption::value("", placeholder, chosen.is_empty())];
        if let Some(values) = category_values {
            opts.extend(values.iter().map(|v| SelectOption::value(v, v, v == chosen)));
        }
        opts
    };

    let mut required_groups = vec![SelectOption::value("", "Select group", false)];
    grouped_values(groups, &inputs.required_groups, &mut required_groups);

    let mut excluded_network_groups = vec![
        SelectOption::value("", "Select group", false),
        SelectOption::value(BLANKS, "Blanks", inputs.excluded_network_groups.contains(BLANKS)),
    ];
    grouped_values(groups, &inputs.excluded_network_groups, &mut excluded_network_groups);

    PanelOptions {
        fold_categories,
        fold_group1: group_select("group 1", &inputs.fold_group1),
        fold_group2: group_select("group 2", &inputs.fold_group2),
        fold_groups_enabled: category_values.is_some(),
        required_groups,
        excluded_network_groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn range(field: RangeField, bound: Bound, value: &str) -> FilterEdit {
        FilterEdit::Range { field, bound, value: value.to_string() }
    }

    #[test]
    fn test_defaults_match_filter_config() {
        assert_eq!(FilterInputs::default().to_config(), FilterConfig::default());
    }

    #[test]
    fn test_min_above_max_moves_max() {
        let mut inputs = FilterInputs::default();
        inputs.apply(range(RangeField::Novelty, Bound::Min, "7"));
        inputs.apply(range(RangeField::Novelty, Bound::Max, "5"));
        // editing max below min drags min down
        assert_eq!(inputs.novelty, RangeInput::new("5", "5"));

        inputs.apply(range(RangeField::Novelty, Bound::Min, "8"));
        assert_eq!(inputs.novelty, RangeInput::new("8", "8"));
    }

    #[test]
    fn test_unparseable_text_is_no_constraint() {
        let mut inputs = FilterInputs::default();
        inputs.apply(range(RangeField::Mz, Bound::Max, "abc"));
        assert_eq!(inputs.mz.max, "abc");
        let cfg = inputs.to_config();
        assert_eq!(cfg.mz, ScoreRange::new(Some(0.0), None));

        inputs.apply(range(RangeField::SampleCount, Bound::Max, ""));
        assert_eq!(inputs.to_config().sample_count.max, None);
    }

    #[test]
    fn test_fold_category_clears_groups() {
        let mut inputs = FilterInputs::default();
        inputs.apply(FilterEdit::FoldCategory { value: "site".into() });
        inputs.apply(FilterEdit::FoldGroup1 { value: "siteA".into() });
        inputs.apply(FilterEdit::FoldGroup2 { value: "siteB".into() });
        inputs.apply(FilterEdit::FoldThreshold { value: "0".into() });
        let fold = inputs.to_config().fold;
        assert!(fold.is_active());
        assert_eq!(fold.threshold, Some(0.0));

        inputs.apply(FilterEdit::FoldCategory { value: "treatment".into() });
        assert!(inputs.fold_group1.is_empty());
        assert!(!inputs.to_config().fold.is_active());
    }

    #[test]
    fn test_empty_entry_deselects_all() {
        let mut inputs = FilterInputs::default();
        inputs.apply(FilterEdit::ExcludedNetworkGroups { values: vec!["blanks".into(), "siteA".into()] });
        assert_eq!(inputs.excluded_network_groups.len(), 2);
        inputs.apply(FilterEdit::ExcludedNetworkGroups { values: vec!["siteA".into(), String::new()] });
        assert!(inputs.excluded_network_groups.is_empty());
    }

    #[test]
    fn test_reset_restores_documented_defaults() {
        let mut inputs = FilterInputs::default();
        inputs.apply(FilterEdit::ShowOnly { flag: ShowOnly::NonBlank, enabled: true });
        inputs.apply(FilterEdit::FindFeature { value: "101".into() });
        inputs.apply(FilterEdit::RequiredGroups { values: vec!["siteA".into()] });
        inputs.apply(range(RangeField::Phenotype, Bound::Min, "0.5"));
        let cfg = inputs.to_config();
        assert!(cfg.hide_blanks);
        assert_eq!(cfg.feature_id, Some(FeatureId::from("101")));

        inputs.reset();
        assert_eq!(inputs, FilterInputs::default());
    }

    #[test]
    fn test_edit_wire_format() {
        let edit: FilterEdit =
            serde_json::from_str(r#"{"edit":"range","field":"sample_count","bound":"max","value":"3"}"#).unwrap();
        assert_eq!(edit, range(RangeField::SampleCount, Bound::Max, "3"));
        let edit: FilterEdit = serde_json::from_str(r#"{"edit":"show_only","flag":"non_blank","enabled":true}"#).unwrap();
        assert_eq!(edit, FilterEdit::ShowOnly { flag: ShowOnly::NonBlank, enabled: true });
    }

    #[test]
    fn test_preset_fills_missing_fields_with_defaults() {
        let inputs: FilterInputs = serde_yaml::from_str("novelty: {min: \"2\"}\nhide_blanks: true\n").unwrap();
        assert_eq!(inputs.novelty, RangeInput::new("2", "10"));
        assert!(inputs.hide_blanks);
        assert_eq!(inputs.mz, RangeInput::new("0", "10000"));
        assert_eq!(inputs.to_config().novelty, ScoreRange::bounded(2.0, 10.0));

        let inputs: FilterInputs = serde_yaml::from_str("sample_count: {max: \"3\"}\n").unwrap();
        assert_eq!(inputs.sample_count, RangeInput::new("0", "3"));

        // an explicitly empty bound is kept and leaves that end open
        let inputs: FilterInputs = serde_yaml::from_str("mz: {max: \"\"}\n").unwrap();
        assert_eq!(inputs.to_config().mz, ScoreRange::new(Some(0.0), None));
    }

    #[test]
    fn test_partial_preset_keeps_novelty_upper_bound() {
        let ds = fixtures::dataset();
        let sample = crate::sample::SampleData::from_dataset("sample1", &ds).unwrap();
        let inputs: FilterInputs = serde_yaml::from_str("novelty: {min: \"2\"}\n").unwrap();
        let cfg = inputs.to_config();
        let criteria = crate::filter::Criteria::new(&cfg, crate::payload::NetworkKind::ModifiedCosine, ds.feature_groups());
        // 104 has novelty 11
        let i = sample.index_of(&FeatureId::from("104")).unwrap();
        assert!(!criteria.retains(&sample, i));
        assert_eq!(criteria.count_retained(&sample), 3);
    }

    #[test]
    fn test_options() {
        let groups = fixtures::groups();
        let mut inputs = FilterInputs::default();
        let opts = options(&groups, &inputs);
        assert_eq!(opts.fold_categories.len(), 3);
        assert!(!opts.fold_groups_enabled);
        assert_eq!(opts.fold_group1.len(), 1);
        // placeholder, blanks, two headers, four values
        assert_eq!(opts.excluded_network_groups.len(), 8);
        assert_eq!(opts.excluded_network_groups[1].value.as_deref(), Some("blanks"));
        assert_eq!(opts.required_groups.len(), 7);
        assert!(opts.required_groups[1].disabled);

        inputs.apply(FilterEdit::FoldCategory { value: "site".into() });
        inputs.apply(FilterEdit::FoldGroup2 { value: "siteB".into() });
        let opts = options(&groups, &inputs);
        assert!(opts.fold_groups_enabled);
        assert_eq!(opts.fold_group1.len(), 3);
        assert!(opts.fold_group2[2].selected);
        assert!(opts.fold_categories[1].selected);
    }
}
