//! Column-oriented view of one sample's features
//!
//! The chromatogram payload arrives row-oriented (one record per feature). Plotting
//! thousands of peaks wants the opposite: one array per attribute, index-aligned.

use crate::error::DashboardError;
use crate::payload::{Annotations, Dataset, FeatureId, FeatureRecord, FoldChange, NetworkKind, SampleValue};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Lower bound of the shared x range shrinks by this fraction
const RANGE_LOWER_PAD: f64 = 0.05;
/// Upper bound of the shared x range grows by this fraction
const RANGE_UPPER_PAD: f64 = 0.02;

/// Shared retention-time axis range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlotRange {
    pub lower: f64,
    pub upper: f64,
}

impl Default for PlotRange {
    fn default() -> Self {
        PlotRange { lower: 0.0, upper: 1.0 }
    }
}

impl PlotRange {
    /// Range over every retention time of every trace, padded.
    pub fn across<'a>(features: impl IntoIterator<Item = &'a FeatureRecord>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for rt in features.into_iter().flat_map(|f| f.trace_rt.iter().copied()) {
            min = min.min(rt);
            max = max.max(rt);
        }
        if !min.is_finite() || !max.is_finite() {
            return PlotRange::default();
        }
        PlotRange {
            lower: min - min * RANGE_LOWER_PAD,
            upper: max + max * RANGE_UPPER_PAD,
        }
    }

    pub fn span(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Borrowed view of one feature (one index across all columns)
#[derive(Debug, Clone, Copy)]
pub struct FeatureRef<'a> {
    pub id: &'a FeatureId,
    pub mz: Option<f64>,
    pub novelty: Option<f64>,
    pub blank: bool,
    pub samples: &'a [String],
    pub annotations: &'a Annotations,
    pub fold_changes: &'a BTreeMap<String, Vec<FoldChange>>,
    pub network_cosine: &'a [FeatureId],
    pub network_deepscore: &'a [FeatureId],
}

impl<'a> FeatureRef<'a> {
    /// Feature ids sharing this feature's cluster in the given network.
    pub fn co_cluster(&self, kind: NetworkKind) -> &'a [FeatureId] {
        match kind {
            NetworkKind::ModifiedCosine => self.network_cosine,
            NetworkKind::Ms2DeepScore => self.network_deepscore,
        }
    }

    /// Score of the first phenotype annotation, if any.
    pub fn phenotype_score(&self) -> Option<f64> {
        self.annotations.phenotypes.first().and_then(|p| p.score)
    }

    /// Score of the first library match, if any.
    pub fn match_score(&self) -> Option<f64> {
        self.annotations.matches.first().and_then(|m| m.score)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Per-attribute arrays for the features of one sample
#[derive(Debug, Clone)]
pub struct SampleData {
    pub name: String,
    pub feature_id: Vec<FeatureId>,
    pub trace_rt: Vec<Vec<f64>>,
    pub trace_int: Vec<Vec<f64>>,
    pub abs_int: Vec<Option<f64>>,
    pub rel_int: Vec<Option<f64>>,
    pub ret_time: Vec<Option<f64>>,
    pub prec_mz: Vec<Option<f64>>,
    pub novelty: Vec<Option<f64>>,
    pub blank: Vec<bool>,
    pub samples: Vec<Vec<String>>,
    pub network_cosine: Vec<Vec<FeatureId>>,
    pub network_deepscore: Vec<Vec<FeatureId>>,
    pub cluster_cosine: Vec<Option<String>>,
    pub cluster_deepscore: Vec<Option<String>>,
    pub fold_changes: Vec<BTreeMap<String, Vec<FoldChange>>>,
    pub sample_intensity: Vec<Vec<SampleValue>>,
    pub sample_area: Vec<Vec<SampleValue>>,
    pub annotations: Vec<Annotations>,
    pub plot_range: PlotRange,
    index: HashMap<FeatureId, usize>,
}

impl SampleData {
    /// Reshape one sample of the dataset. The dataset is not modified.
    pub fn from_dataset(name: &str, dataset: &Dataset) -> Result<Self, DashboardError> {
        let records = dataset
            .sample(name)
            .ok_or_else(|| DashboardError::SampleNotFound(name.to_string()))?;
        Ok(Self::from_records(name, records, dataset.plot_range()))
    }

    pub fn from_records(name: &str, records: &[FeatureRecord], plot_range: PlotRange) -> Self {
        let column = |f: fn(&FeatureRecord) -> Option<f64>| records.iter().map(f).collect::<Vec<_>>();

        SampleData {
            name: name.to_string(),
            feature_id: records.iter().map(|r| r.f_id.clone()).collect(),
            trace_rt: records.iter().map(|r| r.trace_rt.clone()).collect(),
            trace_int: records.iter().map(|r| r.trace_int.clone()).collect(),
            abs_int: column(|r| r.abs_int),
            rel_int: column(|r| r.rel_int),
            ret_time: column(|r| r.rt),
            prec_mz: column(|r| r.mz),
            novelty: column(|r| r.novelty),
            blank: records.iter().map(|r| r.blank).collect(),
            samples: records.iter().map(|r| r.samples.clone()).collect(),
            network_cosine: records.iter().map(|r| r.n_features_cosine.clone()).collect(),
            network_deepscore: records.iter().map(|r| r.n_features_deepscore.clone()).collect(),
            cluster_cosine: records.iter().map(|r| r.n_cos_id.clone()).collect(),
            cluster_deepscore: records.iter().map(|r| r.n_ms2d_id.clone()).collect(),
            fold_changes: records.iter().map(|r| r.f_group.clone()).collect(),
            sample_intensity: records.iter().map(|r| r.f_sample.clone()).collect(),
            sample_area: records.iter().map(|r| r.a_sample.clone()).collect(),
            annotations: records.iter().map(|r| r.annotations.clone()).collect(),
            plot_range,
            index: records.iter().enumerate().map(|(i, r)| (r.f_id.clone(), i)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.feature_id.len()
    }

    pub fn index_of(&self, id: &FeatureId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn feature(&self, i: usize) -> FeatureRef<'_> {
        FeatureRef {
            id: &self.feature_id[i],
            mz: self.prec_mz[i],
            novelty: self.novelty[i],
            blank: self.blank[i],
            samples: &self.samples[i],
            annotations: &self.annotations[i],
            fold_changes: &self.fold_changes[i],
            network_cosine: &self.network_cosine[i],
            network_deepscore: &self.network_deepscore[i],
        }
    }

    /// Blank association of a feature of this sample; ids outside the sample are not blank.
    pub fn is_blank(&self, id: &FeatureId) -> bool {
        self.index_of(id).map(|i| self.blank[i]).unwrap_or(false)
    }

    pub fn cluster_id(&self, i: usize, kind: NetworkKind) -> Option<&str> {
        match kind {
            NetworkKind::ModifiedCosine => self.cluster_cosine[i].as_deref(),
            NetworkKind::Ms2DeepScore => self.cluster_deepscore[i].as_deref(),
        }
    }

    /// Highest intensity of a feature's trace; NaN for an empty trace.
    pub fn peak_max(&self, i: usize) -> f64 {
        self.trace_int[i].iter().copied().fold(f64::NAN, f64::max)
    }
}
