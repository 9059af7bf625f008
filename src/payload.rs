//! Inbound dashboard payloads
//!
//! Typed schemas for the JSON the analysis server precomputes: per-sample feature
//! tables, molecular networks, grouping metadata and the feature → group lookup.
//! Everything is validated once on ingestion so the rest of the crate never has to
//! second-guess array lengths or duplicate ids.

use crate::error::DashboardError;
use crate::sample::PlotRange;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Identifier of a feature within the dataset.
///
/// The server emits ids either as JSON integers or as strings; both normalise to
/// the same textual form so `12` and `"12"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        FeatureId(id.into().trim().to_string())
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        FeatureId::new(s)
    }
}

impl<'de> Deserialize<'de> for FeatureId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        lenient::string(deserializer).map(FeatureId::new)
    }
}

/// Deserializers for fields that arrive as numbers or strings (or null).
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        UInt(u64),
        Float(f64),
        Text(String),
    }

    impl Raw {
        fn into_string(self) -> String {
            match self {
                Raw::Int(n) => n.to_string(),
                Raw::UInt(n) => n.to_string(),
                Raw::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => format!("{}", x as i64),
                Raw::Float(x) => x.to_string(),
                Raw::Text(s) => s,
            }
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Raw::deserialize(d).map(Raw::into_string)
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<Raw>::deserialize(d)?.map(Raw::into_string))
    }

    pub fn vec_string<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(Option::<Vec<Raw>>::deserialize(d)?
            .unwrap_or_default()
            .into_iter()
            .map(Raw::into_string)
            .collect())
    }

    /// `null` and a missing field both mean "empty".
    pub fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
    }
}

/// Molecular network algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum NetworkKind {
    /// Modified-cosine spectral similarity
    #[default]
    #[serde(rename = "modified_cosine")]
    ModifiedCosine,
    /// MS2DeepScore embedding similarity
    #[serde(rename = "ms2deepscore")]
    Ms2DeepScore,
}

impl NetworkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkKind::ModifiedCosine => "modified_cosine",
            NetworkKind::Ms2DeepScore => "ms2deepscore",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "modified_cosine" => Ok(NetworkKind::ModifiedCosine),
            "ms2deepscore" => Ok(NetworkKind::Ms2DeepScore),
            other => Err(DashboardError::UnknownNetworkKind(other.to_string())),
        }
    }
}

/// Pairwise fold change between two groups of one grouping category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldChange {
    #[serde(deserialize_with = "lenient::string")]
    pub group1: String,
    #[serde(deserialize_with = "lenient::string")]
    pub group2: String,
    pub factor: f64,
}

impl FoldChange {
    /// Group pairs are unordered: (a, b) and (b, a) describe the same comparison.
    pub fn matches_pair(&self, a: &str, b: &str) -> bool {
        (self.group1 == a && self.group2 == b) || (self.group1 == b && self.group2 == a)
    }
}

/// Per-sample value (intensity or area) of a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleValue {
    #[serde(deserialize_with = "lenient::string")]
    pub s_id: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchAnnotation {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub mz: Option<f64>,
    #[serde(default)]
    pub diff_mz: Option<f64>,
    #[serde(default)]
    pub smiles: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhenotypeAnnotation {
    #[serde(default)]
    pub descr: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub p_value: Option<f64>,
    #[serde(default)]
    pub p_value_corr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FragmentAnnotation {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub diff_ppm: Option<f64>,
    #[serde(default)]
    pub frag_det: Option<f64>,
    #[serde(default)]
    pub frag_ex: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LossAnnotation {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub diff_ppm: Option<f64>,
    #[serde(default)]
    pub det_loss: Option<f64>,
    #[serde(default)]
    pub exp_loss: Option<f64>,
    #[serde(default)]
    pub mz_frag: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdductAnnotation {
    #[serde(default)]
    pub adduct_type: Option<String>,
    #[serde(default)]
    pub diff_ppm: Option<f64>,
    #[serde(default)]
    pub partner_adduct: Option<String>,
    #[serde(default)]
    pub partner_mz: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub partner_id: Option<String>,
}

/// Annotation bag of a feature; every sub-collection may be absent or null
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub matches: Vec<MatchAnnotation>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub phenotypes: Vec<PhenotypeAnnotation>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub fragments: Vec<FragmentAnnotation>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub losses: Vec<LossAnnotation>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub adducts: Vec<AdductAnnotation>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
            && self.phenotypes.is_empty()
            && self.fragments.is_empty()
            && self.losses.is_empty()
            && self.adducts.is_empty()
    }
}

/// One feature row of a sample's chromatogram payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub f_id: FeatureId,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub trace_rt: Vec<f64>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub trace_int: Vec<f64>,
    #[serde(default)]
    pub abs_int: Option<f64>,
    #[serde(default)]
    pub rel_int: Option<f64>,
    #[serde(default)]
    pub rt: Option<f64>,
    #[serde(default)]
    pub mz: Option<f64>,
    #[serde(default)]
    pub novelty: Option<f64>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub blank: bool,
    #[serde(default, deserialize_with = "lenient::vec_string")]
    pub samples: Vec<String>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub f_group: BTreeMap<String, Vec<FoldChange>>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub f_sample: Vec<SampleValue>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub a_sample: Vec<SampleValue>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub annotations: Annotations,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub n_features_cosine: Vec<FeatureId>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub n_features_deepscore: Vec<FeatureId>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub n_cos_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub n_ms2d_id: Option<String>,
    #[serde(default)]
    pub rt_avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: FeatureId,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub source: FeatureId,
    pub target: FeatureId,
    pub weight: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub data: EdgeData,
}

/// Node and edge lists in the shape the graph library consumes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphElements {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub nodes: Vec<GraphNode>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkCluster {
    pub elements: GraphElements,
}

/// kind → cluster id → cluster
pub type NetworkPayload = HashMap<NetworkKind, BTreeMap<String, NetworkCluster>>;

/// Sample name → feature rows
pub type ChromatogramPayload = BTreeMap<String, Vec<FeatureRecord>>;

/// Grouping category → group values
pub type GroupsPayload = BTreeMap<String, Vec<String>>;

/// Feature id → group values the feature belongs to
pub type FeatureGroupsPayload = HashMap<FeatureId, Vec<String>>;

/// All payloads of one analysis job, validated and indexed
#[derive(Debug, Clone)]
pub struct Dataset {
    samples: ChromatogramPayload,
    networks: NetworkPayload,
    groups: GroupsPayload,
    feature_groups: FeatureGroupsPayload,
    plot_range: PlotRange,
    unique_features: HashSet<FeatureId>,
    first_occurrence: HashMap<FeatureId, (String, usize)>,
}

impl Dataset {
    /// Validate the payloads and build the cross-sample indexes.
    pub fn new(
        samples: ChromatogramPayload,
        networks: NetworkPayload,
        groups: GroupsPayload,
        feature_groups: FeatureGroupsPayload,
    ) -> std::result::Result<Self, DashboardError> {
        for (name, features) in &samples {
            validate_sample(name, features)?;
        }
        for (kind, clusters) in &networks {
            for (cluster_id, cluster) in clusters {
                if let Some(edge) = cluster.elements.edges.iter().find(|e| !e.data.weight.is_finite()) {
                    return Err(DashboardError::MalformedPayload(format!(
                        "{} cluster {}: edge {} -> {} has a non-finite weight",
                        kind, cluster_id, edge.data.source, edge.data.target
                    )));
                }
            }
        }

        let plot_range = PlotRange::across(samples.values().flatten());

        let mut occurrences: HashMap<&FeatureId, usize> = HashMap::new();
        let mut first_occurrence = HashMap::new();
        for (name, features) in &samples {
            for (idx, feature) in features.iter().enumerate() {
                *occurrences.entry(&feature.f_id).or_insert(0) += 1;
                first_occurrence
                    .entry(feature.f_id.clone())
                    .or_insert_with(|| (name.clone(), idx));
            }
        }
        let unique_features = occurrences
            .into_iter()
            .filter(|(_, n)| *n == 1)
            .map(|(id, _)| id.clone())
            .collect();

        Ok(Dataset {
            samples,
            networks,
            groups,
            feature_groups,
            plot_range,
            unique_features,
            first_occurrence,
        })
    }

    /// Load payload files (`.json` or `.json.gz`).
    pub fn from_files(
        chromatogram: &Path,
        network: &Path,
        groups: Option<&Path>,
        feature_groups: Option<&Path>,
    ) -> Result<Self> {
        let samples: ChromatogramPayload = read_json(chromatogram)?;
        let networks: NetworkPayload = read_json(network)?;
        let groups: GroupsPayload = match groups {
            Some(path) => read_json(path)?,
            None => GroupsPayload::new(),
        };
        let feature_groups: FeatureGroupsPayload = match feature_groups {
            Some(path) => read_json(path)?,
            None => FeatureGroupsPayload::new(),
        };

        let dataset = Dataset::new(samples, networks, groups, feature_groups)
            .with_context(|| format!("Invalid dashboard payload: {}", chromatogram.display()))?;

        info!(
            "Loaded {} samples, {} distinct features, {} grouping categories",
            dataset.samples.len(),
            dataset.first_occurrence.len(),
            dataset.groups.len()
        );
        for (name, features) in &dataset.samples {
            debug!("  {}: {} features", name, features.len());
        }
        Ok(dataset)
    }

    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    pub fn sample(&self, name: &str) -> Option<&[FeatureRecord]> {
        self.samples.get(name).map(Vec::as_slice)
    }

    pub fn cluster(&self, kind: NetworkKind, cluster_id: &str) -> Option<&NetworkCluster> {
        self.networks.get(&kind).and_then(|clusters| clusters.get(cluster_id))
    }

    pub fn groups(&self) -> &GroupsPayload {
        &self.groups
    }

    pub fn feature_groups(&self) -> &FeatureGroupsPayload {
        &self.feature_groups
    }

    /// Shared x-axis range, identical whichever sample is selected.
    pub fn plot_range(&self) -> PlotRange {
        self.plot_range
    }

    /// Feature ids that occur in exactly one sample of the dataset.
    pub fn unique_features(&self) -> &HashSet<FeatureId> {
        &self.unique_features
    }

    /// First record of a feature across all samples (sample name order).
    pub fn feature_record(&self, id: &FeatureId) -> Option<&FeatureRecord> {
        let (sample, idx) = self.first_occurrence.get(id)?;
        self.samples.get(sample).and_then(|features| features.get(*idx))
    }
}

fn validate_sample(name: &str, features: &[FeatureRecord]) -> std::result::Result<(), DashboardError> {
    let mut seen = HashSet::with_capacity(features.len());
    for feature in features {
        if !seen.insert(&feature.f_id) {
            return Err(DashboardError::MalformedPayload(format!(
                "sample '{}': duplicate feature id {}",
                name, feature.f_id
            )));
        }
        if feature.trace_rt.len() != feature.trace_int.len() {
            return Err(DashboardError::MalformedPayload(format!(
                "sample '{}', feature {}: trace_rt has {} points but trace_int has {}",
                name,
                feature.f_id,
                feature.trace_rt.len(),
                feature.trace_int.len()
            )));
        }
        let scalars = [
            feature.abs_int,
            feature.rel_int,
            feature.rt,
            feature.mz,
            feature.novelty,
            feature.rt_avg,
        ];
        let non_finite = scalars.iter().flatten().any(|v| !v.is_finite())
            || feature.trace_rt.iter().chain(&feature.trace_int).any(|v| !v.is_finite());
        if non_finite {
            return Err(DashboardError::MalformedPayload(format!(
                "sample '{}', feature {}: non-finite numeric value",
                name, feature.f_id
            )));
        }
    }
    Ok(())
}

/// Read a JSON payload, transparently decompressing `.gz` files.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read payload: {}", path.display()))?;

    let text = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        use flate2::read::GzDecoder;
        let mut decoder = GzDecoder::new(&raw[..]);
        let mut decompressed = String::new();
        decoder
            .read_to_string(&mut decompressed)
            .with_context(|| format!("Failed to decompress payload: {}", path.display()))?;
        decompressed
    } else {
        String::from_utf8(raw).with_context(|| format!("Payload is not UTF-8: {}", path.display()))?
    };

    serde_json::from_str(&text).with_context(|| format!("Failed to parse JSON payload: {}", path.display()))
}
