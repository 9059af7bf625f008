//! Network and detail view of a selected feature
//!
//! Selecting a feature derives its related features from the active network kind,
//! builds the graph description for that feature's cluster and the detail tables
//! (general info, per-sample intensities, fold changes, annotations).

use crate::chromatogram::{self, ChromatogramStyle, RenderMode, Role, FEATURE_CHROMATOGRAM};
use crate::error::DashboardError;
use crate::payload::{Annotations, Dataset, FeatureId, FoldChange, NetworkKind, NodeData};
use crate::sample::SampleData;
use crate::surface::View;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Edge weights are mapped linearly from this interval ...
const WEIGHT_DOMAIN: (f64, f64) = (0.5, 1.0);
/// ... onto this width interval
const EDGE_WIDTH: (f64, f64) = (1.0, 10.0);

const NODE_BORDER_WIDTH: f64 = 4.0;

pub const NO_GROUP_DATA: &str = "No group data available for this feature.";
pub const NO_ANNOTATION_DATA: &str = "No annotation data found for this feature.";

/// Result of clicking a feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub feature: FeatureId,
    pub index: usize,
    pub kind: NetworkKind,
    /// Co-cluster ids other than the selected one
    pub related: Vec<FeatureId>,
    /// Sample indexes drawn in the detail chromatogram
    #[serde(skip)]
    pub members: Vec<(usize, Role)>,
}

impl Selection {
    pub fn in_network(&self) -> bool {
        !self.related.is_empty()
    }
}

/// Resolve a feature of the active sample and its related features.
pub fn select(sample: &SampleData, id: &FeatureId, kind: NetworkKind) -> Result<Selection, DashboardError> {
    let index = sample
        .index_of(id)
        .ok_or_else(|| DashboardError::FeatureNotFound(id.to_string()))?;
    let co_cluster = sample.feature(index).co_cluster(kind);

    let mut seen = HashSet::new();
    let related: Vec<FeatureId> = co_cluster
        .iter()
        .filter(|other| *other != id && seen.insert(*other))
        .cloned()
        .collect();

    let mut members = vec![(index, Role::Selected)];
    members.extend(
        related
            .iter()
            .filter_map(|other| sample.index_of(other))
            .map(|i| (i, Role::Related)),
    );

    debug!(
        "Selected feature {} in {}: {} related ({} in sample)",
        id,
        kind,
        related.len(),
        members.len() - 1
    );

    Ok(Selection {
        feature: id.clone(),
        index,
        kind,
        related,
        members,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Selected,
    Related,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub data: NodeData,
    pub role: NodeRole,
    /// Feature occurs in exactly one sample of the dataset
    pub unique: bool,
    pub background_color: &'static str,
    pub border_color: &'static str,
    pub border_width: f64,
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeView {
    pub source: FeatureId,
    pub target: FeatureId,
    pub weight: f64,
    pub width: f64,
    pub tooltip: Option<String>,
}

/// Graph description of one network cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub feature: FeatureId,
    pub kind: NetworkKind,
    pub cluster_id: String,
    pub layout: &'static str,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

/// Edge width for a similarity weight, clamped to the mapped interval.
pub fn edge_width(weight: f64) -> f64 {
    let (lo, hi) = WEIGHT_DOMAIN;
    let t = (weight.clamp(lo, hi) - lo) / (hi - lo);
    EDGE_WIDTH.0 + t * (EDGE_WIDTH.1 - EDGE_WIDTH.0)
}

fn node_colors(role: NodeRole) -> (&'static str, &'static str) {
    match role {
        NodeRole::Selected => ("#f4aaa7", "#960303"),
        NodeRole::Related => ("#c6dcfb", "#227aa0"),
        NodeRole::Other => ("#b2b6b9", "white"),
    }
}

/// Graph of the selected feature's cluster; `None` when the feature has no
/// cluster in this network or the cluster is missing from the payload.
pub fn graph_view(dataset: &Dataset, sample: &SampleData, selection: &Selection) -> Option<GraphView> {
    let cluster_id = sample.cluster_id(selection.index, selection.kind)?;
    let cluster = dataset.cluster(selection.kind, cluster_id)?;
    let related: HashSet<&FeatureId> = selection.related.iter().collect();
    let unique = dataset.unique_features();

    let nodes = cluster
        .elements
        .nodes
        .iter()
        .map(|node| {
            let id = &node.data.id;
            let role = if *id == selection.feature {
                NodeRole::Selected
            } else if related.contains(id) {
                NodeRole::Related
            } else {
                NodeRole::Other
            };
            let is_unique = unique.contains(id);
            let (background, border) = node_colors(role);
            NodeView {
                data: node.data.clone(),
                role,
                unique: is_unique,
                background_color: background,
                border_color: if is_unique { "#000" } else { border },
                border_width: NODE_BORDER_WIDTH,
                tooltip: dataset.feature_record(id).map(|f| {
                    format!(
                        "Feature ID: {}<br>Precursor m/z: {}<br>Average rt: {}<br>",
                        id,
                        f.mz.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                        f.rt_avg.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
                    )
                }),
            }
        })
        .collect();

    let edges = cluster
        .elements
        .edges
        .iter()
        .map(|edge| {
            let d = &edge.data;
            let mz_diff = match (dataset.feature_record(&d.source), dataset.feature_record(&d.target)) {
                (Some(a), Some(b)) => a.mz.zip(b.mz).map(|(x, y)| (x - y).abs()),
                _ => None,
            };
            EdgeView {
                source: d.source.clone(),
                target: d.target.clone(),
                weight: d.weight,
                width: edge_width(d.weight),
                tooltip: mz_diff.map(|diff| format!("Edge Weight: {:.2}<br>m/z Difference: {:.4}<br>", d.weight, diff)),
            }
        })
        .collect();

    Some(GraphView {
        feature: selection.feature.clone(),
        kind: selection.kind,
        cluster_id: cluster_id.to_string(),
        layout: "cose",
        nodes,
        edges,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralInfo {
    pub feature_id: FeatureId,
    pub precursor_mz: Option<f64>,
    pub retention_time: Option<f64>,
    pub relative_intensity: Option<f64>,
    pub absolute_intensity: Option<f64>,
    pub novelty: Option<f64>,
    pub blank: bool,
}

/// Intensity and area of the feature in one sample of origin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub sample: String,
    pub intensity: f64,
    pub area: f64,
}

/// Symmetric fold-change matrix of one grouping category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldHeatmap {
    pub category: String,
    /// Column labels, sorted
    pub columns: Vec<String>,
    /// Row labels, reverse-sorted
    pub rows: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

impl FoldHeatmap {
    pub fn from_records(category: &str, records: &[FoldChange]) -> Self {
        let columns: Vec<String> = records
            .iter()
            .flat_map(|r| [r.group1.clone(), r.group2.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let pos = |g: &str| columns.iter().position(|c| c == g);

        let mut matrix = vec![vec![0.0; columns.len()]; columns.len()];
        for r in records {
            if let (Some(a), Some(b)) = (pos(&r.group1), pos(&r.group2)) {
                matrix[a][b] = r.factor;
                matrix[b][a] = r.factor;
            }
        }
        matrix.reverse();

        FoldHeatmap {
            category: category.to_string(),
            rows: columns.iter().rev().cloned().collect(),
            columns,
            matrix,
        }
    }
}

/// Everything the detail tables show for one feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureDetail {
    pub title: String,
    pub general: GeneralInfo,
    pub samples: Vec<SampleRow>,
    pub fold_changes: Vec<FoldHeatmap>,
    pub fold_notice: Option<&'static str>,
    pub annotations: Option<Annotations>,
    pub annotation_notice: Option<&'static str>,
}

pub fn feature_detail(sample: &SampleData, i: usize) -> FeatureDetail {
    let areas: BTreeMap<&str, f64> = sample.sample_area[i]
        .iter()
        .map(|a| (a.s_id.as_str(), a.value))
        .collect();
    let samples = sample.sample_intensity[i]
        .iter()
        .filter_map(|s| {
            areas.get(s.s_id.as_str()).map(|&area| SampleRow {
                sample: s.s_id.clone(),
                intensity: s.value,
                area,
            })
        })
        .collect();

    let fold_changes: Vec<FoldHeatmap> = sample.fold_changes[i]
        .iter()
        .map(|(category, records)| FoldHeatmap::from_records(category, records))
        .collect();
    let annotations = &sample.annotations[i];

    FeatureDetail {
        title: format!("Network visualization of feature: {}", sample.feature_id[i]),
        general: GeneralInfo {
            feature_id: sample.feature_id[i].clone(),
            precursor_mz: sample.prec_mz[i],
            retention_time: sample.ret_time[i],
            relative_intensity: sample.rel_int[i],
            absolute_intensity: sample.abs_int[i],
            novelty: sample.novelty[i],
            blank: sample.blank[i],
        },
        samples,
        fold_notice: fold_changes.is_empty().then_some(NO_GROUP_DATA),
        fold_changes,
        annotation_notice: annotations.is_empty().then_some(NO_ANNOTATION_DATA),
        annotations: (!annotations.is_empty()).then(|| annotations.clone()),
    }
}

/// Push a selection to the view: detail chromatogram, detail tables and graph.
///
/// A feature without related features in the active network gets an explicit
/// notice instead of an empty graph; the detail tables are still shown.
pub fn present<V: View + ?Sized>(
    view: &mut V,
    dataset: &Dataset,
    sample: &SampleData,
    selection: &Selection,
    style: &ChromatogramStyle,
) -> Result<(), DashboardError> {
    let plot = chromatogram::build_plot(sample, &RenderMode::FeatureDetail(&selection.members), style);
    chromatogram::render(view, FEATURE_CHROMATOGRAM, &plot);
    view.show_detail(&feature_detail(sample, selection.index));

    let graph = if selection.in_network() {
        graph_view(dataset, sample, selection)
    } else {
        None
    };
    match graph {
        Some(graph) => {
            view.set_notice(None);
            view.draw_graph(&graph);
            Ok(())
        }
        None => {
            let err = DashboardError::NotInNetwork {
                feature: selection.feature.to_string(),
                kind: selection.kind.to_string(),
            };
            view.hide_graph();
            view.set_notice(Some(&err.to_string()));
            Err(err)
        }
    }
}
