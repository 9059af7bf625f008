//! Rendering surface
//!
//! The controllers never touch a plotting or graph library directly; they push
//! complete descriptions through [`View`]. [`RecordedView`] keeps the latest state
//! of every container and is what the HTTP server hands to the browser.

use crate::chromatogram::{HighlightBox, Plot};
use crate::network::{FeatureDetail, GraphView};
use serde::Serialize;
use std::collections::BTreeMap;

pub trait View {
    /// Replace the content of a plot container.
    fn draw_plot(&mut self, container: &str, plot: &Plot);
    /// Clear a plot container entirely.
    fn purge_plot(&mut self, container: &str);
    /// Replace the overlay shapes of a plot container.
    fn set_shapes(&mut self, container: &str, shapes: &[HighlightBox]);
    fn draw_graph(&mut self, graph: &GraphView);
    fn hide_graph(&mut self);
    fn show_detail(&mut self, detail: &FeatureDetail);
    fn clear_detail(&mut self);
    /// User-visible notice; `None` removes it.
    fn set_notice(&mut self, notice: Option<&str>);
    fn set_active_sample(&mut self, sample: &str);
    /// Retained-feature count shown next to a sample's row.
    fn set_retained_count(&mut self, sample: &str, count: usize);
}

/// In-memory surface holding the last state pushed to each container
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordedView {
    pub plots: BTreeMap<String, Plot>,
    pub shapes: BTreeMap<String, Vec<HighlightBox>>,
    pub graph: Option<GraphView>,
    pub detail: Option<FeatureDetail>,
    pub notice: Option<String>,
    pub active_sample: Option<String>,
    pub retained: BTreeMap<String, usize>,
}

#[cfg(test)]
impl RecordedView {
    pub fn plot(&self, container: &str) -> Option<&Plot> {
        self.plots.get(container)
    }

    pub fn shapes(&self, container: &str) -> &[HighlightBox] {
        self.shapes.get(container).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl View for RecordedView {
    fn draw_plot(&mut self, container: &str, plot: &Plot) {
        self.plots.insert(container.to_string(), plot.clone());
    }

    fn purge_plot(&mut self, container: &str) {
        self.plots.remove(container);
        self.shapes.remove(container);
    }

    fn set_shapes(&mut self, container: &str, shapes: &[HighlightBox]) {
        if shapes.is_empty() {
            self.shapes.remove(container);
        } else {
            self.shapes.insert(container.to_string(), shapes.to_vec());
        }
    }

    fn draw_graph(&mut self, graph: &GraphView) {
        self.graph = Some(graph.clone());
    }

    fn hide_graph(&mut self) {
        self.graph = None;
    }

    fn show_detail(&mut self, detail: &FeatureDetail) {
        self.detail = Some(detail.clone());
    }

    fn clear_detail(&mut self) {
        self.detail = None;
    }

    fn set_notice(&mut self, notice: Option<&str>) {
        self.notice = notice.map(str::to_string);
    }

    fn set_active_sample(&mut self, sample: &str) {
        self.active_sample = Some(sample.to_string());
    }

    fn set_retained_count(&mut self, sample: &str, count: usize) {
        self.retained.insert(sample.to_string(), count);
    }
}
