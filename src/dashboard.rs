//! Dashboard state and interaction handling
//!
//! [`Dashboard`] is the only writer of session state: the active sample, the filter
//! panel values, the network kind, the selected feature and its highlight box. Every
//! interaction ends by pushing the resulting state to the [`View`].

use crate::chromatogram::{
    self, ChromatogramStyle, HighlightBox, Plot, RenderMode, FEATURE_CHROMATOGRAM, MAIN_CHROMATOGRAM,
};
use crate::error::DashboardError;
use crate::filter::{Criteria, FilterConfig};
use crate::network::{self, Selection};
use crate::panel::{FilterEdit, FilterInputs};
use crate::payload::{Dataset, FeatureId, NetworkKind};
use crate::sample::SampleData;
use crate::surface::View;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

/// One row of the sample table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleCount {
    pub sample: String,
    pub retained: usize,
    pub total: usize,
}

pub struct Dashboard<V: View> {
    dataset: Dataset,
    samples: Vec<SampleData>,
    view: V,
    inputs: FilterInputs,
    config: FilterConfig,
    active: Option<usize>,
    network: NetworkKind,
    selection: Option<Selection>,
    highlight: Option<HighlightBox>,
    style: ChromatogramStyle,
}

impl<V: View> Dashboard<V> {
    /// Reshape every sample once and select the first one.
    pub fn new(dataset: Dataset, view: V, inputs: FilterInputs) -> Result<Self, DashboardError> {
        let samples = dataset
            .sample_names()
            .map(|name| SampleData::from_dataset(name, &dataset))
            .collect::<Result<Vec<_>, _>>()?;

        let mut dashboard = Dashboard {
            dataset,
            samples,
            view,
            config: inputs.to_config(),
            inputs,
            active: None,
            network: NetworkKind::default(),
            selection: None,
            highlight: None,
            style: ChromatogramStyle::default(),
        };

        match dashboard.samples.first().map(|s| s.name.clone()) {
            Some(first) => dashboard.select_sample(&first)?,
            None => {
                warn!("Dataset contains no samples");
                dashboard.refresh();
            }
        }
        Ok(dashboard)
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn inputs(&self) -> &FilterInputs {
        &self.inputs
    }

    pub fn filter_config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn network_kind(&self) -> NetworkKind {
        self.network
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn highlight(&self) -> Option<&HighlightBox> {
        self.highlight.as_ref()
    }

    pub fn active_sample(&self) -> Option<&SampleData> {
        self.active.map(|i| &self.samples[i])
    }

    /// Post missing-data errors as a notice before handing them back.
    fn notify(&mut self, err: DashboardError) -> DashboardError {
        warn!("{}", err);
        if err.is_missing_data() {
            self.view.set_notice(Some(&err.to_string()));
        }
        err
    }

    /// Switch the active sample.
    ///
    /// Hides the graph and detail tables, purges the detail chromatogram, drops the
    /// selection and highlight box, resets the network kind, then refreshes.
    pub fn select_sample(&mut self, name: &str) -> Result<(), DashboardError> {
        let Some(index) = self.samples.iter().position(|s| s.name == name) else {
            return Err(self.notify(DashboardError::SampleNotFound(name.to_string())));
        };
        info!("Selected sample {} ({} features)", name, self.samples[index].len());

        self.view.hide_graph();
        self.view.clear_detail();
        self.view.purge_plot(FEATURE_CHROMATOGRAM);
        self.view.set_shapes(MAIN_CHROMATOGRAM, &[]);
        self.view.set_notice(None);
        self.view.set_active_sample(name);

        self.active = Some(index);
        self.selection = None;
        self.highlight = None;
        self.network = NetworkKind::ModifiedCosine;

        self.refresh();
        Ok(())
    }

    /// Select a feature of the active sample (chromatogram click or graph node click).
    pub fn click_feature(&mut self, id: &FeatureId) -> Result<(), DashboardError> {
        let Some(active) = self.active else {
            return Err(self.notify(DashboardError::NoSampleSelected));
        };
        let sample = &self.samples[active];
        let selection = match network::select(sample, id, self.network) {
            Ok(selection) => selection,
            Err(err) => return Err(self.notify(err)),
        };

        self.highlight = HighlightBox::around(&sample.trace_rt[selection.index], &sample.trace_int[selection.index]);
        match &self.highlight {
            Some(highlight) => chromatogram::apply_highlight(&mut self.view, highlight),
            None => self.view.set_shapes(MAIN_CHROMATOGRAM, &[]),
        }

        self.selection = Some(selection);
        self.present_selection()
    }

    /// Switch the network kind; a selected feature is re-derived against the new network.
    pub fn set_network_kind(&mut self, kind: NetworkKind) -> Result<(), DashboardError> {
        debug!("Network kind {} -> {}", self.network, kind);
        self.network = kind;
        self.refresh();

        let (Some(active), Some(current)) = (self.active, &self.selection) else {
            return Ok(());
        };
        match network::select(&self.samples[active], &current.feature, kind) {
            Ok(selection) => {
                self.selection = Some(selection);
                self.present_selection()
            }
            Err(err) => Err(self.notify(err)),
        }
    }

    fn present_selection(&mut self) -> Result<(), DashboardError> {
        let (Some(active), Some(selection)) = (self.active, &self.selection) else {
            return Err(self.notify(DashboardError::NoFeatureSelected));
        };
        let result = network::present(&mut self.view, &self.dataset, &self.samples[active], selection, &self.style);
        if let Err(err) = &result {
            warn!("{}", err);
        }
        result
    }

    /// Apply one filter-panel edit and run the refresh sequence.
    pub fn apply_edit(&mut self, edit: FilterEdit) {
        debug!("Filter edit: {:?}", edit);
        self.inputs.apply(edit);
        self.refresh();
    }

    pub fn reset_filters(&mut self) {
        info!("Resetting filters");
        self.inputs.reset();
        self.refresh();
    }

    /// Rebuild the filter configuration, redraw the main chromatogram, reapply the
    /// highlight box and recount retained features of every sample.
    fn refresh(&mut self) {
        self.config = self.inputs.to_config();

        if let Some(plot) = self.overview_plot() {
            chromatogram::render(&mut self.view, MAIN_CHROMATOGRAM, &plot);
        }
        if let Some(highlight) = &self.highlight {
            chromatogram::apply_highlight(&mut self.view, highlight);
        }
        for row in self.sample_counts() {
            self.view.set_retained_count(&row.sample, row.retained);
        }
    }

    fn criteria(&self) -> Criteria<'_> {
        Criteria::new(&self.config, self.network, self.dataset.feature_groups())
    }

    /// Retained and total feature counts of every sample under the current filters.
    pub fn sample_counts(&self) -> Vec<SampleCount> {
        let criteria = self.criteria();
        self.samples
            .par_iter()
            .map(|sample| SampleCount {
                sample: sample.name.clone(),
                retained: criteria.count_retained(sample),
                total: sample.len(),
            })
            .collect()
    }

    /// Retained and total counts of the active sample.
    pub fn active_count(&self) -> Option<SampleCount> {
        let sample = self.active_sample()?;
        Some(SampleCount {
            sample: sample.name.clone(),
            retained: self.criteria().count_retained(sample),
            total: sample.len(),
        })
    }

    pub fn overview_plot(&self) -> Option<Plot> {
        let sample = self.active_sample()?;
        Some(chromatogram::build_plot(sample, &RenderMode::Overview(self.criteria()), &self.style))
    }

    /// SVG of the main chromatogram with the highlight box.
    pub fn chromatogram_svg(&self, width: usize) -> Result<String, DashboardError> {
        let plot = self.overview_plot().ok_or(DashboardError::NoSampleSelected)?;
        Ok(chromatogram::to_svg(&plot, self.highlight.as_ref(), width))
    }

    /// SVG of the detail chromatogram of the selected feature.
    pub fn feature_chromatogram_svg(&self, width: usize) -> Result<String, DashboardError> {
        let sample = self.active_sample().ok_or(DashboardError::NoSampleSelected)?;
        let selection = self.selection.as_ref().ok_or(DashboardError::NoFeatureSelected)?;
        let plot = chromatogram::build_plot(sample, &RenderMode::FeatureDetail(&selection.members), &self.style);
        Ok(chromatogram::to_svg(&plot, None, width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::panel::{Bound, RangeField, ShowOnly};
    use crate::surface::RecordedView;

    fn dashboard() -> Dashboard<RecordedView> {
        Dashboard::new(fixtures::dataset(), RecordedView::default(), FilterInputs::default()).unwrap()
    }

    #[test]
    fn test_new_selects_first_sample() {
        let d = dashboard();
        assert_eq!(d.active_sample().unwrap().name, "sample1");
        assert_eq!(d.view().active_sample.as_deref(), Some("sample1"));
        let plot = d.view().plot(MAIN_CHROMATOGRAM).unwrap();
        assert_eq!(plot.traces.len(), 4);
        // 104 has novelty 11
        assert_eq!(d.view().retained.get("sample1"), Some(&3));
        assert_eq!(d.view().retained.get("sample2"), Some(&2));
    }

    #[test]
    fn test_filter_edit_recounts_every_sample() {
        let mut d = dashboard();
        d.apply_edit(FilterEdit::ShowOnly { flag: ShowOnly::NonBlank, enabled: true });
        assert_eq!(d.view().retained.get("sample1"), Some(&2));
        assert_eq!(d.view().retained.get("sample2"), Some(&1));
        let muted = d.view().plot(MAIN_CHROMATOGRAM).unwrap().traces.iter().filter(|t| t.muted).count();
        assert_eq!(muted, 2);

        d.reset_filters();
        assert_eq!(d.view().retained.get("sample1"), Some(&3));
        assert_eq!(d.inputs(), &FilterInputs::default());
    }

    #[test]
    fn test_range_edit_is_clamped() {
        let mut d = dashboard();
        d.apply_edit(FilterEdit::Range { field: RangeField::Novelty, bound: Bound::Max, value: "1".into() });
        assert_eq!(d.inputs().novelty.min, "0");
        d.apply_edit(FilterEdit::Range { field: RangeField::Novelty, bound: Bound::Min, value: "3".into() });
        assert_eq!(d.inputs().novelty.max, "3");
        assert_eq!(d.view().retained.get("sample1"), Some(&0));
    }

    #[test]
    fn test_click_feature_highlights_and_presents() {
        let mut d = dashboard();
        d.click_feature(&FeatureId::from("101")).unwrap();
        assert!(d.highlight().is_some());
        assert_eq!(d.view().shapes(MAIN_CHROMATOGRAM).len(), 1);
        assert!(d.view().graph.is_some());
        assert_eq!(d.selection().unwrap().related, vec![FeatureId::from("102")]);

        // highlight survives a refresh
        d.apply_edit(FilterEdit::FindFeature { value: "102".into() });
        assert_eq!(d.view().shapes(MAIN_CHROMATOGRAM).len(), 1);
    }

    #[test]
    fn test_network_switch_rederives_selection() {
        let mut d = dashboard();
        d.click_feature(&FeatureId::from("101")).unwrap();
        d.set_network_kind(NetworkKind::Ms2DeepScore).unwrap();
        assert_eq!(d.selection().unwrap().related, vec![FeatureId::from("103")]);
        assert_eq!(d.view().graph.as_ref().unwrap().cluster_id, "7");

        // 102 has no deepscore cluster
        d.click_feature(&FeatureId::from("102")).unwrap_err();
        assert!(d.view().graph.is_none());
        assert!(d.view().notice.as_deref().unwrap().contains("ms2deepscore"));
        assert!(d.view().detail.is_some());
    }

    #[test]
    fn test_sample_switch_clears_selection() {
        let mut d = dashboard();
        d.set_network_kind(NetworkKind::Ms2DeepScore).unwrap();
        d.click_feature(&FeatureId::from("101")).unwrap();
        d.select_sample("sample2").unwrap();

        assert!(d.selection().is_none());
        assert!(d.highlight().is_none());
        assert_eq!(d.network_kind(), NetworkKind::ModifiedCosine);
        let view = d.view();
        assert!(view.graph.is_none());
        assert!(view.detail.is_none());
        assert!(view.plot(FEATURE_CHROMATOGRAM).is_none());
        assert!(view.shapes(MAIN_CHROMATOGRAM).is_empty());
        assert_eq!(view.plot(MAIN_CHROMATOGRAM).unwrap().traces.len(), 2);
    }

    #[test]
    fn test_missing_data_posts_notice() {
        let mut d = dashboard();
        let err = d.select_sample("nope").unwrap_err();
        assert_eq!(err, DashboardError::SampleNotFound("nope".into()));
        assert_eq!(d.view().notice.as_deref(), Some("sample 'nope' not found"));
        // active sample is unchanged
        assert_eq!(d.active_sample().unwrap().name, "sample1");

        d.click_feature(&FeatureId::from("999")).unwrap_err();
        assert_eq!(d.view().notice.as_deref(), Some("feature '999' not found in the active sample"));
    }

    #[test]
    fn test_svg_exports() {
        let mut d = dashboard();
        assert_eq!(d.feature_chromatogram_svg(600).unwrap_err(), DashboardError::NoFeatureSelected);
        d.click_feature(&FeatureId::from("101")).unwrap();
        assert!(d.chromatogram_svg(800).unwrap().contains("stroke-dasharray"));
        assert_eq!(d.feature_chromatogram_svg(600).unwrap().matches("<polygon").count(), 2);
    }

    #[test]
    fn test_sample_counts_match_predicate() {
        let d = dashboard();
        let counts = d.sample_counts();
        assert_eq!(
            counts,
            vec![
                SampleCount { sample: "sample1".into(), retained: 3, total: 4 },
                SampleCount { sample: "sample2".into(), retained: 2, total: 2 },
            ]
        );
    }

    #[test]
    fn test_active_count_includes_features_without_trace() {
        let mut samples = fixtures::chromatogram();
        samples.get_mut("sample1").unwrap().push(
            serde_json::from_value(serde_json::json!({"f_id": 105, "novelty": 1.0, "samples": ["sample1"]})).unwrap(),
        );
        let dataset = Dataset::new(samples, fixtures::networks(), fixtures::groups(), fixtures::feature_groups()).unwrap();
        let d = Dashboard::new(dataset, RecordedView::default(), FilterInputs::default()).unwrap();

        let plot = d.overview_plot().unwrap();
        assert_eq!(plot.traces.len(), 4);
        assert_eq!(plot.traces.iter().filter(|t| !t.muted).count(), 3);

        let count = d.active_count().unwrap();
        assert_eq!(count, SampleCount { sample: "sample1".into(), retained: 4, total: 5 });
        assert_eq!(d.view().retained.get("sample1"), Some(&count.retained));
    }
}
