//! Chromatogram traces, legend and highlight box
//!
//! Builds the plot description for the overview chromatogram (every feature of the
//! active sample, muted when filtered out) and for the feature-detail chromatogram
//! (the selected feature and its network neighbours), plus an SVG rendition of it.

use crate::filter::Criteria;
use crate::sample::{PlotRange, SampleData};
use crate::surface::View;
use serde::Serialize;
use std::fmt::Write;

pub const MAIN_CHROMATOGRAM: &str = "mainChromatogram";
pub const FEATURE_CHROMATOGRAM: &str = "featureChromatogram";

const MUTED_LINE: &str = "rgba(212, 212, 212, 0.8)";
const MUTED_FILL: &str = "rgba(212, 212, 212, 0.3)";
const UNIQUE_LINE: &str = "#000000";
const SELECTED_MARK: &str = "#960303";

/// Padding of the highlight box around a peak
const BOX_PAD_X: f64 = 0.12;
const BOX_PAD_Y: f64 = 0.04;

/// Upper end of the relative-intensity axis
const Y_MAX: f64 = 1.05;

/// Narrowest SVG export; anything smaller leaves no room inside the margins
const MIN_SVG_WIDTH: usize = 200;

/// Two-entry color scheme: index 0 is the primary role, index 1 the secondary
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub fill: [&'static str; 2],
    pub line: [&'static str; 2],
    pub labels: [&'static str; 2],
}

/// Overview: regular vs blank-associated features
pub const OVERVIEW_PALETTE: Palette = Palette {
    fill: ["rgba(153, 191, 159, 0.70)", "rgba(252, 224, 151, 0.70)"],
    line: ["#5a755e", "#fab80f"],
    labels: ["Selected", "Blank"],
};

/// Feature detail: clicked feature vs its network neighbours
pub const DETAIL_PALETTE: Palette = Palette {
    fill: ["rgba(245, 127, 129, 0.70)", "rgba(66, 135, 245, 0.30)"],
    line: ["#960303", "#127aa3"],
    labels: ["Selected feature", "Related feature"],
};

/// Role of a feature relative to the clicked one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Selected,
    Related,
}

pub enum RenderMode<'a> {
    /// Every feature of the sample, styled by the filter verdict
    Overview(Criteria<'a>),
    /// Sample indexes with their role; never muted
    FeatureDetail(&'a [(usize, Role)]),
}

/// Line styling shared by every trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChromatogramStyle {
    pub line_width: f64,
    pub smoothing: f64,
    pub hover_background: &'static str,
}

impl Default for ChromatogramStyle {
    fn default() -> Self {
        ChromatogramStyle {
            line_width: 2.0,
            smoothing: 0.8,
            hover_background: "#41454c",
        }
    }
}

/// One filled peak outline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    /// Feature id
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub line_color: String,
    pub fill_color: String,
    pub line_width: f64,
    pub smoothing: f64,
    /// Hover text
    pub text: String,
    pub peak_max: f64,
    pub muted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "symbol", rename_all = "lowercase")]
pub enum Marker {
    Square { fill: String, line: String },
    Line { color: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendItem {
    pub name: String,
    pub marker: Marker,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub height: u32,
    pub x_range: PlotRange,
    pub y_range: [f64; 2],
    pub x_title: Option<&'static str>,
    pub y_title: &'static str,
    pub hover_background: &'static str,
}

/// Complete description handed to the plotting surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plot {
    /// Feature traces, tallest peak first
    pub traces: Vec<Trace>,
    pub legend: Vec<LegendItem>,
    pub layout: Layout,
}

/// Dashed rectangle around one feature's peak, overlaid on the main chromatogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub line_color: &'static str,
    pub line_width: f64,
    pub dash: bool,
}

impl HighlightBox {
    /// Bounding box of a peak trace; `None` for an empty trace.
    pub fn around(trace_rt: &[f64], trace_int: &[f64]) -> Option<Self> {
        if trace_rt.is_empty() || trace_int.is_empty() {
            return None;
        }
        let max_int = trace_int.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_rt = trace_rt.iter().copied().fold(f64::INFINITY, f64::min);
        let max_rt = trace_rt.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(HighlightBox {
            x0: min_rt - BOX_PAD_X,
            y0: 0.0,
            x1: max_rt + BOX_PAD_X,
            y1: max_int + BOX_PAD_Y,
            line_color: SELECTED_MARK,
            line_width: 2.5,
            dash: true,
        })
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn tooltip(sample: &SampleData, i: usize) -> String {
    format!(
        "&nbsp;Feature ID: {}<br>Precursor m/z: {}<br>Retention time: {}<br>Relative intensity: {}<br>Absolute intensity: {}<br>",
        sample.feature_id[i],
        fmt_opt(sample.prec_mz[i]),
        fmt_opt(sample.ret_time[i]),
        fmt_opt(sample.rel_int[i]),
        fmt_opt(sample.abs_int[i]),
    )
}

fn trace(sample: &SampleData, i: usize, line: &str, fill: &str, style: &ChromatogramStyle) -> Trace {
    Trace {
        name: sample.feature_id[i].to_string(),
        x: sample.trace_rt[i].clone(),
        y: sample.trace_int[i].clone(),
        line_color: line.to_string(),
        fill_color: fill.to_string(),
        line_width: style.line_width,
        smoothing: style.smoothing,
        text: tooltip(sample, i),
        peak_max: sample.peak_max(i),
        muted: false,
        role: None,
    }
}

fn palette_legend(palette: &Palette) -> Vec<LegendItem> {
    palette
        .labels
        .iter()
        .zip(palette.fill.iter().zip(palette.line.iter()))
        .map(|(label, (fill, line))| LegendItem {
            name: label.to_string(),
            marker: Marker::Square { fill: fill.to_string(), line: line.to_string() },
        })
        .collect()
}

/// Build the trace list, legend and layout for one chromatogram.
pub fn build_plot(sample: &SampleData, mode: &RenderMode<'_>, style: &ChromatogramStyle) -> Plot {
    let mut traces = Vec::new();
    let mut legend;
    let layout;

    match mode {
        RenderMode::Overview(criteria) => {
            let palette = &OVERVIEW_PALETTE;
            for i in (0..sample.len()).filter(|&i| !sample.trace_rt[i].is_empty()) {
                let slot = usize::from(sample.blank[i]);
                let line = if sample.samples[i].len() == 1 { UNIQUE_LINE } else { palette.line[slot] };
                let mut t = trace(sample, i, line, palette.fill[slot], style);
                if !criteria.retains(sample, i) {
                    t.line_color = MUTED_LINE.to_string();
                    t.fill_color = MUTED_FILL.to_string();
                    t.muted = true;
                }
                traces.push(t);
            }
            legend = palette_legend(palette);
            legend.push(LegendItem {
                name: "Unique to sample".to_string(),
                marker: Marker::Line { color: UNIQUE_LINE.to_string() },
            });
            legend.push(LegendItem {
                name: "Selected feature".to_string(),
                marker: Marker::Line { color: SELECTED_MARK.to_string() },
            });
            layout = Layout {
                height: 227,
                x_range: sample.plot_range,
                y_range: [0.0, Y_MAX],
                x_title: None,
                y_title: "Relative intensity",
                hover_background: style.hover_background,
            };
        }
        RenderMode::FeatureDetail(members) => {
            let palette = &DETAIL_PALETTE;
            for &(i, role) in members.iter().filter(|(i, _)| !sample.trace_rt[*i].is_empty()) {
                let slot = match role {
                    Role::Selected => 0,
                    Role::Related => 1,
                };
                let mut t = trace(sample, i, palette.line[slot], palette.fill[slot], style);
                t.role = Some(role);
                traces.push(t);
            }
            legend = palette_legend(palette);
            layout = Layout {
                height: 125,
                x_range: sample.plot_range,
                y_range: [0.0, Y_MAX],
                x_title: Some("Retention time (min)"),
                y_title: "Rel. intensity",
                hover_background: style.hover_background,
            };
        }
    }

    // tallest first so that smaller peaks end up on top
    traces.sort_by(|a, b| b.peak_max.total_cmp(&a.peak_max));

    Plot { traces, legend, layout }
}

/// Draw a plot into an existing container; an empty plot clears it.
pub fn render<V: View + ?Sized>(view: &mut V, container: &str, plot: &Plot) {
    if plot.traces.is_empty() || plot.traces.iter().all(|t| t.peak_max.is_nan()) {
        view.purge_plot(container);
    } else {
        view.draw_plot(container, plot);
    }
}

/// Overlay the highlight box on the main chromatogram.
pub fn apply_highlight<V: View + ?Sized>(view: &mut V, highlight: &HighlightBox) {
    view.set_shapes(MAIN_CHROMATOGRAM, std::slice::from_ref(highlight));
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Static SVG rendition of a plot, traces painted in list order.
pub fn to_svg(plot: &Plot, highlight: Option<&HighlightBox>, width: usize) -> String {
    let width = width.max(MIN_SVG_WIDTH);
    let margin_left = 60.0;
    let margin_right = 20.0;
    let margin_top = 10.0;
    let margin_bottom = 40.0;
    let height = f64::from(plot.layout.height) * 2.0;
    let plot_w = width as f64 - margin_left - margin_right;
    let plot_h = height - margin_top - margin_bottom;

    let range = plot.layout.x_range;
    let span = if range.span() > 0.0 { range.span() } else { 1.0 };
    let y_max = plot.layout.y_range[1];
    let sx = |x: f64| margin_left + (x - range.lower) / span * plot_w;
    let sy = |y: f64| margin_top + plot_h - (y.clamp(0.0, y_max) / y_max) * plot_h;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}" font-family="Arial" font-size="12">"#,
        width, height, width, height
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<clipPath id="plot-area"><rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}"/></clipPath>"#,
        margin_left, margin_top, plot_w, plot_h
    );

    let _ = writeln!(svg, r#"<g clip-path="url(#plot-area)">"#);
    for t in &plot.traces {
        let points: Vec<String> = t
            .x
            .iter()
            .zip(&t.y)
            .map(|(&x, &y)| format!("{:.2},{:.2}", sx(x), sy(y)))
            .collect();
        let _ = writeln!(
            svg,
            r#"<polygon points="{}" fill="{}" stroke="{}" stroke-width="{}"><title>Feature {}</title></polygon>"#,
            points.join(" "),
            t.fill_color,
            t.line_color,
            t.line_width,
            escape(&t.name)
        );
    }
    if let Some(b) = highlight {
        let _ = writeln!(
            svg,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="{}" stroke-width="{}"{}/>"#,
            sx(b.x0),
            sy(b.y1),
            (sx(b.x1) - sx(b.x0)).max(0.0),
            (sy(b.y0) - sy(b.y1)).max(0.0),
            b.line_color,
            b.line_width,
            if b.dash { r#" stroke-dasharray="6,4""# } else { "" }
        );
    }
    let _ = writeln!(svg, "</g>");

    // axes
    let x_axis_y = margin_top + plot_h;
    let _ = writeln!(
        svg,
        r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black" stroke-width="0.5"/>"#,
        margin_left,
        x_axis_y,
        margin_left + plot_w,
        x_axis_y
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black"/>"#,
        margin_left, margin_top, margin_left, x_axis_y
    );
    for tick in 0..=5 {
        let x = range.lower + span * f64::from(tick) / 5.0;
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" fill="grey">{:.1}</text>"#,
            sx(x),
            x_axis_y + 16.0,
            x
        );
    }
    if let Some(title) = plot.layout.x_title {
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" fill="grey">{}</text>"#,
            margin_left + plot_w / 2.0,
            height - 4.0,
            title
        );
    }
    let _ = writeln!(
        svg,
        r#"<text x="14" y="{:.1}" text-anchor="middle" fill="grey" transform="rotate(-90 14 {:.1})">{}</text>"#,
        margin_top + plot_h / 2.0,
        margin_top + plot_h / 2.0,
        plot.layout.y_title
    );
    svg.push_str("</svg>\n");
    svg
}
