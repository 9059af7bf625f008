//! Web server for the feature dashboard
//!
//! Requests are handled one at a time from the `tiny_http` loop, so the dashboard is
//! owned by the loop and mutated without locking. Routing is a pure function of the
//! request so it can be exercised without a socket.

use crate::dashboard::Dashboard;
use crate::error::DashboardError;
use crate::files;
use crate::panel::{self, FilterEdit};
use crate::payload::{FeatureId, NetworkKind};
use crate::surface::RecordedView;
use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tiny_http::{Header, Method, Response, Server};

const DEFAULT_SVG_WIDTH: usize = 1000;

/// Everything a request may touch
pub struct ServerState {
    pub dashboard: Dashboard<RecordedView>,
    pub results_dir: PathBuf,
    pub job_id: String,
}

/// Response produced by [`route`]
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// File name for `Content-Disposition: attachment`
    pub attachment: Option<String>,
}

impl Reply {
    fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Reply { status, content_type, body: body.into(), attachment: None }
    }

    fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Reply::new(200, "application/json", body),
            Err(e) => Reply::error(500, &e.to_string()),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Reply::new(status, "application/json", body)
    }

    fn not_found() -> Self {
        Reply::new(404, "text/plain", "Not found")
    }
}

/// Start the web server and serve until the process is interrupted
pub fn start_server(mut state: ServerState, port: u16, open_browser: bool) -> Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr).map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    let url = format!("http://localhost:{}", port);
    info!("Server running at {}", url);
    info!("Press Ctrl+C to stop");

    if open_browser {
        if let Err(e) = webbrowser::open(&url) {
            warn!("Could not open browser: {}. Please open {} manually.", e, url);
        }
    }

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        let mut body = String::new();
        if let Err(e) = request.as_reader().read_to_string(&mut body) {
            warn!("Could not read request body for {}: {}", url, e);
        }

        let reply = route(&mut state, &method, &url, &body);
        debug!("{} {} -> {}", method, url, reply.status);

        let mut response = Response::from_data(reply.body).with_status_code(reply.status);
        if let Ok(header) = Header::from_bytes("Content-Type", reply.content_type) {
            response.add_header(header);
        }
        if let Some(name) = reply.attachment {
            let value = format!("attachment; filename=\"{}\"", name);
            if let Ok(header) = Header::from_bytes("Content-Disposition", value.as_bytes()) {
                response.add_header(header);
            }
        }
        if let Err(e) = request.respond(response) {
            warn!("Failed to send response for {}: {}", url, e);
        }
    }

    Ok(())
}

/// Parse query parameters from URL path
fn parse_query_params(path: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(query) = path.split('?').nth(1) {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                params.insert(key.to_string(), decode_component(&value.replace('+', " ")));
            }
        }
    }
    params
}

/// Percent-decode one path segment or query value
fn decode_component(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn error_status(err: &DashboardError) -> u16 {
    match err {
        DashboardError::SampleNotFound(_) | DashboardError::FeatureNotFound(_) => 404,
        DashboardError::NoSampleSelected | DashboardError::NoFeatureSelected => 409,
        _ => 400,
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    view: &'a RecordedView,
    network: NetworkKind,
    inputs: &'a panel::FilterInputs,
    /// Inputs as interpreted by the filter
    filters: &'a crate::filter::FilterConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    selection: Option<&'a crate::network::Selection>,
}

fn snapshot(state: &ServerState) -> Reply {
    let d = &state.dashboard;
    Reply::json(&Snapshot {
        view: d.view(),
        network: d.network_kind(),
        inputs: d.inputs(),
        filters: d.filter_config(),
        selection: d.selection(),
    })
}

/// Result of an interaction; a feature outside the active network still updates the view.
fn interaction(state: &ServerState, result: Result<(), DashboardError>) -> Reply {
    match result {
        Ok(()) | Err(DashboardError::NotInNetwork { .. }) => snapshot(state),
        Err(e) => Reply::error(error_status(&e), &e.to_string()),
    }
}

#[derive(Serialize)]
struct Options {
    panel: panel::PanelOptions,
    downloads: Vec<files::DownloadOption>,
}

/// Dispatch one request
pub fn route(state: &mut ServerState, method: &Method, url: &str, body: &str) -> Reply {
    let path = url.split('?').next().unwrap_or(url);
    let segments: Vec<String> = path
        .trim_start_matches('/')
        .split('/')
        .map(decode_component)
        .collect();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    match (method, segments.as_slice()) {
        (Method::Get, [""]) | (Method::Get, ["index.html"]) => {
            Reply::new(200, "text/html; charset=utf-8", index_html(state))
        }
        (Method::Get, ["api", "view"]) => snapshot(state),
        (Method::Get, ["api", "samples"]) => Reply::json(&state.dashboard.sample_counts()),
        (Method::Get, ["api", "options"]) => Reply::json(&Options {
            panel: panel::options(state.dashboard.dataset().groups(), state.dashboard.inputs()),
            downloads: files::probe_downloads(&state.results_dir, &state.job_id),
        }),
        (Method::Post, ["api", "sample", name]) => {
            let result = state.dashboard.select_sample(name);
            interaction(state, result)
        }
        (Method::Post, ["api", "feature", id]) => {
            let result = state.dashboard.click_feature(&FeatureId::new(id.trim()));
            interaction(state, result)
        }
        (Method::Post, ["api", "network", kind]) => {
            let result = kind
                .parse::<NetworkKind>()
                .and_then(|kind| state.dashboard.set_network_kind(kind));
            interaction(state, result)
        }
        (Method::Post, ["api", "filters"]) => match serde_json::from_str::<FilterEdit>(body) {
            Ok(edit) => {
                state.dashboard.apply_edit(edit);
                snapshot(state)
            }
            Err(e) => Reply::error(400, &format!("invalid filter edit: {}", e)),
        },
        (Method::Post, ["api", "filters", "reset"]) => {
            state.dashboard.reset_filters();
            snapshot(state)
        }
        (Method::Get, ["chromatogram.svg"]) | (Method::Get, ["feature_chromatogram.svg"]) => {
            let width = parse_query_params(url)
                .get("width")
                .and_then(|w| w.parse().ok())
                .unwrap_or(DEFAULT_SVG_WIDTH);
            let svg = if segments[0] == "chromatogram.svg" {
                state.dashboard.chromatogram_svg(width)
            } else {
                state.dashboard.feature_chromatogram_svg(width)
            };
            match svg {
                Ok(svg) => Reply::new(200, "image/svg+xml", svg),
                Err(e) => Reply::error(error_status(&e), &e.to_string()),
            }
        }
        (Method::Get, ["check_file", job, file]) => {
            Reply::json(&serde_json::json!({ "exists": files::check_file(&state.results_dir, job, file) }))
        }
        (Method::Get, ["download", job, file]) => match files::read_download(&state.results_dir, job, file) {
            Ok(Some(bytes)) => Reply {
                attachment: Some(file.to_string()),
                ..Reply::new(200, "application/octet-stream", bytes)
            },
            Ok(None) => Reply::error(404, "File not found"),
            Err(e) => {
                warn!("{:#}", e);
                Reply::error(500, "File read error")
            }
        },
        _ => Reply::not_found(),
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn index_html(state: &ServerState) -> String {
    let d = &state.dashboard;
    let active = d.active_sample().map(|s| s.name.as_str());

    let mut rows = String::new();
    for row in d.sample_counts() {
        let name = html_escape(&row.sample);
        let class = if Some(row.sample.as_str()) == active { " class=\"active\"" } else { "" };
        rows.push_str(&format!(
            "<tr{}><td><a href=\"#\" data-sample=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>\n",
            class, name, name, row.retained, row.total
        ));
    }

    let mut downloads = String::new();
    for option in files::probe_downloads(&state.results_dir, &state.job_id) {
        match option.url {
            Some(url) => downloads.push_str(&format!("<li><a href=\"{}\">{}</a></li>\n", url, option.file)),
            None => downloads.push_str(&format!("<li class=\"disabled\">{}</li>\n", option.file)),
        }
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>fermoview - {job}</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; }}
td, th {{ padding: 4px 12px; border-bottom: 1px solid #ddd; }}
tr.active {{ background: #f4aaa7; }}
li.disabled {{ color: #aaa; }}
</style>
</head>
<body>
<h1>Job {job}</h1>
<table>
<tr><th>Sample</th><th>Features in range</th><th>Total</th></tr>
{rows}</table>
<p><img id="chromatogram" src="/chromatogram.svg" alt="chromatogram"></p>
<p><a href="/api/view">Current view (JSON)</a> | <a href="/api/options">Filter options (JSON)</a></p>
<h2>Downloads</h2>
<ul>
{downloads}</ul>
<script>
document.querySelectorAll('[data-sample]').forEach(function (link) {{
  link.addEventListener('click', function (event) {{
    event.preventDefault();
    fetch('/api/sample/' + encodeURIComponent(link.dataset.sample), {{ method: 'POST' }})
      .then(function () {{ location.reload(); }});
  }});
}});
</script>
</body>
</html>
"#,
        job = html_escape(&state.job_id),
        rows = rows,
        downloads = downloads,
    )
}
