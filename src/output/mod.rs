pub mod report;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::QueryContext;
use crate::gallery::{Gallery, GridLayout, PlotItem};
use crate::navigation::{NavigationQuery, RunNeighbors};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

/// Where the page's query context came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Query,
    Restored,
    None,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Navigation {
    pub runs: Vec<u64>,
    pub neighbors: RunNeighbors,
    pub next: Option<NavigationQuery>,
    pub previous: Option<NavigationQuery>,
}

/// Everything a renderer needs for one gallery page.
#[derive(Clone, Debug, Serialize)]
pub struct GalleryView {
    pub context: Option<QueryContext>,
    pub context_source: ContextSource,
    pub search: String,
    pub total: usize,
    pub visible: usize,
    pub layout: GridLayout,
    /// Every plot, hidden or not, so a page can re-filter without a reload.
    pub items: Vec<PlotItem>,
    pub navigation: Option<Navigation>,
    pub annotations: BTreeMap<usize, String>,
}

impl GalleryView {
    pub fn from_gallery(gallery: &Gallery) -> Self {
        Self {
            context: None,
            context_source: ContextSource::None,
            search: gallery.search().term().to_string(),
            total: gallery.items().len(),
            visible: gallery.visible_count(),
            layout: gallery.layout().clone(),
            items: gallery.items().to_vec(),
            navigation: None,
            annotations: BTreeMap::new(),
        }
    }

    /// The info table is only shown for a query that named both runs.
    pub fn shows_info_table(&self) -> bool {
        self.context_source == ContextSource::Query
            && self.context.as_ref().is_some_and(QueryContext::has_comparison)
    }

    pub fn shows_title_wells(&self) -> bool {
        !self.shows_info_table() && self.context_source == ContextSource::Restored
    }
}

pub fn render_text(view: &GalleryView) -> Vec<u8> {
    let mut out = String::new();
    for entry in view.layout.entries() {
        for span in entry.spans.iter() {
            if span.matched {
                out.push('[');
                out.push_str(&span.text);
                out.push(']');
            } else {
                out.push_str(&span.text);
            }
        }
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_json(view: &GalleryView) -> Vec<u8> {
    serde_json::to_vec_pretty(view).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render_html(view: &GalleryView) -> Vec<u8> {
    report::render_html(view)
}

pub fn render(view: &GalleryView, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(view),
        OutputFormat::Json => render_json(view),
        OutputFormat::Html => render_html(view),
    }
}
