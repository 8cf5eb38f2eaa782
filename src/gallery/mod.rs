pub mod filter;
pub mod grid;
pub mod highlight;
pub mod record;
pub mod scale;

use thiserror::Error;

pub use filter::SearchFilter;
pub use grid::{GridCell, GridEntry, GridLayout, GridRow, DEFAULT_COLUMNS};
pub use highlight::Span;
pub use record::{PlotItem, RawRecord};
pub use scale::{ScaleMode, ScaleOptions};

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("record {index} has invalid dimensions {width}x{height}")]
    InvalidDimensions { index: usize, width: f64, height: f64 },

    #[error("invalid column count {value}, expected positive integer")]
    InvalidColumns { value: usize },

    #[error("invalid scale options: {message}")]
    InvalidScale { message: String },

    #[error("failed to read records file: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse records: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GalleryOptions {
    pub columns: usize,
    pub scale: ScaleOptions,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            scale: ScaleOptions::default(),
        }
    }
}

impl GalleryOptions {
    pub fn validate(&self) -> Result<(), GalleryError> {
        if self.columns == 0 {
            return Err(GalleryError::InvalidColumns {
                value: self.columns,
            });
        }
        self.scale
            .validate()
            .map_err(|message| GalleryError::InvalidScale { message })
    }
}

/// Holds the raw records and the current search term. Every load, refresh or
/// search change rebuilds the display model from the raw records, so nothing
/// from an earlier pass leaks into the next one.
#[derive(Clone, Debug)]
pub struct Gallery {
    options: GalleryOptions,
    records: Vec<RawRecord>,
    search: SearchFilter,
    items: Vec<PlotItem>,
    layout: GridLayout,
    page_loads: usize,
}

impl Gallery {
    pub fn new(options: GalleryOptions) -> Result<Self, GalleryError> {
        options.validate()?;
        Ok(Self {
            options,
            records: Vec::new(),
            search: SearchFilter::default(),
            items: Vec::new(),
            layout: GridLayout::empty(options.columns),
            page_loads: 0,
        })
    }

    pub fn load(&mut self, records: Vec<RawRecord>) -> Result<&GridLayout, GalleryError> {
        self.records = records;
        self.page_loads += 1;
        self.rebuild()
    }

    pub fn refresh(&mut self) -> Result<&GridLayout, GalleryError> {
        self.page_loads += 1;
        self.rebuild()
    }

    pub fn set_search(&mut self, term: &str) -> Result<&GridLayout, GalleryError> {
        self.search = SearchFilter::new(term);
        self.rebuild()
    }

    pub fn set_filter(&mut self, filter: SearchFilter) -> Result<&GridLayout, GalleryError> {
        self.search = filter;
        self.rebuild()
    }

    fn rebuild(&mut self) -> Result<&GridLayout, GalleryError> {
        let mut items = record::normalize(&self.records, &self.options.scale)?;
        self.search.apply(&mut items);
        self.layout = grid::layout(&items, &self.search, self.options.columns);
        self.items = items;
        Ok(&self.layout)
    }

    pub fn options(&self) -> &GalleryOptions {
        &self.options
    }

    pub fn items(&self) -> &[PlotItem] {
        &self.items
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn search(&self) -> &SearchFilter {
        &self.search
    }

    pub fn page_loads(&self) -> usize {
        self.page_loads
    }

    pub fn visible_count(&self) -> usize {
        self.items.iter().filter(|i| !i.hidden).count()
    }

    pub fn annotation_path(&self, index: usize) -> Option<&str> {
        self.items.get(index)?.txt_path.as_deref()
    }
}
