use serde::Serialize;

use super::filter::SearchFilter;
use super::highlight::{self, Span};
use super::record::PlotItem;

pub const DEFAULT_COLUMNS: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridEntry {
    /// Position in the unfiltered list; doubles as the image id.
    pub index: usize,
    pub name: String,
    pub spans: Vec<Span>,
    pub png_path: String,
    pub pdf_path: String,
    pub txt_path: Option<String>,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridCell {
    pub slot: usize,
    pub entry: Option<GridEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GridRow {
    pub cells: Vec<GridCell>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: Vec<GridRow>,
}

impl GridLayout {
    pub fn empty(columns: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &GridEntry> {
        self.rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .filter_map(|c| c.entry.as_ref())
    }

    pub fn slot_count(&self) -> usize {
        self.rows.len() * self.columns
    }

    pub fn entry_at(&self, slot: usize) -> Option<&GridEntry> {
        let row = self.rows.get(slot / self.columns.max(1))?;
        row.cells.get(slot % self.columns.max(1))?.entry.as_ref()
    }
}

fn entry_for(item: &PlotItem, filter: &SearchFilter) -> GridEntry {
    GridEntry {
        index: item.index,
        name: item.name.clone(),
        spans: highlight::highlight(&item.name, filter.term()),
        png_path: item.png_path.clone(),
        pdf_path: item.pdf_path.clone(),
        txt_path: item.txt_path.clone(),
        width: item.width,
        height: item.height,
    }
}

/// Fills slots `0..` with the visible items in order, `columns` per row.
/// Hidden items leave no gap; the last row is padded with empty cells.
pub fn layout(items: &[PlotItem], filter: &SearchFilter, columns: usize) -> GridLayout {
    let columns = columns.max(1);
    let visible: Vec<GridEntry> = items
        .iter()
        .filter(|i| !i.hidden)
        .map(|i| entry_for(i, filter))
        .collect();

    let row_count = visible.len().div_ceil(columns);
    let mut rows: Vec<GridRow> = (0..row_count)
        .map(|r| GridRow {
            cells: (0..columns)
                .map(|c| GridCell {
                    slot: r * columns + c,
                    entry: None,
                })
                .collect(),
        })
        .collect();

    for (slot, entry) in visible.into_iter().enumerate() {
        rows[slot / columns].cells[slot % columns].entry = Some(entry);
    }

    GridLayout { columns, rows }
}
