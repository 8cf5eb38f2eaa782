use serde::Serialize;

use super::record::PlotItem;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchFilter {
    term: String,
}

impl SearchFilter {
    pub fn new(term: &str) -> Self {
        Self {
            term: term.to_string(),
        }
    }

    /// Picks the term for a page load: on the very first load a non-empty
    /// URL fragment wins over the input box. Returns the filter and the
    /// fragment to write back to the location.
    pub fn resolve(page_load: usize, fragment: Option<&str>, input: &str) -> (Self, String) {
        let fragment = fragment
            .map(|f| f.trim_start_matches('#'))
            .filter(|f| !f.is_empty());
        match fragment {
            Some(f) if page_load <= 1 => (Self::new(f), f.to_string()),
            _ => (Self::new(input), input.to_string()),
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_empty(&self) -> bool {
        self.term.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        name.contains(self.term.as_str())
    }

    /// Recomputes `hidden` for every item. Items hidden by an earlier, stricter
    /// term become visible again.
    pub fn apply(&self, items: &mut [PlotItem]) -> usize {
        let mut visible = 0;
        for item in items.iter_mut() {
            item.hidden = !self.matches(&item.name);
            if !item.hidden {
                visible += 1;
            }
        }
        visible
    }
}
