use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub matched: bool,
}

impl Span {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            matched: false,
        }
    }

    fn hit(text: &str) -> Self {
        Self {
            text: text.to_string(),
            matched: true,
        }
    }
}

/// Splits `name` into plain and matched spans, left to right, taking
/// non-overlapping occurrences of `term`.
pub fn highlight(name: &str, term: &str) -> Vec<Span> {
    if term.is_empty() {
        return vec![Span::plain(name)];
    }

    let mut spans = Vec::new();
    let mut cursor = 0;
    for (start, hit) in name.match_indices(term) {
        if start > cursor {
            spans.push(Span::plain(&name[cursor..start]));
        }
        spans.push(Span::hit(hit));
        cursor = start + hit.len();
    }
    if cursor < name.len() || spans.is_empty() {
        spans.push(Span::plain(&name[cursor..]));
    }
    spans
}

pub fn joined(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}
