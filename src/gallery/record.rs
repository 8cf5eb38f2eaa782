use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::scale::{self, ScaleMode, ScaleOptions, ThumbSize};
use super::GalleryError;

/// One plot as handed over by the backend.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RawRecord {
    pub png_path: String,
    pub pdf_path: String,
    #[serde(default, deserialize_with = "deserialize_annotation_path")]
    pub txt_path: Option<String>,
    pub width: f64,
    pub height: f64,
}

impl RawRecord {
    pub fn new(png_path: &str, pdf_path: &str, txt_path: Option<&str>, width: f64, height: f64) -> Self {
        Self {
            png_path: png_path.to_string(),
            pdf_path: pdf_path.to_string(),
            txt_path: txt_path.and_then(normalize_annotation_path),
            width,
            height,
        }
    }
}

fn normalize_annotation_path(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "None" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn deserialize_annotation_path<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(normalize_annotation_path))
}

/// Display model for a single thumbnail.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PlotItem {
    pub index: usize,
    pub name: String,
    pub png_path: String,
    pub pdf_path: String,
    pub txt_path: Option<String>,
    pub width: f64,
    pub height: f64,
    pub hidden: bool,
}

pub fn display_name(png_path: &str) -> String {
    let file = png_path.rsplit('/').next().unwrap_or_default();
    file.split('.').next().unwrap_or_default().to_string()
}

fn check_dimensions(index: usize, record: &RawRecord) -> Result<(), GalleryError> {
    let valid = |v: f64| v.is_finite() && v >= 0.0;
    if valid(record.width) && valid(record.height) {
        Ok(())
    } else {
        Err(GalleryError::InvalidDimensions {
            index,
            width: record.width,
            height: record.height,
        })
    }
}

pub fn normalize(records: &[RawRecord], options: &ScaleOptions) -> Result<Vec<PlotItem>, GalleryError> {
    for (index, record) in records.iter().enumerate() {
        check_dimensions(index, record)?;
    }

    let shared = match options.mode {
        ScaleMode::Shared => Some(scale::shared_divisor(
            records.iter().map(|r| (r.width, r.height)),
            options,
        )),
        ScaleMode::PerRecord => None,
    };

    Ok(records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let div = shared.unwrap_or_else(|| {
                scale::divisor(
                    scale::longest_side(record.width, record.height),
                    options.limit,
                    options.step,
                )
            });
            let thumb = ThumbSize::scaled(record.width, record.height, div);
            PlotItem {
                index,
                name: display_name(&record.png_path),
                png_path: record.png_path.clone(),
                pdf_path: record.pdf_path.clone(),
                txt_path: record.txt_path.clone(),
                width: thumb.width,
                height: thumb.height,
                hidden: false,
            }
        })
        .collect())
}

pub fn parse_records(json: &str) -> Result<Vec<RawRecord>, GalleryError> {
    serde_json::from_str(json).map_err(|e| GalleryError::Parse { source: e })
}

pub async fn load_records(path: &Path) -> Result<Vec<RawRecord>, GalleryError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| GalleryError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
    parse_records(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_directories_and_extensions() {
        assert_eq!(display_name("plots/run1/hORecHits.png"), "hORecHits");
        assert_eq!(display_name("a/b/hRHGlobal.v2.png"), "hRHGlobal");
        assert_eq!(display_name("bare"), "bare");
        assert_eq!(display_name(""), "");
        assert_eq!(display_name("dir/"), "");
    }

    #[test]
    fn annotation_none_string_is_absent() {
        let records = parse_records(
            r#"[
                {"png_path": "a.png", "pdf_path": "a.pdf", "txt_path": "None", "width": 10, "height": 20},
                {"png_path": "b.png", "pdf_path": "b.pdf", "txt_path": null, "width": 10, "height": 20},
                {"png_path": "c.png", "pdf_path": "c.pdf", "width": 10, "height": 20},
                {"png_path": "d.png", "pdf_path": "d.pdf", "txt_path": "txt/d.txt", "width": 10.5, "height": 20}
            ]"#,
        )
        .unwrap();
        assert_eq!(records[0].txt_path, None);
        assert_eq!(records[1].txt_path, None);
        assert_eq!(records[2].txt_path, None);
        assert_eq!(records[3].txt_path.as_deref(), Some("txt/d.txt"));
        assert_eq!(records[3].width, 10.5);
    }

    #[test]
    fn per_record_scaling_uses_own_longest_side() {
        let records = vec![
            RawRecord::new("x/big.png", "x/big.pdf", None, 1000.0, 500.0),
            RawRecord::new("x/small.png", "x/small.pdf", None, 200.0, 100.0),
        ];
        let items = normalize(&records, &ScaleOptions::default()).unwrap();
        assert_eq!((items[0].width, items[0].height), (250.0, 125.0));
        assert_eq!((items[1].width, items[1].height), (200.0, 100.0));
        assert_eq!(items[0].name, "big");
        assert_eq!(items[1].index, 1);
        assert!(items.iter().all(|i| !i.hidden));
    }

    #[test]
    fn shared_scaling_applies_one_divisor() {
        let records = vec![
            RawRecord::new("x/big.png", "x/big.pdf", None, 1000.0, 500.0),
            RawRecord::new("x/small.png", "x/small.pdf", None, 200.0, 100.0),
        ];
        let opts = ScaleOptions {
            mode: ScaleMode::Shared,
            ..ScaleOptions::default()
        };
        let items = normalize(&records, &opts).unwrap();
        assert_eq!((items[1].width, items[1].height), (50.0, 25.0));
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        let records = vec![
            RawRecord::new("ok.png", "ok.pdf", None, 10.0, 10.0),
            RawRecord::new("bad.png", "bad.pdf", None, -1.0, 10.0),
        ];
        match normalize(&records, &ScaleOptions::default()) {
            Err(GalleryError::InvalidDimensions { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn huge_dimensions_still_fit_the_limit() {
        let records = vec![RawRecord::new("huge.png", "huge.pdf", None, 1e300, 10.0)];
        let items = normalize(&records, &ScaleOptions::default()).unwrap();
        assert!(items[0].width.is_finite());
        assert!(items[0].width <= 250.0 * (1.0 + 1e-9));

        let opts = ScaleOptions {
            step: 1e-17,
            ..ScaleOptions::default()
        };
        let records = vec![RawRecord::new("wide.png", "wide.pdf", None, 500.0, 100.0)];
        let items = normalize(&records, &opts).unwrap();
        assert!(items[0].width <= 250.0 * (1.0 + 1e-9));
    }

    #[test]
    fn zero_dimensions_give_empty_thumbnail() {
        let records = vec![RawRecord::new("z.png", "z.pdf", None, 0.0, 0.0)];
        let items = normalize(&records, &ScaleOptions::default()).unwrap();
        assert_eq!((items[0].width, items[0].height), (0.0, 0.0));
    }
}
