use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{CoordinateSystem, Coordinates, ElementMetadata, LayoutElement};
use crate::error::{RagError, Result};

/// Source of layout elements for a PDF.
pub trait LayoutParser: Send + Sync {
    fn parse(&self, pdf: &Path) -> Result<Vec<LayoutElement>>;
}

/// Reads the element dump the layout parser writes next to each PDF,
/// `<layout_dir>/<pdf stem>.json`.
#[derive(Debug, Clone)]
pub struct JsonLayoutParser {
    layout_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    category: String,
    element_id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    page_number: Option<u32>,
    filename: Option<String>,
    coordinates: Option<RawCoordinates>,
}

#[derive(Debug, Deserialize)]
struct RawCoordinates {
    points: Vec<[f64; 2]>,
    system: CoordinateSystem,
    layout_width: Option<f64>,
    layout_height: Option<f64>,
}

impl JsonLayoutParser {
    pub fn new(layout_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout_dir: layout_dir.into(),
        }
    }

    pub fn layout_path(&self, pdf: &Path) -> PathBuf {
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.layout_dir.join(format!("{}.json", stem))
    }
}

impl LayoutParser for JsonLayoutParser {
    fn parse(&self, pdf: &Path) -> Result<Vec<LayoutElement>> {
        let layout_path = self.layout_path(pdf);
        let data = std::fs::read_to_string(&layout_path).map_err(|e| RagError::Layout {
            path: layout_path.clone(),
            message: format!("Failed to read layout dump: {}", e),
        })?;
        let filename = pdf
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        parse_elements(&data, &filename).map_err(|message| RagError::Layout {
            path: layout_path,
            message,
        })
    }
}

/// Parse an element dump. `fallback_filename` fills in elements that carry
/// no filename of their own.
pub fn parse_elements(data: &str, fallback_filename: &str) -> std::result::Result<Vec<LayoutElement>, String> {
    let raw: Vec<RawElement> = serde_json::from_str(data).map_err(|e| format!("Invalid layout JSON: {}", e))?;
    raw.into_iter()
        .map(|element| convert(element, fallback_filename))
        .collect()
}

fn convert(raw: RawElement, fallback_filename: &str) -> std::result::Result<LayoutElement, String> {
    let coordinates = raw
        .metadata
        .coordinates
        .ok_or_else(|| format!("Element {} has no coordinates", raw.element_id))?;

    let points: [(f64, f64); 4] = match coordinates.points.as_slice() {
        [a, b, c, d] => [(a[0], a[1]), (b[0], b[1]), (c[0], c[1]), (d[0], d[1])],
        other => {
            return Err(format!(
                "Element {} has {} bounding box points, expected 4",
                raw.element_id,
                other.len()
            ))
        }
    };

    let (layout_width, layout_height) = match (coordinates.system, coordinates.layout_width, coordinates.layout_height) {
        (_, Some(w), Some(h)) if w > 0.0 && h > 0.0 => (w, h),
        (CoordinateSystem::RelativeCoordinateSystem, None, None) => (1.0, 1.0),
        _ => return Err(format!("Element {} has no usable layout size", raw.element_id)),
    };

    let filename = raw
        .metadata
        .filename
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| fallback_filename.to_string());

    Ok(LayoutElement {
        id: raw.element_id,
        category: raw.category.into(),
        text: raw.text,
        metadata: ElementMetadata {
            filename,
            page_number: raw.metadata.page_number.unwrap_or(1),
            coordinates: Coordinates {
                points,
                system: coordinates.system,
                layout_width,
                layout_height,
            },
        },
        sequence: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ElementCategory;

    const DUMP: &str = r#"[
        {
            "type": "Title",
            "element_id": "a1",
            "text": "Policy Terms",
            "metadata": {
                "page_number": 1,
                "filename": "policy.pdf",
                "coordinates": {
                    "points": [[100.0, 50.0], [100.0, 80.0], [900.0, 80.0], [900.0, 50.0]],
                    "system": "PixelSpace",
                    "layout_width": 1000,
                    "layout_height": 1400
                }
            }
        },
        {
            "type": "UncategorizedText",
            "element_id": "a2",
            "text": "3",
            "metadata": {
                "page_number": 1,
                "coordinates": {
                    "points": [[0.5, 0.1], [0.5, 0.05], [0.52, 0.05], [0.52, 0.1]],
                    "system": "RelativeCoordinateSystem"
                }
            }
        }
    ]"#;

    #[test]
    fn test_parse_element_dump() {
        let elements = parse_elements(DUMP, "fallback.pdf").unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].category, ElementCategory::Title);
        assert_eq!(elements[0].filename(), "policy.pdf");
        assert_eq!(elements[0].metadata.coordinates.right_x(), 900.0);
        assert_eq!(elements[1].filename(), "fallback.pdf");
        assert_eq!(elements[1].metadata.coordinates.layout_width, 1.0);
    }

    #[test]
    fn test_missing_coordinates_is_rejected() {
        let dump = r#"[{"type": "Title", "element_id": "x", "text": "t", "metadata": {"page_number": 2}}]"#;
        let err = parse_elements(dump, "f.pdf").unwrap_err();
        assert!(err.contains("no coordinates"));
    }

    #[test]
    fn test_json_parser_reads_dump_next_to_pdf() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("policy.json"), DUMP).unwrap();
        let parser = JsonLayoutParser::new(dir.path());
        let elements = parser.parse(&dir.path().join("policy.pdf")).unwrap();
        assert_eq!(elements.len(), 2);

        let missing = parser.parse(&dir.path().join("other.pdf"));
        assert!(matches!(missing, Err(RagError::Layout { .. })));
    }
}
