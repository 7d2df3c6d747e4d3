use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;

use super::chunker::{create_chunks, Chunk, WindowSpec};
use crate::error::Result;
use crate::filters::{remove_annotations, remove_sidebars, DEFAULT_ANNOTATION_THRESHOLD};
use crate::layout::{LayoutElement, LayoutParser};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkingOptions {
    pub window: WindowSpec,
    pub annotation_threshold: f64,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            window: WindowSpec::default(),
            annotation_threshold: DEFAULT_ANNOTATION_THRESHOLD,
        }
    }
}

/// Parse a PDF through `parser` and chunk it.
pub fn get_chunks(parser: &dyn LayoutParser, pdf: &Path, options: &ChunkingOptions) -> Result<Vec<Chunk>> {
    let elements = parser.parse(pdf)?;
    tracing::debug!(pdf = %pdf.display(), elements = elements.len(), "Parsed layout");
    Ok(chunk_document(elements, options))
}

/// Annotation removal over the whole document, then sidebar removal and
/// windowing per page. Pages are processed in parallel and joined in page
/// number order.
pub fn chunk_document(elements: Vec<LayoutElement>, options: &ChunkingOptions) -> Vec<Chunk> {
    let elements = remove_annotations(elements, options.annotation_threshold);

    let mut pages: BTreeMap<u32, Vec<LayoutElement>> = BTreeMap::new();
    for mut element in elements {
        element.normalize_coordinates();
        pages.entry(element.page_number()).or_default().push(element);
    }

    let per_page: Vec<Vec<Chunk>> = pages
        .into_values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|page| create_chunks(remove_sidebars(page), &options.window))
        .collect();

    per_page.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{CoordinateSystem, Coordinates, ElementCategory};

    fn pixel(
        id: String,
        category: ElementCategory,
        text: &str,
        page: u32,
        span: (f64, f64),
    ) -> LayoutElement {
        let coordinates = Coordinates::rect(
            span.0, 100.0, span.1, 140.0,
            CoordinateSystem::PixelSpace, 2000.0, 2800.0,
        );
        LayoutElement::new(id, category, text, page, coordinates)
        .with_filename("handbook.pdf")
    }

    #[test]
    fn test_document_is_filtered_and_chunked_in_page_order() {
        use ElementCategory::{NarrativeText, UncategorizedText};
        const SIDEBAR: (f64, f64) = (0.0, 100.0);

        let mut elements = Vec::new();
        // pages arrive out of order from the parser
        for page in [3u32, 1, 2, 4] {
            for (tag, label) in [("a", "SECTION"), ("b", "PAGE"), ("c", "VOLUME")] {
                let text = format!("{} {}", label, page);
                let id = format!("s{}{}", page, tag);
                elements.push(pixel(id, UncategorizedText, &text, page, SIDEBAR));
            }
            for i in 0..3 {
                let text = format!("Page {} paragraph {}", page, i);
                let id = format!("b{}{}", page, i);
                elements.push(pixel(id, NarrativeText, &text, page, (200.0, 1800.0)));
            }
            let footer = "Company confidential";
            let id = format!("f{}", page);
            elements.push(pixel(id, UncategorizedText, footer, page, (800.0, 1200.0)));
        }

        let chunks = chunk_document(elements, &ChunkingOptions::default());

        let pages: Vec<u32> = chunks.iter().map(|c| c.page_number).collect();
        assert_eq!(pages, vec![1, 1, 2, 2, 3, 3, 4, 4]);
        for chunk in &chunks {
            assert!(!chunk.text.contains("Company confidential"));
            assert!(!chunk.text.contains("SECTION"));
            assert!(chunk
                .source_elements
                .iter()
                .all(|e| e.metadata.coordinates.system == CoordinateSystem::PageRelative));
        }
        assert_eq!(chunks[0].text, "Page 1 paragraph 0\nPage 1 paragraph 1\nPage 1 paragraph 2");
        assert_eq!(chunks[1].text, "Page 1 paragraph 2");
    }

    #[test]
    fn test_get_chunks_propagates_parser_errors() {
        struct FailingParser;
        impl LayoutParser for FailingParser {
            fn parse(&self, pdf: &Path) -> Result<Vec<LayoutElement>> {
                Err(crate::error::RagError::Layout {
                    path: pdf.to_path_buf(),
                    message: "unreadable".to_string(),
                })
            }
        }
        let result = get_chunks(&FailingParser, Path::new("broken.pdf"), &ChunkingOptions::default());
        assert!(result.is_err());
    }
}
