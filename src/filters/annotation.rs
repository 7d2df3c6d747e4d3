use std::collections::{HashMap, HashSet};

use crate::layout::LayoutElement;

pub const DEFAULT_ANNOTATION_THRESHOLD: f64 = 0.5;

/// Remove running headers, footers and watermarks from a whole document.
///
/// Uncategorized texts are counted across the document; a text whose
/// occurrences per page reach `threshold` is dropped from every element that
/// carries it, whatever that element's category.
pub fn remove_annotations(elements: Vec<LayoutElement>, threshold: f64) -> Vec<LayoutElement> {
    let page_count = match elements.iter().map(LayoutElement::page_number).max() {
        Some(n) if n > 0 => n as f64,
        _ => return elements,
    };

    let annotations: HashSet<String> = {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for element in elements.iter().filter(|e| e.is_uncategorized()) {
            *counts.entry(element.text.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count as f64 / page_count >= threshold)
            .map(|(text, _)| text.to_string())
            .collect()
    };

    if annotations.is_empty() {
        return elements;
    }

    tracing::debug!(annotations = ?annotations, "Removing running annotations");
    elements
        .into_iter()
        .filter(|e| !annotations.contains(&e.text))
        .collect()
}
