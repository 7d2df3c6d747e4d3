//! Property tests for page windowing and sidebar removal.

use pdf_rag::filters::remove_sidebars;
use pdf_rag::indexer::{create_chunks, WindowSpec};
use pdf_rag::layout::{Coordinates, ElementCategory, LayoutElement};
use proptest::prelude::*;

fn element(id: usize, category: ElementCategory, text: &str, x0: f64, x1: f64) -> LayoutElement {
    let y = 20.0 * id as f64;
    LayoutElement::new(
        format!("e{}", id),
        category,
        text,
        1,
        Coordinates::page_relative(x0, y, x1, y + 10.0),
    )
}

fn page(n: usize) -> Vec<LayoutElement> {
    (0..n)
        .map(|i| element(i, ElementCategory::NarrativeText, &format!("line {}", i), 100.0, 900.0))
        .collect()
}

/// Stride no larger than the window, so consecutive windows touch or overlap.
fn arb_spec() -> impl Strategy<Value = WindowSpec> {
    (1usize..6, 0usize..6).prop_map(|(stride, extra)| WindowSpec::new(stride, stride + extra).unwrap())
}

mod prop_windowing {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunk_count_is_ceil_of_len_over_stride(n in 0usize..40, spec in arb_spec()) {
            let chunks = create_chunks(page(n), &spec);
            prop_assert_eq!(chunks.len(), n.div_ceil(spec.stride()));
        }

        #[test]
        fn every_element_is_covered(n in 1usize..40, spec in arb_spec()) {
            let chunks = create_chunks(page(n), &spec);
            let mut seen = vec![false; n];
            for chunk in &chunks {
                prop_assert!(!chunk.source_elements.is_empty());
                prop_assert!(chunk.source_elements.len() <= spec.window());
                for e in &chunk.source_elements {
                    seen[e.sequence.unwrap()] = true;
                }
            }
            prop_assert!(seen.iter().all(|s| *s));
        }

        #[test]
        fn full_windows_overlap_by_window_minus_stride(n in 1usize..40, spec in arb_spec()) {
            let chunks = create_chunks(page(n), &spec);
            for pair in chunks.windows(2) {
                let first: Vec<usize> = pair[0].source_elements.iter().filter_map(|e| e.sequence).collect();
                let second: Vec<usize> = pair[1].source_elements.iter().filter_map(|e| e.sequence).collect();
                prop_assert_eq!(second[0], first[0] + spec.stride());
                if first.len() == spec.window() {
                    let shared = first.iter().filter(|i| second.contains(i)).count();
                    prop_assert_eq!(shared, (spec.window() - spec.stride()).min(second.len()));
                }
            }
        }

        #[test]
        fn chunk_text_joins_sources_in_order(n in 1usize..20, spec in arb_spec()) {
            for chunk in create_chunks(page(n), &spec) {
                let joined = chunk.source_elements.iter().map(|e| e.text.as_str()).collect::<Vec<_>>().join("\n");
                prop_assert_eq!(chunk.text, joined);
            }
        }
    }
}

mod prop_sidebar_idempotence {
    use super::*;

    /// Body lines always contain lower case and a space, so they can never
    /// be a sidebar or a page caption.
    fn arb_body() -> impl Strategy<Value = Vec<(String, u8)>> {
        proptest::collection::vec(("[a-z]{2,8} [a-z]{2,8}", 0u8..3), 1..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn removal_is_idempotent(
            sidebar_len in 0usize..5,
            body in arb_body(),
        ) {
            let mut elements = Vec::new();
            for i in 0..sidebar_len {
                elements.push(element(i, ElementCategory::Title, &format!("CHAPTER {}", i), 0.0, 50.0));
            }
            for (i, (text, column)) in body.iter().enumerate() {
                let x0 = 100.0 + 100.0 * *column as f64;
                elements.push(element(sidebar_len + i, ElementCategory::UncategorizedText, text, x0, x0 + 300.0));
            }

            let once = remove_sidebars(elements.clone());
            let twice = remove_sidebars(once.clone());
            prop_assert_eq!(&once, &twice);

            let expected_len = if sidebar_len >= 3 { body.len() } else { elements.len() };
            prop_assert_eq!(once.len(), expected_len);
        }
    }
}
