use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::layout::LayoutElement;

pub const DEFAULT_STRIDE: usize = 2;
pub const DEFAULT_WINDOW: usize = 5;

/// A window of consecutive page elements stored as one passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_elements: Vec<LayoutElement>,
    pub page_number: u32,
}

impl Chunk {
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.source_elements.iter().map(LayoutElement::filename)
    }

    pub fn filename(&self) -> Option<&str> {
        self.filenames().next()
    }
}

/// Sliding window parameters. `window < stride` is accepted and leaves gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    stride: usize,
    window: usize,
}

impl WindowSpec {
    pub fn new(stride: usize, window: usize) -> Result<Self> {
        if stride == 0 || window == 0 {
            return Err(RagError::InvalidWindow { stride, window });
        }
        Ok(Self { stride, window })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Cut one page's filtered elements into overlapping chunks.
///
/// Windows start every `stride` elements and hold up to `window` of them; the
/// last windows are shorter when they run past the end of the page.
pub fn create_chunks(mut elements: Vec<LayoutElement>, spec: &WindowSpec) -> Vec<Chunk> {
    for (index, element) in elements.iter_mut().enumerate() {
        element.sequence = Some(index);
    }

    (0..elements.len())
        .step_by(spec.stride)
        .map(|start| {
            let end = (start + spec.window).min(elements.len());
            let window = &elements[start..end];
            let text = window
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            Chunk {
                text,
                source_elements: window.to_vec(),
                page_number: window[0].page_number(),
            }
        })
        .collect()
}
