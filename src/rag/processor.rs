use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use super::index::RetrievalResult;
use crate::layout::{Coordinates, PAGE_RELATIVE_EXTENT};

/// Words shorter than this never count as overlap with the answer.
const MIN_WORD_LEN: usize = 4;

pub const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([220, 30, 30]);
const HIGHLIGHT_THICKNESS: u32 = 4;

/// One source page prepared for display next to an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportingImage {
    pub caption: String,
    pub filename: String,
    pub page_number: u32,
    /// JPEG bytes of the page with `highlights` outlined, if a rendering
    /// exists.
    pub image: Option<Vec<u8>>,
    pub highlights: Vec<Coordinates>,
}

pub type SupportingImages = Box<dyn Iterator<Item = SupportingImage> + Send>;

pub trait ImageProcessor: Send + Sync {
    /// Produce one item per result, in result order. Implementations should
    /// defer expensive work until the iterator is advanced.
    fn annotate(&self, docs: &[RetrievalResult], answer: &str) -> SupportingImages;
}

/// Serves page renderings stored as `<images_dir>/<pdf filename>/<page - 1>.jpg`.
pub struct PageImageProcessor {
    images_dir: PathBuf,
}

impl PageImageProcessor {
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }

    pub fn page_image_path(&self, filename: &str, page_number: u32) -> PathBuf {
        self.images_dir
            .join(filename)
            .join(format!("{}.jpg", page_number.saturating_sub(1)))
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// Boxes of the source elements that share a word with the answer, or
/// every box when none do.
fn highlights_for(doc: &RetrievalResult, answer_words: &HashSet<String>) -> Vec<Coordinates> {
    let elements = &doc.chunk.source_elements;
    let matching: Vec<Coordinates> = elements
        .iter()
        .filter(|e| !significant_words(&e.text).is_disjoint(answer_words))
        .map(|e| e.metadata.coordinates.clone())
        .collect();

    if matching.is_empty() {
        elements.iter().map(|e| e.metadata.coordinates.clone()).collect()
    } else {
        matching
    }
}

/// Outline each box on the page, scaled from page-relative units to the
/// image size and clamped to its bounds.
pub fn draw_highlights(page: &mut RgbImage, boxes: &[Coordinates]) {
    let (width, height) = page.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let to_pixel = |value: f64, size: u32| -> u32 {
        let max = f64::from(size - 1);
        (value / PAGE_RELATIVE_EXTENT * f64::from(size)).round().clamp(0.0, max) as u32
    };

    for coordinates in boxes {
        let relative = coordinates.to_page_relative();
        let xs = relative.points.map(|p| p.0);
        let ys = relative.points.map(|p| p.1);
        let x0 = to_pixel(xs.iter().copied().fold(f64::INFINITY, f64::min), width);
        let x1 = to_pixel(xs.iter().copied().fold(f64::NEG_INFINITY, f64::max), width);
        let y0 = to_pixel(ys.iter().copied().fold(f64::INFINITY, f64::min), height);
        let y1 = to_pixel(ys.iter().copied().fold(f64::NEG_INFINITY, f64::max), height);

        for d in 0..HIGHLIGHT_THICKNESS {
            let (top, bottom) = ((y0 + d).min(y1), y1.saturating_sub(d).max(y0));
            let (left, right) = ((x0 + d).min(x1), x1.saturating_sub(d).max(x0));
            for x in x0..=x1 {
                page.put_pixel(x, top, HIGHLIGHT_COLOR);
                page.put_pixel(x, bottom, HIGHLIGHT_COLOR);
            }
            for y in y0..=y1 {
                page.put_pixel(left, y, HIGHLIGHT_COLOR);
                page.put_pixel(right, y, HIGHLIGHT_COLOR);
            }
        }
    }
}

/// Decode the page, draw the boxes and re-encode as JPEG. Bytes that do not
/// decode are passed through untouched.
fn render_page(path: &Path, bytes: Vec<u8>, highlights: &[Coordinates]) -> Vec<u8> {
    let mut page = match image::load_from_memory(&bytes) {
        Ok(decoded) => decoded.to_rgb8(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Undecodable page image, serving as is: {}", e);
            return bytes;
        }
    };
    draw_highlights(&mut page, highlights);

    let mut encoded = Vec::new();
    let written = DynamicImage::ImageRgb8(page).write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg);
    match written {
        Ok(()) => encoded,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to encode highlighted page: {}", e);
            bytes
        }
    }
}

impl ImageProcessor for PageImageProcessor {
    fn annotate(&self, docs: &[RetrievalResult], answer: &str) -> SupportingImages {
        let answer_words = significant_words(answer);
        let pages: Vec<(RetrievalResult, PathBuf)> = docs
            .iter()
            .map(|doc| {
                let filename = doc.filename().unwrap_or_default();
                (doc.clone(), self.page_image_path(filename, doc.chunk.page_number))
            })
            .collect();

        Box::new(pages.into_iter().map(move |(doc, path)| {
            let highlights = highlights_for(&doc, &answer_words);
            let image = match std::fs::read(&path) {
                Ok(bytes) => Some(render_page(&path, bytes, &highlights)),
                Err(e) => {
                    tracing::debug!(path = %path.display(), "No page image: {}", e);
                    None
                }
            };
            SupportingImage {
                highlights,
                caption: doc.chunk.text.clone(),
                filename: doc.filename().unwrap_or_default().to_string(),
                page_number: doc.chunk.page_number,
                image,
            }
        }))
    }
}
