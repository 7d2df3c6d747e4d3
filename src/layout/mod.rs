//! Layout elements produced by the external PDF layout parser.
//!
//! An element is one detected text unit on a page: its text, a category tag
//! and a four-point bounding box. Filtering works on page-relative
//! coordinates, see [`Coordinates::to_page_relative`].

pub mod parser;

use serde::{Deserialize, Serialize};

pub use parser::{JsonLayoutParser, LayoutParser};

/// Both axes of the page-relative system span `0..=PAGE_RELATIVE_EXTENT`.
pub const PAGE_RELATIVE_EXTENT: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementCategory {
    UncategorizedText,
    Title,
    NarrativeText,
    ListItem,
    Header,
    Footer,
    PageNumber,
    Table,
    FigureCaption,
    Image,
    Formula,
    Address,
    EmailAddress,
    Other(String),
}

impl ElementCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::UncategorizedText => "UncategorizedText",
            Self::Title => "Title",
            Self::NarrativeText => "NarrativeText",
            Self::ListItem => "ListItem",
            Self::Header => "Header",
            Self::Footer => "Footer",
            Self::PageNumber => "PageNumber",
            Self::Table => "Table",
            Self::FigureCaption => "FigureCaption",
            Self::Image => "Image",
            Self::Formula => "Formula",
            Self::Address => "Address",
            Self::EmailAddress => "EmailAddress",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for ElementCategory {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "UncategorizedText" => Self::UncategorizedText,
            "Title" => Self::Title,
            "NarrativeText" => Self::NarrativeText,
            "ListItem" => Self::ListItem,
            "Header" => Self::Header,
            "Footer" => Self::Footer,
            "PageNumber" => Self::PageNumber,
            "Table" => Self::Table,
            "FigureCaption" => Self::FigureCaption,
            "Image" => Self::Image,
            "Formula" => Self::Formula,
            "Address" => Self::Address,
            "EmailAddress" => Self::EmailAddress,
            _ => Self::Other(tag),
        }
    }
}

impl From<ElementCategory> for String {
    fn from(category: ElementCategory) -> Self {
        category.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Rendered image pixels, origin top-left.
    PixelSpace,
    /// PDF points, origin bottom-left.
    PointSpace,
    /// Unit square, origin bottom-left.
    RelativeCoordinateSystem,
    /// `PAGE_RELATIVE_EXTENT` square, origin top-left.
    PageRelative,
}

impl CoordinateSystem {
    fn y_points_down(self) -> bool {
        matches!(self, Self::PixelSpace | Self::PageRelative)
    }
}

/// Bounding box corners in the order top-left, bottom-left, bottom-right,
/// top-right (as seen on screen).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub points: [(f64, f64); 4],
    pub system: CoordinateSystem,
    pub layout_width: f64,
    pub layout_height: f64,
}

impl Coordinates {
    /// Axis-aligned box spanning `(x0, y0)..(x1, y1)`.
    pub fn rect(
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        system: CoordinateSystem,
        layout_width: f64,
        layout_height: f64,
    ) -> Self {
        Self {
            points: [(x0, y0), (x0, y1), (x1, y1), (x1, y0)],
            system,
            layout_width,
            layout_height,
        }
    }

    /// Box already in the page-relative system.
    pub fn page_relative(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::rect(
            x0, y0, x1, y1,
            CoordinateSystem::PageRelative, PAGE_RELATIVE_EXTENT, PAGE_RELATIVE_EXTENT,
        )
    }

    pub fn left_x(&self) -> f64 {
        self.points[0].0
    }

    pub fn right_x(&self) -> f64 {
        self.points[2].0
    }

    pub fn to_page_relative(&self) -> Self {
        if self.system == CoordinateSystem::PageRelative {
            return self.clone();
        }
        let flip = self.system.y_points_down() != CoordinateSystem::PageRelative.y_points_down();
        let points = self.points.map(|(x, y)| {
            let y = if flip { self.layout_height - y } else { y };
            (
                x * PAGE_RELATIVE_EXTENT / self.layout_width,
                y * PAGE_RELATIVE_EXTENT / self.layout_height,
            )
        });
        Self {
            points,
            system: CoordinateSystem::PageRelative,
            layout_width: PAGE_RELATIVE_EXTENT,
            layout_height: PAGE_RELATIVE_EXTENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMetadata {
    #[serde(default)]
    pub filename: String,
    pub page_number: u32,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    #[serde(rename = "element_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub category: ElementCategory,
    pub text: String,
    pub metadata: ElementMetadata,
    /// Position within the page after filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<usize>,
}

impl LayoutElement {
    pub fn new(
        id: impl Into<String>,
        category: ElementCategory,
        text: impl Into<String>,
        page_number: u32,
        coordinates: Coordinates,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            text: text.into(),
            metadata: ElementMetadata {
                filename: String::new(),
                page_number,
                coordinates,
            },
            sequence: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.metadata.filename = filename.into();
        self
    }

    pub fn page_number(&self) -> u32 {
        self.metadata.page_number
    }

    pub fn filename(&self) -> &str {
        &self.metadata.filename
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category == ElementCategory::UncategorizedText
    }

    /// Integer horizontal span used to group sidebar candidates.
    pub fn horizontal_span(&self) -> (i64, i64) {
        let coordinates = &self.metadata.coordinates;
        (
            coordinates.left_x().round() as i64,
            coordinates.right_x().round() as i64,
        )
    }

    pub fn normalize_coordinates(&mut self) {
        self.metadata.coordinates = self.metadata.coordinates.to_page_relative();
    }
}
