pub mod annotation;
pub mod sidebar;

pub use annotation::{remove_annotations, DEFAULT_ANNOTATION_THRESHOLD};
pub use sidebar::remove_sidebars;
