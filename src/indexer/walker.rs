use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// PDFs under `dir`, sorted by path. A missing directory yields nothing.
pub fn walk_pdfs(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        tracing::warn!("PDF folder not found: {}", dir.display());
        return Vec::new();
    }

    let mut pdfs: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| {
            // Skip hidden directories (.git, .cache, ...)
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_pdf(path))
        .collect();

    pdfs.sort();
    pdfs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_finds_nested_pdfs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("claims")).unwrap();
        std::fs::create_dir_all(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("claims/a.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join(".cache/c.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let pdfs = walk_pdfs(dir.path());
        assert_eq!(pdfs, vec![dir.path().join("b.pdf"), dir.path().join("claims/a.PDF")]);
    }

    #[test]
    fn test_missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(walk_pdfs(&dir.path().join("nope")).is_empty());
    }
}
