//! PDF text extraction.
//!
//! Thin wrapper over `lopdf`. Extraction failures on a single page yield
//! an empty string for that page rather than an error, so a partially
//! corrupt document still contributes whatever text it has.

use std::path::Path;

use crate::error::QaError;

/// Extracts per-page text from a PDF, up to `max_pages` pages.
///
/// Pages that fail to extract contribute an empty string.
///
/// # Errors
///
/// Returns [`QaError::Pdf`] only when the document itself cannot be
/// opened or parsed.
pub fn extract_pages(path: &Path, max_pages: usize) -> Result<Vec<String>, QaError> {
    let doc = lopdf::Document::load(path).map_err(|e| QaError::Pdf {
        message: format!("failed to load {}: {e}", path.display()),
    })?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().take(max_pages).collect();

    let texts = page_numbers
        .iter()
        .map(|&n| doc.extract_text(&[n]).unwrap_or_default())
        .collect();

    Ok(texts)
}

/// Extracts text from a PDF as a single string, pages separated by
/// double newlines.
///
/// # Errors
///
/// Returns [`QaError::Pdf`] when the document cannot be opened.
pub fn extract_text(path: &Path, max_pages: usize) -> Result<String, QaError> {
    Ok(extract_pages(path, max_pages)?.join("\n\n"))
}
