use std::path::Path;
use std::sync::Arc;

use lopdf::Document;
use pdfpaint::{PageContent, page_count};

use crate::page_range::parse_page_range;

/// Exit code for files that cannot be opened, parsed or tokenized.
pub const EXIT_OPEN: i32 = 1;
/// Exit code for an invalid `--pages` value.
pub const EXIT_PAGES: i32 = 2;
/// Exit code for a fatal interpretation condition.
pub const EXIT_FATAL: i32 = 3;

/// Open a PDF file with user-friendly error messages.
pub fn open_pdf(file: &Path) -> Result<Arc<Document>, i32> {
    if !file.exists() {
        eprintln!("Error: file not found: {}", file.display());
        return Err(EXIT_OPEN);
    }

    Document::load(file).map(Arc::new).map_err(|e| {
        eprintln!("Error: failed to open PDF: {e}");
        EXIT_OPEN
    })
}

/// Resolve an optional page range into 1-based page numbers. `None`
/// selects every page.
pub fn resolve_pages(pages: Option<&str>, doc: &Document) -> Result<Vec<u32>, i32> {
    let count = page_count(doc);
    match pages {
        Some(range) => parse_page_range(range, count).map_err(|e| {
            eprintln!("Error: {e}");
            EXIT_PAGES
        }),
        None => Ok((1..=count as u32).collect()),
    }
}

/// Load one page's operations and resources.
pub fn load_page(doc: &Arc<Document>, page: u32) -> Result<PageContent, i32> {
    PageContent::load(Arc::clone(doc), page).map_err(|e| {
        eprintln!("Error reading page {page}: {e}");
        EXIT_OPEN
    })
}
