use anyhow::{Context, Result};
use std::path::Path;

/// Extract the text of every page of a PDF, in page order
///
/// Page `i` of the result is page `i + 1` of the document. Pages without
/// extractable text come back as empty strings so numbering stays aligned.
pub fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).context("Failed to read PDF file")?;
    // pdf-extract panics on some malformed inputs instead of returning an error
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .map_err(|_| anyhow::anyhow!("PDF parser panicked"))?
        .context("Failed to extract text from PDF")?;

    Ok(pages.iter().map(|page| normalize_page_text(page)).collect())
}

/// Trim each line and collapse runs of blank lines into a single paragraph break
fn normalize_page_text(text: &str) -> String {
    let mut out = String::new();
    let mut pending_break = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            pending_break = !out.is_empty();
            continue;
        }
        if pending_break {
            out.push_str("\n\n");
            pending_break = false;
        } else if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(trimmed);
    }

    out
}
