//! Document loading and chunking
//!
//! Walks a namespace's raw corpus, extracts text from PDF, PowerPoint and Markdown
//! files, and splits the resulting documents into overlapping chunks for embedding.

mod chunker;
mod file_walker;
mod pdf_extractor;
mod pptx_extractor;

pub use chunker::SentenceChunker;
pub use file_walker::{FileWalker, SUPPORTED_EXTENSIONS};
pub use pdf_extractor::extract_pdf_pages;
pub use pptx_extractor::extract_pptx_slides;
