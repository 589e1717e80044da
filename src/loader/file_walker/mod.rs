//! Corpus traversal: turns a namespace's raw directory into documents

use super::pdf_extractor::extract_pdf_pages;
use super::pptx_extractor::extract_pptx_slides;
use crate::error::{IngestError, RagError};
use crate::types::{Document, DocumentMetadata};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Lower-cased file extensions the loader understands
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "pptx", "md", "markdown"];

pub struct FileWalker {
    pub(crate) root: PathBuf,
}

impl FileWalker {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Load every supported file under the root into documents
    ///
    /// PDFs yield one document per page, decks one per slide and Markdown one
    /// per file. Files that fail to parse are logged and skipped; if nothing
    /// at all yields text the walk fails with [`IngestError::NoDocuments`].
    pub fn walk(&self) -> Result<Vec<Document>, RagError> {
        if !self.root.is_dir() {
            tracing::warn!("Corpus directory does not exist: {:?}", self.root);
            return Err(self.no_documents());
        }

        let mut documents = Vec::new();
        for path in self.candidate_files() {
            let relative = relative_path(&self.root, &path);
            match load_file(&path, &relative) {
                Ok(docs) if docs.is_empty() => {
                    tracing::debug!("No text in {}, skipping", relative);
                }
                Ok(docs) => {
                    tracing::debug!("Loaded {} document(s) from {}", docs.len(), relative);
                    documents.extend(docs);
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {:#}", relative, e);
                }
            }
        }

        if documents.is_empty() {
            return Err(self.no_documents());
        }

        // Stable: pages and slides keep their in-file order
        documents.sort_by(|a, b| a.metadata.file_path.cmp(&b.metadata.file_path));

        tracing::info!(
            "Loaded {} documents from {:?}",
            documents.len(),
            self.root
        );
        Ok(documents)
    }

    /// Number of supported files under the root (zero if it does not exist)
    pub fn count_files(&self) -> usize {
        if !self.root.is_dir() {
            return 0;
        }
        self.candidate_files().len()
    }

    /// Supported, non-hidden files in file-name order
    fn candidate_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Failed to read directory entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter(|e| file_kind(e.path()).is_some())
            .map(DirEntry::into_path)
            .collect()
    }

    fn no_documents(&self) -> RagError {
        IngestError::NoDocuments(self.root.display().to_string()).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Pdf,
    Pptx,
    Markdown,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "pdf" => Some(FileKind::Pdf),
        "pptx" => Some(FileKind::Pptx),
        "md" | "markdown" => Some(FileKind::Markdown),
        _ => None,
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Path relative to the corpus root, always `/`-separated
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn load_file(path: &Path, relative: &str) -> Result<Vec<Document>> {
    let base = DocumentMetadata {
        source: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative.to_string()),
        file_path: relative.to_string(),
        ..Default::default()
    };

    let Some(kind) = file_kind(path) else {
        return Ok(Vec::new());
    };

    let docs = match kind {
        FileKind::Pdf => extract_pdf_pages(path)?
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| {
                let page = i + 1;
                Document {
                    id: format!("{}#page={}", relative, page),
                    text,
                    metadata: DocumentMetadata {
                        page: Some(page.to_string()),
                        ..base.clone()
                    },
                }
            })
            .collect(),
        FileKind::Pptx => extract_pptx_slides(path)?
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(slide, text)| Document {
                id: format!("{}#slide={}", relative, slide),
                text,
                metadata: DocumentMetadata {
                    slide: Some(slide),
                    ..base.clone()
                },
            })
            .collect(),
        FileKind::Markdown => {
            let bytes = fs::read(path).context("Failed to read markdown file")?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![Document {
                    id: relative.to_string(),
                    metadata: DocumentMetadata {
                        section: first_heading(&text),
                        ..base
                    },
                    text,
                }]
            }
        }
    };

    Ok(docs)
}

/// First level-1 or level-2 ATX heading of a Markdown text
fn first_heading(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let line = line.trim_start();
        let title = line
            .strip_prefix("# ")
            .or_else(|| line.strip_prefix("## "))?
            .trim()
            .trim_end_matches('#')
            .trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}
