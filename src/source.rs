use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

const FORM_FEED: char = '\u{000C}';
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "txt"];

/// Per-page text of one document, in page order.
///
/// `None` means the page had no extractable text and should be skipped.
pub trait PageSource {
    fn pages(&self) -> Box<dyn Iterator<Item = Option<String>> + '_>;
}

pub struct PdfPages {
    doc: lopdf::Document,
}

impl PdfPages {
    pub fn open(path: &Path) -> Result<Self> {
        let doc = lopdf::Document::load(path).map_err(|source| PipelineError::Pdf {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(PdfPages { doc })
    }
}

impl PageSource for PdfPages {
    fn pages(&self) -> Box<dyn Iterator<Item = Option<String>> + '_> {
        Box::new(self.doc.get_pages().into_keys().map(move |number| {
            match self.doc.extract_text(&[number]) {
                Ok(text) => non_blank(text),
                Err(e) => {
                    warn!(page = number, error = %e, "no text extracted from page");
                    None
                }
            }
        }))
    }
}

/// Plain-text diary; form feeds separate pages.
pub struct TextPages {
    text: String,
}

impl TextPages {
    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(TextPages { text })
    }

    #[cfg(test)]
    pub fn from_text(text: impl Into<String>) -> Self {
        TextPages { text: text.into() }
    }
}

impl PageSource for TextPages {
    fn pages(&self) -> Box<dyn Iterator<Item = Option<String>> + '_> {
        Box::new(
            self.text
                .split(FORM_FEED)
                .map(|page| non_blank(page.to_string())),
        )
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn open_document(path: &Path) -> Result<Box<dyn PageSource>> {
    match extension(path).as_deref() {
        Some("pdf") => Ok(Box::new(PdfPages::open(path)?)),
        _ => Ok(Box::new(TextPages::open(path)?)),
    }
}

/// Participant sub-directories of `main_folder` as `(participant_id, path)`,
/// sorted by name. The directory name is used verbatim as the id.
pub fn participant_folders(main_folder: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(main_folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        folders.push((id, entry.path()));
    }
    folders.sort();
    Ok(folders)
}

/// Documents inside one participant folder, sorted by file name so the
/// line stream (and therefore block boundaries) is reproducible.
pub fn document_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match extension(&path) {
            Some(ext) if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) => files.push(path),
            _ => debug!(path = %path.display(), "skipping non-document file"),
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Every text line of every page of one document, in page order.
pub fn document_lines(path: &Path) -> Result<Vec<String>> {
    let doc = open_document(path)?;
    let mut lines = Vec::new();
    let mut pages = 0usize;
    let mut skipped = 0usize;
    for page in doc.pages() {
        pages += 1;
        match page {
            Some(text) => lines.extend(text.lines().map(str::to_string)),
            None => skipped += 1,
        }
    }
    debug!(path = %path.display(), pages, skipped, "read document");
    Ok(lines)
}
