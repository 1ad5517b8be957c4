use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use webrag_core::error::{Error, Result};
use webrag_core::types::Document;

use crate::html::html_to_text;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];
const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

/// Load every `.txt`, `.md`, `.html` and `.htm` file under `root`, in sorted
/// path order. The file path is the document's `source_uri`.
pub fn load_dir(root: &Path) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(Error::ingestion(format!("{} is not a directory", root.display())));
    }
    let files = list_files(root);
    if files.is_empty() {
        info!("No text or HTML files found under {}.", root.display());
    }
    let mut docs = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        info!("Reading file {}/{}: {}", i + 1, files.len(), path.display());
        docs.push(load_file(path)?);
    }
    Ok(docs)
}

pub fn load_file(path: &Path) -> Result<Document> {
    let content = read_file_content(path)?;
    let raw_text =
        if has_extension(path, HTML_EXTENSIONS) { html_to_text(&content) } else { content };
    Ok(Document::new(path.to_string_lossy(), raw_text))
}

fn read_file_content(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .map_err(|e| Error::ingestion(format!("read {}: {e}", path.display())))?;
    Ok(match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| has_extension(p, TEXT_EXTENSIONS) || has_extension(p, HTML_EXTENSIONS))
        .collect();
    files.sort();
    files
}
