//! Source discovery and plain-text extraction.

use std::fs;
use std::path::{Path, PathBuf};

use ragline_core::{AppError, AppResult};
use walkdir::WalkDir;

use crate::types::Document;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
    Pdf,
}

impl ContentType {
    /// Detect content type from file extension. Unsupported extensions yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "txt" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Yields plain text for a source path.
pub trait DocumentLoader: Send + Sync {
    /// Extract text from `path`. Unreadable or binary input yields an empty string.
    fn load(&self, path: &Path) -> String;

    /// Expand files and directories into the ordered list of loadable sources,
    /// each paired with its source name.
    fn discover(&self, paths: &[PathBuf]) -> Vec<(String, PathBuf)>;
}

/// Filesystem loader for `.txt`, `.md`/`.markdown`, `.html`/`.htm` and `.pdf` files.
#[derive(Debug, Clone, Default)]
pub struct FsLoader;

impl FsLoader {
    pub fn new() -> Self {
        Self
    }

    /// Discover and load every source under `paths`.
    pub fn load_documents(&self, paths: &[PathBuf]) -> Vec<Document> {
        self.discover(paths)
            .into_iter()
            .map(|(name, path)| Document::new(name, self.load(&path)))
            .collect()
    }
}

impl FsLoader {
    fn read_text(&self, path: &Path, content_type: ContentType) -> AppResult<String> {
        let raw = fs::read(path).map_err(|e| AppError::Load(format!("{:?}: {}", path, e)))?;

        if content_type == ContentType::Pdf {
            return extract_pdf_text(&raw)
                .map_err(|reason| AppError::Load(format!("{:?}: {}", path, reason)));
        }

        if raw.contains(&0) {
            return Err(AppError::Load(format!("{:?}: likely a binary file", path)));
        }

        let text = String::from_utf8(raw)
            .map_err(|_| AppError::Load(format!("{:?}: not valid UTF-8", path)))?;

        Ok(match content_type {
            ContentType::Markdown => clean_markdown(&text),
            ContentType::Html => clean_html(&text),
            ContentType::PlainText | ContentType::Pdf => normalize_lines(&text),
        })
    }
}

impl DocumentLoader for FsLoader {
    fn load(&self, path: &Path) -> String {
        let Some(content_type) = ContentType::from_path(path) else {
            tracing::warn!("Unsupported file type: {:?}", path);
            return String::new();
        };

        match self.read_text(path, content_type) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping source: {}", e);
                String::new()
            }
        }
    }

    fn discover(&self, paths: &[PathBuf]) -> Vec<(String, PathBuf)> {
        let mut found = Vec::new();

        for root in paths {
            if root.is_file() {
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                found.push((name, root.clone()));
                continue;
            }

            if !root.is_dir() {
                tracing::warn!("Source path does not exist: {:?}", root);
                continue;
            }

            let mut entries: Vec<PathBuf> = WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| ContentType::from_path(p).is_some())
                .collect();
            entries.sort();

            for path in entries {
                let name = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                found.push((name, path));
            }
        }

        tracing::debug!("Discovered {} sources", found.len());
        found
    }
}

/// Text of every page, whitespace runs collapsed to single spaces.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    // The parser panics on some malformed files
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| "PDF parser aborted".to_string())?;
    extracted
        .map(|text| collapse_whitespace(&text))
        .map_err(|e| e.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim every line and drop empty ones.
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Clean markdown by removing header markers, fences and rules.
fn clean_markdown(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .map(|line| line.trim_start_matches('#').trim())
        .filter(|line| {
            !(line.starts_with("---") || line.starts_with("```") || line.starts_with("~~~"))
        })
        .collect();

    normalize_lines(&kept.join("\n"))
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "table", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article", "header", "footer", "blockquote", "pre",
];

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack.len() >= prefix.len()
        && haystack.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Strip tags, script/style blocks and common entities.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(lt) = rest.find('<') {
        result.push_str(&rest[..lt]);
        rest = &rest[lt..];

        // Skip whole script/style elements, contents included
        let mut skipped = false;
        for tag in ["script", "style"] {
            if starts_with_ignore_case(rest, &format!("<{}", tag)) {
                let close = format!("</{}", tag);
                let end = (0..rest.len())
                    .filter(|i| rest.is_char_boundary(*i))
                    .find(|i| starts_with_ignore_case(&rest[*i..], &close));
                rest = match end.and_then(|i| rest[i..].find('>').map(|gt| i + gt + 1)) {
                    Some(after) => &rest[after..],
                    None => "",
                };
                skipped = true;
                break;
            }
        }
        if skipped {
            continue;
        }

        let Some(gt) = rest.find('>') else {
            // Unterminated tag: drop the remainder
            rest = "";
            break;
        };

        let name: String = rest[1..gt]
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if BLOCK_TAGS.contains(&name.as_str()) {
            result.push('\n');
        }
        rest = &rest[gt + 1..];
    }
    result.push_str(rest);

    normalize_lines(&decode_entities(&result))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
