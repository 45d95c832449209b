//! File text extraction.
//!
//! [`FileTextExtractor`] picks a decoder from the file extension: PDFs go
//! through `pdf-extract`, `.txt` files are read as UTF-8. Anything else is
//! [`ExtractError::UnsupportedContentType`].
//!
//! Uploads that are checked without being stored go through
//! [`extract_codes_from_bytes`] and [`check_codes_in_bytes`], which infer
//! the content type from the client's file name.

use std::path::Path;

use anyhow::Result;

use kino_core::extract::{
    extract_codes_from_pdf, extract_codes_with_pattern, search_codes_in_text, CodeCheck,
    CodePattern, ExtractError, PdfExtraction, TextExtractor,
};
use kino_core::text::parse_code_list;

use crate::config::Config;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Content type inferred from a file extension, if supported.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" => Some(MIME_TEXT),
        _ => None,
    }
}

/// Decode raw bytes of the given content type into text.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
        MIME_TEXT => Ok(String::from_utf8_lossy(bytes).into_owned()),
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

/// Text of an in-memory file, typed by the extension of `file_name`.
/// Whitespace-only text is [`ExtractError::Empty`].
pub fn text_from_bytes(file_name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let content_type = content_type_for(Path::new(file_name))
        .ok_or_else(|| ExtractError::UnsupportedContentType(file_name.to_string()))?;
    let text = extract_text(bytes, content_type)?;
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}

/// Run the code pattern over an in-memory file.
pub fn extract_codes_from_bytes(
    file_name: &str,
    bytes: &[u8],
    pattern: &CodePattern,
) -> Result<PdfExtraction, ExtractError> {
    let text = text_from_bytes(file_name, bytes)?;
    let codes = extract_codes_with_pattern(&text, pattern)?;
    Ok(PdfExtraction { text, codes })
}

/// Check which of `codes` occur in an in-memory file.
pub fn check_codes_in_bytes<C: AsRef<str>>(
    file_name: &str,
    bytes: &[u8],
    codes: &[C],
) -> Result<CodeCheck, ExtractError> {
    let text = text_from_bytes(file_name, bytes)?;
    Ok(search_codes_in_text(&text, codes))
}

/// Extension-dispatching extractor used by ingestion and PDF search.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTextExtractor;

impl TextExtractor for FileTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let content_type = content_type_for(path).ok_or_else(|| {
            ExtractError::UnsupportedContentType(path.display().to_string())
        })?;
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        extract_text(&bytes, content_type)
    }
}

/// `kino extract-codes`: print the text size and the codes a pattern finds
/// in a file, without storing anything.
pub fn run_extract_codes(
    config: &Config,
    file: &Path,
    prefix: Option<String>,
    terminator: Option<String>,
) -> Result<()> {
    let pattern = CodePattern {
        prefix: prefix.unwrap_or_else(|| config.extraction.pattern.prefix.clone()),
        terminator: terminator.unwrap_or_else(|| config.extraction.pattern.terminator.clone()),
        ..config.extraction.pattern.clone()
    };
    let extraction = extract_codes_from_pdf(&FileTextExtractor, file, &pattern)?;

    println!(
        "{}: {} characters, {} codes",
        file.display(),
        extraction.text.chars().count(),
        extraction.codes.len()
    );
    for code in &extraction.codes {
        println!("  {}", code);
    }
    Ok(())
}

/// `kino check-codes`: report which codes of a list occur in a file.
pub fn run_check_codes(file: &Path, codes: &str) -> Result<()> {
    let codes = parse_code_list(codes);
    if codes.is_empty() {
        anyhow::bail!("no codes provided");
    }
    let bytes = std::fs::read(file)
        .map_err(|source| ExtractError::Io {
            path: file.to_path_buf(),
            source,
        })?;
    let name = file.to_string_lossy();
    let check = check_codes_in_bytes(&name, &bytes, &codes)?;

    println!(
        "{}: {} of {} codes found",
        file.display(),
        check.total_found,
        check.total_searched
    );
    for code in &check.found {
        println!("  found      {}", code);
    }
    for code in &check.not_found {
        println!("  not found  {}", code);
    }
    Ok(())
}
