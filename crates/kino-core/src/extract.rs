//! Code extraction from document text.
//!
//! Text extraction itself sits behind the [`TextExtractor`] trait; the
//! application crate provides the PDF implementation. Everything in this
//! module works on already-extracted text.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::{clean_codes, dedup, find_ignore_case};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no text could be extracted (OCR may be required)")]
    Empty,
    #[error("invalid code pattern: {0}")]
    InvalidPattern(String),
}

/// Turns a stored file into plain text.
///
/// Implementations are synchronous; extraction is CPU-bound and runs to
/// completion inside the calling request.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// User-configurable code pattern.
///
/// With an empty `prefix`, codes are standalone alphanumeric runs. With a
/// prefix (e.g. `"Ref:"`), a code is the run of characters that follows
/// it, stopping at whitespace or any character of `terminator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePattern {
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_terminator")]
    pub terminator: String,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_terminator() -> String {
    "/".to_string()
}
fn default_min_length() -> usize {
    4
}
fn default_max_length() -> usize {
    50
}

impl Default for CodePattern {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            terminator: default_terminator(),
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

impl CodePattern {
    fn compile(&self) -> Result<Regex, ExtractError> {
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(ExtractError::InvalidPattern(format!(
                "length bounds {}..{} are invalid",
                self.min_length, self.max_length
            )));
        }
        let (min, max) = (self.min_length, self.max_length);
        let source = if self.prefix.is_empty() {
            format!(r"(?i)\b([A-Z0-9]{{{min},{max}}})\b")
        } else {
            let stop: String = self
                .terminator
                .chars()
                .map(|c| regex::escape(&c.to_string()))
                .collect();
            format!(
                r"(?i){}\s*([^{}\s]{{{min},{max}}})",
                regex::escape(&self.prefix),
                stop
            )
        };
        Regex::new(&source).map_err(|e| ExtractError::InvalidPattern(e.to_string()))
    }
}

/// Extract the unique codes matching `pattern`, in order of first appearance.
pub fn extract_codes_with_pattern(
    text: &str,
    pattern: &CodePattern,
) -> Result<Vec<String>, ExtractError> {
    let re = pattern.compile()?;
    let codes = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|c| {
            let len = c.chars().count();
            len >= pattern.min_length && len <= pattern.max_length
        });
    Ok(dedup(codes))
}

/// Text and detected codes for one file.
#[derive(Debug, Clone, Serialize)]
pub struct PdfExtraction {
    pub text: String,
    pub codes: Vec<String>,
}

/// Extract a file's text and run the code pattern over it.
///
/// Whitespace-only text is reported as [`ExtractError::Empty`].
pub fn extract_codes_from_pdf(
    extractor: &dyn TextExtractor,
    path: &Path,
    pattern: &CodePattern,
) -> Result<PdfExtraction, ExtractError> {
    let text = extractor.extract(path)?;
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    let codes = extract_codes_with_pattern(&text, pattern)?;
    Ok(PdfExtraction { text, codes })
}

/// Result of checking a list of codes against one text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodeCheck {
    pub found: Vec<String>,
    pub not_found: Vec<String>,
    pub total_searched: usize,
    pub total_found: usize,
}

/// Check which of `codes` occur (case-insensitively) in `text`.
pub fn search_codes_in_text<C: AsRef<str>>(text: &str, codes: &[C]) -> CodeCheck {
    let codes = clean_codes(codes);
    let (found, not_found): (Vec<String>, Vec<String>) = codes
        .iter()
        .cloned()
        .partition(|code| find_ignore_case(text, code).is_some());
    CodeCheck {
        total_searched: codes.len(),
        total_found: found.len(),
        found,
        not_found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "MANIFIESTO 2024\nRef: AB12345/ línea 1\nRef:CD67890 / línea 2\nref: EF1 corto\nContenedor MSKU1234567 y MSKU1234567";

    #[test]
    fn prefix_pattern_stops_at_terminator() {
        let pattern = CodePattern {
            prefix: "Ref:".into(),
            ..CodePattern::default()
        };
        let codes = extract_codes_with_pattern(MANIFEST, &pattern).unwrap();
        assert_eq!(codes, vec!["AB12345", "CD67890"]);
    }

    #[test]
    fn empty_terminator_stops_at_whitespace_only() {
        let pattern = CodePattern {
            prefix: "Ref:".into(),
            terminator: String::new(),
            ..CodePattern::default()
        };
        let codes = extract_codes_with_pattern("Ref: AB12/34 next", &pattern).unwrap();
        assert_eq!(codes, vec!["AB12/34"]);
    }

    #[test]
    fn no_prefix_finds_alphanumeric_runs_once() {
        let pattern = CodePattern {
            min_length: 11,
            ..CodePattern::default()
        };
        let codes = extract_codes_with_pattern(MANIFEST, &pattern).unwrap();
        assert_eq!(codes, vec!["MSKU1234567"]);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let pattern = CodePattern {
            min_length: 9,
            max_length: 3,
            ..CodePattern::default()
        };
        let err = extract_codes_with_pattern("x", &pattern).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPattern(_)));
    }

    #[test]
    fn regex_metacharacters_in_prefix_are_literal() {
        let pattern = CodePattern {
            prefix: "N.(ref)".into(),
            terminator: "]".into(),
            ..CodePattern::default()
        };
        let codes = extract_codes_with_pattern("N.(ref) QWER99]tail NX(ref) ZZZZ", &pattern).unwrap();
        assert_eq!(codes, vec!["QWER99"]);
    }

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn blank_extraction_is_an_error() {
        let err = extract_codes_from_pdf(&FixedText("  \n "), Path::new("x.pdf"), &CodePattern::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Empty));
    }

    #[test]
    fn extraction_returns_text_and_codes() {
        let out = extract_codes_from_pdf(
            &FixedText("Ref: ZX9876/ end"),
            Path::new("x.pdf"),
            &CodePattern {
                prefix: "Ref:".into(),
                ..CodePattern::default()
            },
        )
        .unwrap();
        assert_eq!(out.codes, vec!["ZX9876"]);
        assert!(out.text.contains("ZX9876"));
    }

    #[test]
    fn code_check_partitions_found_and_missing() {
        let check = search_codes_in_text("Lote abc-1 y XYZ-2", &["ABC-1", " ", "xyz-2", "nope"]);
        assert_eq!(check.found, vec!["ABC-1", "xyz-2"]);
        assert_eq!(check.not_found, vec!["nope"]);
        assert_eq!(check.total_searched, 3);
        assert_eq!(check.total_found, 2);
    }
}
