//! Text helpers shared by the search and extraction code.
//!
//! Matching is plain substring containment with per-character case
//! folding. Positions are byte ranges into the *original* text, so a
//! caller can re-slice exactly what was observed in the source.

use std::ops::Range;

/// Split a user-supplied code list on newlines or commas, trimming each
/// entry and dropping empties. Order and duplicates are preserved.
pub fn parse_code_list(input: &str) -> Vec<String> {
    input
        .split(['\n', ','])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trim every code and drop the ones that end up empty.
pub fn clean_codes<C: AsRef<str>>(codes: &[C]) -> Vec<String> {
    codes
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Upper-case every code and drop duplicates, keeping first-seen order.
pub fn dedup_upper<C: AsRef<str>>(codes: &[C]) -> Vec<String> {
    dedup(codes.iter().map(|c| c.as_ref().to_uppercase()))
}

/// Drop duplicates, keeping first-seen order.
pub fn dedup<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Byte range of the first case-insensitive occurrence of `needle`.
///
/// An empty needle never matches.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<Range<usize>> {
    find_ignore_case_from(haystack, needle, 0)
}

fn find_ignore_case_from(haystack: &str, needle: &str, from: usize) -> Option<Range<usize>> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    let tail = &haystack[from..];
    tail.char_indices().find_map(|(offset, _)| {
        match_len_at(&tail[offset..], needle).map(|len| {
            let start = from + offset;
            start..start + len
        })
    })
}

/// Byte length of the prefix of `text` that case-insensitively equals `needle`.
fn match_len_at(text: &str, needle: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    for n in needle.chars() {
        let (_, t) = chars.next()?;
        if !chars_eq_ignore_case(t, n) {
            return None;
        }
    }
    Some(chars.next().map(|(i, _)| i).unwrap_or(text.len()))
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Number of non-overlapping case-insensitive occurrences of `needle`.
pub fn count_ignore_case(haystack: &str, needle: &str) -> usize {
    let mut count = 0;
    let mut pos = 0;
    while let Some(range) = find_ignore_case_from(haystack, needle, pos) {
        count += 1;
        pos = range.end;
    }
    count
}

/// Excerpt of `text` around `range` with up to `context` characters on each
/// side. Whitespace runs collapse to one space; `...` marks a clipped side.
pub fn context_snippet(text: &str, range: Range<usize>, context: usize) -> String {
    let start = text[..range.start]
        .char_indices()
        .rev()
        .take(context)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(range.start);
    let end = text[range.end..]
        .char_indices()
        .nth(context)
        .map(|(i, _)| range.end + i)
        .unwrap_or(text.len());

    let mut snippet = collapse_whitespace(&text[start..end]);
    if start > 0 {
        snippet.insert_str(0, "...");
    }
    if end < text.len() {
        snippet.push_str("...");
    }
    snippet
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_code_list_splits_newlines_and_commas() {
        let codes = parse_code_list(" ABC-1\r\nxyz-2 ,, \n\n QQQ ,");
        assert_eq!(codes, vec!["ABC-1", "xyz-2", "QQQ"]);
    }

    #[test]
    fn clean_codes_drops_blank_entries() {
        let codes = clean_codes(&["  a ", "", "   ", "b"]);
        assert_eq!(codes, vec!["a", "b"]);
    }

    #[test]
    fn dedup_upper_keeps_first_seen_order() {
        assert_eq!(dedup_upper(&["b", "a", "B", "c"]), vec!["B", "A", "C"]);
    }

    #[test]
    fn find_is_case_insensitive_and_slices_original() {
        let text = "Invoice ref abc-100 shipped";
        let range = find_ignore_case(text, "ABC-100").unwrap();
        assert_eq!(&text[range], "abc-100");
    }

    #[test]
    fn find_handles_multibyte_text() {
        let text = "Declaración Nº ÑANDÚ-77 en tránsito";
        let range = find_ignore_case(text, "ñandú-77").unwrap();
        assert_eq!(&text[range], "ÑANDÚ-77");
    }

    #[test]
    fn empty_needle_never_matches() {
        assert_eq!(find_ignore_case("anything", ""), None);
        assert_eq!(count_ignore_case("anything", ""), 0);
    }

    #[test]
    fn count_is_non_overlapping() {
        assert_eq!(count_ignore_case("aaaa", "aa"), 2);
        assert_eq!(count_ignore_case("Term term TERM", "term"), 3);
        assert_eq!(count_ignore_case("nothing here", "term"), 0);
    }

    #[test]
    fn snippet_without_clipping_has_no_ellipsis() {
        let text = "short  text\nhere";
        let range = find_ignore_case(text, "text").unwrap();
        assert_eq!(context_snippet(text, range, 80), "short text here");
    }

    #[test]
    fn snippet_clips_both_sides() {
        let text = format!("{}NEEDLE{}", "x".repeat(100), "y".repeat(100));
        let range = find_ignore_case(&text, "needle").unwrap();
        let snippet = context_snippet(&text, range, 5);
        assert_eq!(snippet, "...xxxxxNEEDLEyyyyy...");
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
