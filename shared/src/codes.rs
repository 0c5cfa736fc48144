//! Marking-code block codec
//!
//! Collected marking codes are written into the order description as a
//! single delimited block, one code per line:
//!
//! ```text
//! [CODES]
//! 010460000000001721ABC...
//! 010460000000001721DEF...
//! [/CODES]
//! ```
//!
//! The same block doubles as the completion marker: an order whose
//! description already carries it has been fully processed. Parsing and
//! rendering live in one place so the "already done" check and the
//! "write new codes" operation can never drift apart.

/// Opening delimiter of the code block
pub const BLOCK_START: &str = "[CODES]";
/// Closing delimiter of the code block
pub const BLOCK_END: &str = "[/CODES]";

/// Locate an existing block: `(start, end)` byte offsets covering both markers
fn find_block(description: &str) -> Option<(usize, usize)> {
    let start = description.find(BLOCK_START)?;
    let end_rel = description[start..].find(BLOCK_END)?;
    Some((start, start + end_rel + BLOCK_END.len()))
}

/// Whether the description already carries a code block (completion marker)
pub fn has_block(description: &str) -> bool {
    find_block(description).is_some()
}

/// Extract the codes from an existing block, if present
///
/// Lines are trimmed and blanks dropped. Returns `Some(vec![])` for an
/// empty block, `None` when no block exists.
pub fn extract_block(description: &str) -> Option<Vec<String>> {
    let (start, end) = find_block(description)?;
    let body = &description[start + BLOCK_START.len()..end - BLOCK_END.len()];
    Some(
        body.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Render the block and splice it into the description
///
/// An existing block is replaced in place; otherwise the block is appended
/// after a blank line. The surrounding description text is preserved
/// byte-for-byte.
pub fn replace_block(description: &str, codes: &[String]) -> String {
    let block = format!("{BLOCK_START}\n{}\n{BLOCK_END}", codes.join("\n"));
    match find_block(description) {
        Some((start, end)) => {
            format!("{}{}{}", &description[..start], block, &description[end..])
        }
        None if description.is_empty() => block,
        None => format!("{description}\n\n{block}"),
    }
}

/// Normalize scanned input: trim lines, drop blanks, dedupe preserving order
///
/// Returns `(unique, duplicates)`.
pub fn normalize_codes(raw: &str) -> (Vec<String>, Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    let mut duplicates = Vec::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if seen.insert(line.to_string()) {
            unique.push(line.to_string());
        } else {
            duplicates.push(line.to_string());
        }
    }
    (unique, duplicates)
}

/// Heuristic checks for a GS1 DataMatrix marking code
///
/// Returns warnings, never a hard failure: scanners occasionally deliver
/// codes with stripped group separators that are still usable.
pub fn soft_validate_code(code: &str) -> Vec<String> {
    let c = code.trim();
    let mut warnings = Vec::new();
    if !c.starts_with("01") {
        warnings.push("does not start with GTIN application identifier '01'".to_string());
    }
    if !c.contains("21") {
        warnings.push("missing serial number application identifier '21'".to_string());
    }
    if c.len() < 25 {
        warnings.push("shorter than a typical GS1 DataMatrix payload".to_string());
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn append_to_empty_description() {
        let out = replace_block("", &codes(&["A", "B"]));
        assert_eq!(out, "[CODES]\nA\nB\n[/CODES]");
        assert!(has_block(&out));
        assert_eq!(extract_block(&out).unwrap(), codes(&["A", "B"]));
    }

    #[test]
    fn append_preserves_existing_description() {
        let out = replace_block("Deliver to dock 4.", &codes(&["X"]));
        assert_eq!(out, "Deliver to dock 4.\n\n[CODES]\nX\n[/CODES]");
    }

    #[test]
    fn replace_in_place_keeps_surrounding_text() {
        let desc = "prefix\n[CODES]\nOLD\n[/CODES]\nsuffix";
        let out = replace_block(desc, &codes(&["NEW1", "NEW2"]));
        assert_eq!(out, "prefix\n[CODES]\nNEW1\nNEW2\n[/CODES]\nsuffix");
        assert_eq!(extract_block(&out).unwrap(), codes(&["NEW1", "NEW2"]));
    }

    #[test]
    fn round_trip_is_stable() {
        let once = replace_block("note", &codes(&["A", "B"]));
        let twice = replace_block(&once, &codes(&["A", "B"]));
        assert_eq!(once, twice);
    }

    #[test]
    fn no_block_in_plain_description() {
        assert!(!has_block("just a note"));
        assert!(extract_block("just a note").is_none());
        // A lone start marker is not a block
        assert!(!has_block("[CODES] unterminated"));
    }

    #[test]
    fn normalize_dedupes_preserving_order() {
        let (unique, dups) = normalize_codes("  A \n\nB\nA\nC\nB\n");
        assert_eq!(unique, codes(&["A", "B", "C"]));
        assert_eq!(dups, codes(&["A", "B"]));
    }

    #[test]
    fn soft_validation_flags_suspicious_codes() {
        assert!(soft_validate_code("010460000000001721SERIAL12345").is_empty());
        let warnings = soft_validate_code("99short");
        assert_eq!(warnings.len(), 3);
    }
}
