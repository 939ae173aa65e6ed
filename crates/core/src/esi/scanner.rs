//! ESI include tag scanner.
//!
//! Finds `<esi:include ... />` and `<esi:include ...>` markers in a byte
//! buffer with a single left-to-right pass and extracts their `src`
//! attribute. Works on raw bytes so non-UTF-8 documents pass through
//! untouched.

/// Literal opening token of an include directive.
pub const OPENER: &[u8] = b"<esi:include";

/// Byte offsets of a complete marker inside a buffer, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EsiMatch {
    pub start: usize,
    pub end: usize,
}

/// Outcome of scanning a buffer from some offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A complete marker.
    Found(EsiMatch),
    /// The opener starts at `start` but no closer follows in the buffer.
    Unclosed { start: usize },
    /// The buffer ends with the first bytes of the opener, starting at `start`.
    PartialOpener { start: usize },
    /// Nothing that could become a marker.
    Clear,
}

/// Scan the whole buffer.
pub fn scan(buf: &[u8]) -> Scan {
    scan_from(buf, 0)
}

/// Scan `buf` starting at byte offset `from`.
pub fn scan_from(buf: &[u8], from: usize) -> Scan {
    match find_token(buf, from, OPENER) {
        Ok(start) => match find_tag_end(buf, start + OPENER.len()) {
            Some(close) => Scan::Found(EsiMatch { start, end: close + 1 }),
            None => Scan::Unclosed { start },
        },
        Err(0) => Scan::Clear,
        Err(partial) => Scan::PartialOpener { start: buf.len() - partial },
    }
}

/// Incremental prefix matcher.
///
/// Returns the offset of the first occurrence of `token` at or after `from`,
/// or the length of the token prefix the buffer ends with. Only valid for
/// tokens whose first byte does not reappear later in the token, which holds
/// for `OPENER`.
fn find_token(buf: &[u8], from: usize, token: &[u8]) -> Result<usize, usize> {
    debug_assert!(!token[1..].contains(&token[0]));

    let mut matched = 0;
    for (i, &byte) in buf.iter().enumerate().skip(from) {
        if byte == token[matched] {
            matched += 1;
            if matched == token.len() {
                return Ok(i + 1 - token.len());
            }
        } else {
            matched = usize::from(byte == token[0]);
        }
    }
    Err(matched)
}

/// Offset of the `>` that closes the tag whose attributes start at `from`.
///
/// Both `/>` and a bare `>` close the tag. A `>` inside a quoted attribute
/// value does not; a quote only opens a value right after `=`.
fn find_tag_end(buf: &[u8], from: usize) -> Option<usize> {
    let mut quote = None;
    for (i, &byte) in buf.iter().enumerate().skip(from) {
        match (quote, byte) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'>') => return Some(i),
            (None, b'"' | b'\'') if buf[i - 1] == b'=' => quote = Some(byte),
            (None, _) => {}
        }
    }
    None
}

/// Extract the `src` attribute from a complete marker.
///
/// Strategies, first non-empty wins:
/// 1. `src="..."`
/// 2. `src='...'`
/// 3. `src=...` unquoted, up to whitespace or `>`
///
/// Returns `None` when every strategy comes up empty.
pub fn extract_src(tag: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(tag);

    quoted(&text, '"')
        .or_else(|| quoted(&text, '\''))
        .or_else(|| unquoted(&text))
        .map(str::to_string)
}

/// Offsets just past every `src=` that starts an attribute.
fn src_values(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.match_indices("src=").filter_map(move |(i, _)| {
        let preceded_by_space = text[..i].chars().next_back().is_some_and(char::is_whitespace);
        preceded_by_space.then_some(i + "src=".len())
    })
}

fn quoted(text: &str, quote: char) -> Option<&str> {
    src_values(text).find_map(|at| {
        let rest = text[at..].strip_prefix(quote)?;
        let value = &rest[..rest.find(quote)?];
        (!value.is_empty()).then_some(value)
    })
}

fn unquoted(text: &str) -> Option<&str> {
    src_values(text).find_map(|at| {
        let rest = &text[at..];
        if rest.starts_with(['"', '\'']) {
            return None;
        }
        let end = rest.find(|c: char| c == '>' || c.is_whitespace()).unwrap_or(rest.len());
        let mut value = &rest[..end];
        // `src=/bar/>`: the slash belongs to the tag end.
        if rest[end..].starts_with('>') {
            value = value.strip_suffix('/').unwrap_or(value);
        }
        (!value.is_empty()).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_finds_marker() {
        let buf = br#"<h2>foo</h2><esi:include src="/bar"/>"#;
        assert_eq!(scan(buf), Scan::Found(EsiMatch { start: 12, end: buf.len() }));
    }

    #[test]
    fn test_scan_clear_without_opener() {
        assert_eq!(scan(b"<html><body>plain</body></html>"), Scan::Clear);
        assert_eq!(scan(b""), Scan::Clear);
    }

    #[test]
    fn test_scan_unclosed_marker() {
        let buf = br#"before<esi:include src="/bar""#;
        assert_eq!(scan(buf), Scan::Unclosed { start: 6 });
    }

    #[test]
    fn test_scan_trailing_partial_opener() {
        assert_eq!(scan(b"text<esi:inc"), Scan::PartialOpener { start: 4 });
        assert_eq!(scan(b"text<"), Scan::PartialOpener { start: 4 });
        assert_eq!(scan(b"<esi:include-ish <"), Scan::Unclosed { start: 0 });
    }

    #[test]
    fn test_scan_restarts_after_false_start() {
        let buf = br#"<<esi<esi:include src="x"/>"#;
        assert_eq!(scan(buf), Scan::Found(EsiMatch { start: 5, end: buf.len() }));
    }

    #[test]
    fn test_scan_from_offset_finds_second_marker() {
        let buf = br#"<esi:include src="a"/>mid<esi:include src="b"/>"#;
        let Scan::Found(first) = scan(buf) else { panic!("expected first marker") };
        let Scan::Found(second) = scan_from(buf, first.end) else { panic!("expected second marker") };
        assert_eq!(&buf[second.start..second.end], br#"<esi:include src="b"/>"#);
    }

    #[test]
    fn test_scan_bare_angle_bracket_ends_marker() {
        let buf = b"A<esi:include src=/bar><p>kept</p><br/>Z";
        let Scan::Found(m) = scan(buf) else { panic!("expected marker") };
        assert_eq!(&buf[m.start..m.end], b"<esi:include src=/bar>");
    }

    #[test]
    fn test_scan_skips_angle_bracket_inside_quoted_value() {
        let buf = br#"<esi:include src="/q?a=>b" alt='x>y'/>tail"#;
        let Scan::Found(m) = scan(buf) else { panic!("expected marker") };
        assert_eq!(m.end, buf.len() - "tail".len());
        assert_eq!(extract_src(&buf[m.start..m.end]).as_deref(), Some("/q?a=>b"));
    }

    #[test]
    fn test_scan_open_quote_at_buffer_end_is_unclosed() {
        assert_eq!(scan(br#"<esi:include src="/a>b"#), Scan::Unclosed { start: 0 });
    }

    #[test]
    fn test_extract_src_double_quoted() {
        assert_eq!(extract_src(br#"<esi:include src="/bar" />"#).as_deref(), Some("/bar"));
    }

    #[test]
    fn test_extract_src_single_quoted() {
        assert_eq!(extract_src(b"<esi:include src='/bar'/>").as_deref(), Some("/bar"));
    }

    #[test]
    fn test_extract_src_unquoted() {
        assert_eq!(extract_src(b"<esi:include src=/bar>").as_deref(), Some("/bar"));
        assert_eq!(extract_src(b"<esi:include src=/bar/>").as_deref(), Some("/bar"));
        assert_eq!(extract_src(b"<esi:include src=/bar?x=1 />").as_deref(), Some("/bar?x=1"));
    }

    #[test]
    fn test_extract_src_prefers_double_quoted() {
        let tag = br#"<esi:include src=/plain src="/quoted"/>"#;
        assert_eq!(extract_src(tag).as_deref(), Some("/quoted"));
    }

    #[test]
    fn test_extract_src_ignores_prefixed_attribute() {
        let tag = br#"<esi:include data-src="/wrong" src="/right"/>"#;
        assert_eq!(extract_src(tag).as_deref(), Some("/right"));
    }

    #[test]
    fn test_extract_src_empty_is_none() {
        assert_eq!(extract_src(br#"<esi:include src="" />"#), None);
        assert_eq!(extract_src(b"<esi:include />"), None);
        assert_eq!(extract_src(b"<esi:include src=/>"), None);
    }
}
