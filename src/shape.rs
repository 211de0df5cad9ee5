//! Query-shape canonicalization.
//!
//! Two statements that differ only in literal values share a shape; the
//! executor counts distinct shapes as its diversity metric.

/// Canonicalizes a query: every `'…'` string literal becomes `'?'` (with
/// `''` escapes honored), every standalone numeric literal becomes `?`, and
/// whitespace runs collapse to single spaces.
pub fn query_shape(query: &str) -> String {
    let bytes = query.trim().as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    // true when the previous emitted character belongs to a word, which
    // suppresses numeric replacement inside identifiers like "t1"
    let mut prev_word = false;
    let mut pending_space = false;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' {
            // skip the literal body; '' is an escaped quote
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            flush_space(&mut out, &mut pending_space);
            out.push_str("'?'");
            prev_word = false;
        } else if b.is_ascii_whitespace() {
            pending_space = true;
            prev_word = false;
            i += 1;
        } else if b.is_ascii_digit() && !prev_word {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).map_or(false, u8::is_ascii_digit) {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            flush_space(&mut out, &mut pending_space);
            if bytes.get(i).map_or(false, |&next| is_word_byte(next)) {
                // no trailing boundary, e.g. "42abc": keep verbatim
                out.push_str(std::str::from_utf8(&bytes[start..i]).unwrap_or_default());
                prev_word = true;
            } else {
                out.push('?');
                prev_word = false;
            }
        } else {
            flush_space(&mut out, &mut pending_space);
            // multi-byte sequences are identifier-ish; copy them through
            let len = utf8_len(b);
            out.push_str(std::str::from_utf8(&bytes[i..(i + len).min(bytes.len())]).unwrap_or("\u{fffd}"));
            prev_word = is_word_byte(b);
            i += len;
        }
    }
    out
}

fn flush_space(out: &mut String, pending: &mut bool) {
    if *pending {
        if !out.is_empty() {
            out.push(' ');
        }
        *pending = false;
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn utf8_len(b: u8) -> usize {
    match b {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ if b >= 0xf0 => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_collapse_to_same_shape() {
        let a = query_shape("SELECT * FROM t WHERE id = 42 AND name = 'Joe'");
        let b = query_shape("SELECT  *  FROM t WHERE id = 7 AND name = 'Ann'");
        assert_eq!(a, "SELECT * FROM t WHERE id = ? AND name = '?'");
        assert_eq!(a, b);
    }

    #[test]
    fn test_identifiers_are_preserved()  {
        let a = query_shape("SELECT a FROM t1");
        let b = query_shape("SELECT a FROM t2");
        assert_ne!(a, b);
        assert_eq!(a, "SELECT a FROM t1");
    }

    #[test]
    fn test_escaped_quotes() {
        assert_eq!(
            query_shape("SELECT 'it''s fine', 10"),
            "SELECT '?', ?",
        );
    }

    #[test]
    fn test_decimal_literals() {
        assert_eq!(
            query_shape("INSERT INTO p (price) VALUES (19.99)"),
            "INSERT INTO p (price) VALUES (?)",
        );
    }

    #[test]
    fn test_structure_differences_keep_distinct_shapes() {
        let a = query_shape("SELECT a FROM t WHERE x = 1");
        let b = query_shape("SELECT a FROM t WHERE x = 1 ORDER BY a");
        assert_ne!(a, b);
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(
            query_shape("  UPDATE   t\n  SET a =  2  "),
            "UPDATE t SET a = ?",
        );
    }

    #[test]
    fn test_number_glued_to_identifier_kept() {
        assert_eq!(query_shape("SELECT x FROM 2fa"), "SELECT x FROM 2fa");
    }
}
