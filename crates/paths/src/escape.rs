//! Path component escaping
//!
//! Two encodings:
//!
//! - **General** (`escape` / `unescape`): metric names and dotted-format
//!   values. Path separators (`. / = %`) and every byte outside printable
//!   ASCII are percent-encoded; quoting and grouping punctuation is
//!   backslash-escaped. `unescape` decodes both forms in one left-to-right
//!   pass, so `unescape(escape(s)) == s`.
//! - **Tagged** (`escape_tagged`): tag values. Non-ASCII bytes are
//!   percent-encoded and the characters carbon uses as tag delimiters are
//!   replaced by `_`. There is no inverse.

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[inline]
fn push_percent(out: &mut String, byte: u8) {
    out.push('%');
    out.push(HEX[(byte >> 4) as usize] as char);
    out.push(HEX[(byte & 0x0f) as usize] as char);
}

/// General-purpose escape for metric names and dotted label values
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for &byte in s.as_bytes() {
        match byte {
            b'.' | b'%' | b'/' | b'=' => push_percent(&mut out, byte),
            b'(' | b')' | b'{' | b'}' | b',' | b'\'' | b'"' | b'\\' => {
                out.push('\\');
                out.push(byte as char);
            }
            0x21..=0x7e => out.push(byte as char),
            _ => push_percent(&mut out, byte),
        }
    }
    out
}

/// Inverse of [`escape`]
///
/// Malformed percent sequences are kept literally and a trailing lone
/// backslash is kept as is.
pub fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.push(bytes[i + 1]);
                i += 2;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[inline]
fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Escape a tag value for the `;name=value` format
pub fn escape_tagged(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &byte in s.as_bytes() {
        match byte {
            0x80..=0xff => push_percent(&mut out, byte),
            b' ' | b';' | b'=' | b'~' | 0x00..=0x1f | 0x7f => out.push('_'),
            _ => out.push(byte as char),
        }
    }
    out
}

#[cfg(test)]
#[path = "escape_test.rs"]
mod tests;
