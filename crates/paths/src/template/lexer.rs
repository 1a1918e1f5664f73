//! Splits template source into text and action segments and tokenizes actions

use crate::error::TemplateError;

/// A piece of template source
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Segment {
    Text(String),
    Action { tokens: Vec<Token>, offset: usize },
}

/// A token inside `{{ }}`
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    /// `.` (empty path) or `.a.b`
    Field(Vec<String>),
    Ident(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Pipe,
    LParen,
    RParen,
}

/// Split source into segments, applying `{{-` and `-}}` trimming
pub(super) fn segments(src: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut out = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    loop {
        let rest = &src[pos..];
        let Some(open) = rest.find("{{") else {
            push_text(&mut out, rest, trim_next, false);
            return Ok(out);
        };

        let after_open = &rest[open + 2..];
        let trim_left = after_open.starts_with('-')
            && after_open[1..].starts_with(|c: char| c.is_ascii_whitespace());
        push_text(&mut out, &rest[..open], trim_next, trim_left);

        let body_start = usize::from(trim_left);
        let offset = pos + open + 2;
        let body_src = &after_open[body_start..];
        let close = find_close(body_src)
            .ok_or_else(|| TemplateError::parse(offset, "unclosed action"))?;

        let mut body = &body_src[..close];
        let trim_right = body.ends_with('-')
            && body[..body.len() - 1].ends_with(|c: char| c.is_ascii_whitespace());
        if trim_right {
            body = &body[..body.len() - 1];
        }

        let tokens = tokenize(body, offset + body_start)?;
        if tokens.is_empty() {
            return Err(TemplateError::parse(offset, "missing value for command"));
        }
        out.push(Segment::Action { tokens, offset });

        trim_next = trim_right;
        pos += open + 2 + body_start + close + 2;
    }
}

fn push_text(out: &mut Vec<Segment>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        out.push(Segment::Text(text.to_string()));
    }
}

/// Byte index of the closing `}}`, skipping over string literals
fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize the inside of one action
fn tokenize(body: &str, base: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let offset = base + start;
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, 'r')) => s.push('\r'),
                            Some((_, '\\')) => s.push('\\'),
                            Some((_, '"')) => s.push('"'),
                            Some((_, other)) => {
                                return Err(TemplateError::parse(
                                    offset,
                                    format!("unknown escape sequence \\{}", other),
                                ));
                            }
                            None => return Err(TemplateError::parse(offset, "unterminated quoted string")),
                        },
                        Some((_, ch)) => s.push(ch),
                        None => return Err(TemplateError::parse(offset, "unterminated quoted string")),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '`' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '`')) => break,
                        Some((_, ch)) => s.push(ch),
                        None => return Err(TemplateError::parse(offset, "unterminated raw quoted string")),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '.' => {
                chars.next();
                let mut path = Vec::new();
                while let Some(&(_, next)) = chars.peek() {
                    if !is_ident_start(next) {
                        break;
                    }
                    let mut name = String::new();
                    while let Some(&(_, ch)) = chars.peek() {
                        if !is_ident_char(ch) {
                            break;
                        }
                        name.push(ch);
                        chars.next();
                    }
                    path.push(name);
                    match chars.peek() {
                        Some(&(_, '.')) => {
                            chars.next();
                        }
                        _ => break,
                    }
                }
                tokens.push(Token::Field(path));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut literal = String::new();
                literal.push(c);
                chars.next();
                while let Some(&(_, ch)) = chars.peek() {
                    if !ch.is_ascii_alphanumeric() && ch != '.' && ch != '_' {
                        break;
                    }
                    literal.push(ch);
                    chars.next();
                }
                let value = literal.parse::<i64>().map_err(|_| {
                    TemplateError::parse(offset, format!("bad number syntax: {}", literal))
                })?;
                tokens.push(Token::Int(value));
            }
            c if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_ident_char(ch) {
                        break;
                    }
                    name.push(ch);
                    chars.next();
                }
                tokens.push(match name.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(name),
                });
            }
            other => {
                return Err(TemplateError::parse(
                    offset,
                    format!("unexpected {:?} in command", other),
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only() {
        let segs = segments("a.b.c").unwrap();
        assert_eq!(segs, vec![Segment::Text("a.b.c".into())]);
    }

    #[test]
    fn test_action_tokens() {
        let segs = segments("x.{{ .labels.owner | escape }}").unwrap();
        assert_eq!(segs.len(), 2);
        let Segment::Action { tokens, offset } = &segs[1] else {
            panic!("expected action");
        };
        assert_eq!(*offset, 4);
        assert_eq!(
            tokens,
            &vec![
                Token::Field(vec!["labels".into(), "owner".into()]),
                Token::Pipe,
                Token::Ident("escape".into()),
            ]
        );
    }

    #[test]
    fn test_dot_alone() {
        let segs = segments("{{.}}").unwrap();
        assert_eq!(
            segs,
            vec![Segment::Action {
                tokens: vec![Token::Field(vec![])],
                offset: 2
            }]
        );
    }

    #[test]
    fn test_trim_markers() {
        let segs = segments("a  {{- .x -}}  b").unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0], Segment::Text("a".into()));
        assert_eq!(segs[2], Segment::Text("b".into()));
    }

    #[test]
    fn test_negative_number_is_not_trim() {
        let segs = segments("a {{-3}}").unwrap();
        assert_eq!(segs[0], Segment::Text("a ".into()));
        let Segment::Action { tokens, .. } = &segs[1] else {
            panic!("expected action");
        };
        assert_eq!(tokens, &vec![Token::Int(-3)]);
    }

    #[test]
    fn test_close_inside_string_is_ignored() {
        let segs = segments(r#"{{ replace .x "}}" "_" }}"#).unwrap();
        let Segment::Action { tokens, .. } = &segs[0] else {
            panic!("expected action");
        };
        assert_eq!(tokens[2], Token::Str("}}".into()));
    }

    #[test]
    fn test_raw_string_keeps_backslashes() {
        let segs = segments(r"{{ `^([a-z_\-]*)$` }}").unwrap();
        let Segment::Action { tokens, .. } = &segs[0] else {
            panic!("expected action");
        };
        assert_eq!(tokens[0], Token::Str(r"^([a-z_\-]*)$".into()));
    }

    #[test]
    fn test_unclosed_action() {
        let err = segments("abc {{ .x").unwrap_err();
        assert!(matches!(err, TemplateError::Parse { offset: 6, .. }));
    }

    #[test]
    fn test_empty_action() {
        assert!(segments("{{ }}").is_err());
    }

    #[test]
    fn test_bad_number() {
        assert!(segments("{{ 1.5 }}").is_err());
    }
}
