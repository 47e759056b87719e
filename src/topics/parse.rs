//! # Topic string parser.
//!
//! Grammar (separator `.`, case-sensitive, UTF-8):
//!
//! ```text
//! topic      := part ( "." part )*
//! part       := exact | any | range | pattern
//! exact      := [^.{}()/|]+
//! any        := "{" [^}]+ "}"
//! range      := "(" opt ( "|" opt )+ ")"      ; two or more alternatives
//! pattern    := "/" regex "/"
//! ```
//!
//! Parsing is deterministic: the first character of a segment selects the
//! form, empty segments are rejected, and a reserved character outside a
//! well-formed construct fails the parse. Pattern bodies are compiled
//! eagerly; a pattern body cannot contain `/` (the next slash closes it).

use std::iter::Peekable;
use std::str::Chars;

use crate::error::ParseError;
use crate::topics::part::TopicPart;

/// Parses a topic string into its typed parts.
pub(crate) fn parse_parts(input: &str) -> Result<Vec<TopicPart>, ParseError> {
    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut chars = input.chars().peekable();
    let mut parts = Vec::new();

    loop {
        let index = parts.len();
        parts.push(parse_part(&mut chars, index)?);

        match chars.next() {
            None => break,
            Some('.') => {
                if chars.peek().is_none() {
                    return Err(ParseError::EmptySegment { index: parts.len() });
                }
            }
            // A reserved opener/closer right after a finished construct,
            // e.g. `{a}b` or `(x|y)z`.
            Some(found) => return Err(ParseError::UnexpectedChar { index, found }),
        }
    }

    Ok(parts)
}

fn parse_part(chars: &mut Peekable<Chars<'_>>, index: usize) -> Result<TopicPart, ParseError> {
    match chars.peek() {
        None | Some('.') => Err(ParseError::EmptySegment { index }),
        Some('{') => {
            chars.next();
            parse_wildcard(chars, index)
        }
        Some('(') => {
            chars.next();
            parse_range(chars, index)
        }
        Some('/') => {
            chars.next();
            parse_pattern(chars, index)
        }
        Some(_) => parse_exact(chars, index),
    }
}

fn parse_exact(chars: &mut Peekable<Chars<'_>>, index: usize) -> Result<TopicPart, ParseError> {
    let mut literal = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            '.' => break,
            '{' | '}' | '(' | ')' | '/' | '|' => {
                return Err(ParseError::UnexpectedChar { index, found: c });
            }
            _ => {
                literal.push(c);
                chars.next();
            }
        }
    }
    debug_assert!(!literal.is_empty());
    Ok(TopicPart::Exact(literal))
}

fn parse_wildcard(chars: &mut Peekable<Chars<'_>>, index: usize) -> Result<TopicPart, ParseError> {
    let mut name = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            if name.is_empty() {
                return Err(ParseError::EmptyWildcard { index });
            }
            return Ok(TopicPart::Any(name));
        }
        name.push(c);
    }
    Err(ParseError::UnterminatedWildcard { index })
}

fn parse_range(chars: &mut Peekable<Chars<'_>>, index: usize) -> Result<TopicPart, ParseError> {
    let mut body = String::new();
    let mut closed = false;
    for c in chars.by_ref() {
        if c == ')' {
            closed = true;
            break;
        }
        body.push(c);
    }
    if !closed {
        return Err(ParseError::UnterminatedRange { index });
    }

    let options: Vec<String> = body.split('|').map(str::to_owned).collect();
    if options.iter().any(String::is_empty) {
        return Err(ParseError::EmptyRangeOption { index });
    }
    if options.len() < 2 {
        return Err(ParseError::RangeNeedsAlternatives { index });
    }
    Ok(TopicPart::Range(options))
}

fn parse_pattern(chars: &mut Peekable<Chars<'_>>, index: usize) -> Result<TopicPart, ParseError> {
    let mut source = String::new();
    let mut closed = false;
    for c in chars.by_ref() {
        if c == '/' {
            closed = true;
            break;
        }
        source.push(c);
    }
    if !closed {
        return Err(ParseError::UnterminatedPattern { index });
    }

    TopicPart::pattern(source).map_err(|e| ParseError::InvalidPattern {
        index,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::parse_parts;
    use crate::error::ParseError;
    use crate::topics::part::TopicPart;

    fn kinds(input: &str) -> Vec<char> {
        parse_parts(input)
            .unwrap()
            .iter()
            .map(|p| p.tag() as char)
            .collect()
    }

    #[test]
    fn basic_forms() {
        assert_eq!(kinds("exact"), vec!['E']);
        assert_eq!(kinds("{valid}"), vec!['A']);
        assert_eq!(kinds("(a|b)"), vec!['R']);
        assert_eq!(kinds("/pat/"), vec!['P']);
    }

    #[test]
    fn mixed_topic() {
        let parts = parse_parts(r"base./user_(test|prod)/.{suffix}").unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], TopicPart::Exact("base".into()));
        assert!(matches!(&parts[1], TopicPart::Pattern { source, .. } if source == "user_(test|prod)"));
        assert_eq!(parts[2], TopicPart::Any("suffix".into()));
    }

    #[test]
    fn pattern_body_may_contain_dots_and_braces() {
        let parts = parse_parts(r"/^[0-9]{6}\.(SZ|SH)$/.abc.(user|guest|admin)").unwrap();
        assert!(matches!(&parts[0], TopicPart::Pattern { source, .. } if source == r"^[0-9]{6}\.(SZ|SH)$"));
        assert_eq!(parts[1], TopicPart::Exact("abc".into()));
        assert_eq!(
            parts[2],
            TopicPart::Range(vec!["user".into(), "guest".into(), "admin".into()])
        );

        // Pattern in trailing position.
        let parts = parse_parts(r"abc.(user|guest|admin)./^[0-9]{6}\.(SZ|SH)$/").unwrap();
        assert!(matches!(&parts[2], TopicPart::Pattern { source, .. } if source == r"^[0-9]{6}\.(SZ|SH)$"));
    }

    #[test]
    fn empty_segments_rejected() {
        assert!(matches!(parse_parts(""), Err(ParseError::Empty)));
        assert!(matches!(
            parse_parts(".a"),
            Err(ParseError::EmptySegment { index: 0 })
        ));
        assert!(matches!(
            parse_parts("a."),
            Err(ParseError::EmptySegment { index: 1 })
        ));
        assert!(matches!(
            parse_parts("a..b"),
            Err(ParseError::EmptySegment { index: 1 })
        ));
    }

    #[test]
    fn malformed_constructs_rejected() {
        assert!(matches!(
            parse_parts("{unclosed"),
            Err(ParseError::UnterminatedWildcard { .. })
        ));
        assert!(matches!(
            parse_parts("{}"),
            Err(ParseError::EmptyWildcard { .. })
        ));
        assert!(matches!(
            parse_parts("(unclosed"),
            Err(ParseError::UnterminatedRange { .. })
        ));
        assert!(matches!(
            parse_parts("(a||b)"),
            Err(ParseError::EmptyRangeOption { .. })
        ));
        assert!(matches!(
            parse_parts("(solo)"),
            Err(ParseError::RangeNeedsAlternatives { .. })
        ));
        assert!(matches!(
            parse_parts("a./no_close"),
            Err(ParseError::UnterminatedPattern { .. })
        ));
        assert!(matches!(
            parse_parts("/([0-9]+/"),
            Err(ParseError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn stray_reserved_chars_rejected() {
        assert!(matches!(
            parse_parts("a}b"),
            Err(ParseError::UnexpectedChar { found: '}', .. })
        ));
        assert!(matches!(
            parse_parts("a|b"),
            Err(ParseError::UnexpectedChar { found: '|', .. })
        ));
        assert!(matches!(
            parse_parts("ab{c}"),
            Err(ParseError::UnexpectedChar { found: '{', .. })
        ));
        assert!(matches!(
            parse_parts("{a}b"),
            Err(ParseError::UnexpectedChar { found: 'b', .. })
        ));
    }

    #[test]
    fn unicode_fragments() {
        let parts = parse_parts("données.{clé}.行情").unwrap();
        assert_eq!(parts[0], TopicPart::Exact("données".into()));
        assert_eq!(parts[1], TopicPart::Any("clé".into()));
        assert_eq!(parts[2], TopicPart::Exact("行情".into()));
    }
}
