use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::PatternError;

/// Characters accepted as the opening (and closing) delimiter of a pattern.
const DELIMITERS: &[char] = &['/', '#', '~', '@', '%', '!', '|', ',', ';'];

/// A compiled rule pattern, remembering the text it was parsed from.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Parses a delimited pattern (`/body/flags`) or, when the text does not
    /// open with a known delimiter, a bare regex.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let trimmed = raw.trim();
        let first = trimmed.chars().next().ok_or(PatternError::Empty)?;

        let expression = if DELIMITERS.contains(&first) {
            translate_delimited(trimmed, first)?
        } else {
            trimmed.to_string()
        };

        let regex = Regex::new(&expression).map_err(|e| PatternError::InvalidRegex {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: raw.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Converts `/body/flags` into an inline-flagged regex source.
fn translate_delimited(raw: &str, delimiter: char) -> Result<String, PatternError> {
    let rest = &raw[delimiter.len_utf8()..];
    let mut body = String::with_capacity(rest.len());
    let mut end = None;

    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                // `\/` only exists to protect the delimiter; the regex engine
                // does not need it.
                Some((_, next)) if next == delimiter && !is_meta(next) => body.push(next),
                Some((_, next)) => {
                    body.push('\\');
                    body.push(next);
                }
                None => body.push('\\'),
            }
        } else if c == delimiter {
            end = Some(i);
            break;
        } else {
            body.push(c);
        }
    }

    let end = end.ok_or_else(|| PatternError::Unterminated {
        pattern: raw.to_string(),
        delimiter,
    })?;

    let mut inline = String::new();
    for flag in rest[end + delimiter.len_utf8()..].chars() {
        match flag {
            'i' | 'm' | 's' | 'x' | 'U' => {
                if !inline.contains(flag) {
                    inline.push(flag);
                }
            }
            // Matching is always Unicode-aware.
            'u' => {}
            other => {
                return Err(PatternError::UnknownFlag {
                    pattern: raw.to_string(),
                    flag: other,
                })
            }
        }
    }

    if inline.is_empty() {
        Ok(body)
    } else {
        Ok(format!("(?{}){}", inline, body))
    }
}

fn is_meta(c: char) -> bool {
    matches!(
        c,
        '\\' | '.'
            | '+'
            | '*'
            | '?'
            | '('
            | ')'
            | '|'
            | '['
            | ']'
            | '{'
            | '}'
            | '^'
            | '$'
            | '#'
            | '&'
            | '-'
            | '~'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slash_delimited() {
        let pattern = Pattern::parse(r"/^(.+)\.txt$/").unwrap();
        assert!(pattern.is_match("notes.txt"));
        assert!(!pattern.is_match("notes.md"));
        assert_eq!(pattern.as_str(), r"/^(.+)\.txt$/");
    }

    #[test]
    fn test_parse_case_insensitive_flag() {
        let pattern = Pattern::parse(r"/\.MKV$/i").unwrap();
        assert!(pattern.is_match("episode.mkv"));
        assert!(pattern.regex().as_str().starts_with("(?i)"));
    }

    #[test]
    fn test_matching_is_case_sensitive_by_default() {
        let pattern = Pattern::parse(r"/\.MKV$/").unwrap();
        assert!(!pattern.is_match("episode.mkv"));
    }

    #[test]
    fn test_parse_alternate_delimiter() {
        let pattern = Pattern::parse(r"#^shows/(.+)$#").unwrap();
        assert!(pattern.is_match("shows/a.mkv"));
    }

    #[test]
    fn test_escaped_slash_is_unescaped() {
        let pattern = Pattern::parse(r"/^season 1\/(.+)$/").unwrap();
        assert_eq!(pattern.regex().as_str(), "^season 1/(.+)$");
        assert!(pattern.is_match("season 1/e01.mkv"));
    }

    #[test]
    fn test_bare_regex_is_accepted() {
        let pattern = Pattern::parse(r"^(\d+)\.jpg$").unwrap();
        assert!(pattern.is_match("42.jpg"));
    }

    #[test]
    fn test_unterminated_pattern() {
        let err = Pattern::parse(r"/^(.+)\.txt$").unwrap_err();
        assert!(matches!(err, PatternError::Unterminated { delimiter: '/', .. }));
    }

    #[test]
    fn test_unknown_flag() {
        let err = Pattern::parse(r"/abc/q").unwrap_err();
        assert!(matches!(err, PatternError::UnknownFlag { flag: 'q', .. }));
    }

    #[test]
    fn test_invalid_regex() {
        let err = Pattern::parse(r"/(unclosed/").unwrap_err();
        assert!(matches!(err, PatternError::InvalidRegex { .. }));
    }

    #[test]
    fn test_empty_pattern() {
        assert_eq!(Pattern::parse("  ").unwrap_err(), PatternError::Empty);
    }

    #[test]
    fn test_unicode_flag_is_accepted() {
        let pattern = Pattern::parse(r"/^é(.+)$/u").unwrap();
        assert!(pattern.is_match("éte"));
    }
}
