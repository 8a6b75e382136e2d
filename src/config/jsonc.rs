//! JSON-with-comments reader.
//!
//! [`strip_jsonc`] is a pure text transform: it removes `//` and `/* */`
//! comments outside string literals and drops commas that immediately precede
//! a closing `}` or `]`.  The output is handed to `serde_json`.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{Result, SyncError};

/// Remove comments and trailing commas from JSONC text.
///
/// Newlines inside comments are kept so parser positions still point at the
/// right line.  An unterminated string or block comment runs to end of input.
#[must_use]
pub fn strip_jsonc(input: &str) -> String {
    remove_trailing_commas(&remove_comments(input))
}

fn remove_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for nc in chars.by_ref() {
                    if nc == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                while let Some(nc) = chars.next() {
                    if nc == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        break;
                    }
                    if nc == '\n' {
                        out.push('\n');
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                }
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars
                .iter()
                .skip(i + 1)
                .find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Parse JSONC text into `T`.
///
/// `path` is only used to label errors.
///
/// # Errors
///
/// Returns [`SyncError::Parse`] if the stripped text is not valid JSON for `T`.
pub fn parse_jsonc<T: DeserializeOwned>(text: &str, path: &Path) -> Result<T> {
    serde_json::from_str(&strip_jsonc(text)).map_err(|e| SyncError::parse(path, &e))
}

/// Read and parse a JSONC file.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be read or
/// [`SyncError::Parse`] if it is not valid JSONC.
pub fn read_jsonc<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
    parse_jsonc(&text, path)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn parse(text: &str) -> Value {
        parse_jsonc(text, Path::new("test.jsonc")).unwrap()
    }

    #[test]
    fn removes_line_comments() {
        assert_eq!(parse("{\n  // note\n  \"a\": 1 // trailing\n}"), json!({"a": 1}));
    }

    #[test]
    fn removes_block_comments() {
        assert_eq!(parse("{ /* one */ \"a\": /* two */ 1 }"), json!({"a": 1}));
    }

    #[test]
    fn multiline_block_comment_keeps_line_numbers() {
        let stripped = strip_jsonc("{\n/*\nx\n*/\n\"a\": 1}");
        assert_eq!(stripped.matches('\n').count(), 4);
    }

    #[test]
    fn keeps_comment_markers_inside_strings() {
        assert_eq!(
            parse(r#"{"url": "https://example.com/*path*/", "c": "// not a comment"}"#),
            json!({"url": "https://example.com/*path*/", "c": "// not a comment"})
        );
    }

    #[test]
    fn keeps_escaped_quotes_inside_strings() {
        assert_eq!(
            parse(r#"{"q": "say \"hi\" // still string", "b": 2}"#),
            json!({"q": "say \"hi\" // still string", "b": 2})
        );
    }

    #[test]
    fn escaped_backslash_before_closing_quote() {
        assert_eq!(parse(r#"{"p": "C:\\", "n": 1,}"#), json!({"p": "C:\\", "n": 1}));
    }

    #[test]
    fn removes_trailing_comma_before_brace() {
        assert_eq!(parse("{\"a\": 1,}"), json!({"a": 1}));
    }

    #[test]
    fn removes_trailing_comma_before_bracket() {
        assert_eq!(parse("{\"a\": [1, 2, ]}"), json!({"a": [1, 2]}));
    }

    #[test]
    fn removes_trailing_comma_with_comment_between() {
        assert_eq!(parse("{\"a\": 1, // last\n}"), json!({"a": 1}));
        assert_eq!(parse("[1, /* end */ ]"), json!([1]));
    }

    #[test]
    fn keeps_commas_inside_strings_before_brace_char() {
        assert_eq!(parse(r#"{"s": ",}"}"#), json!({"s": ",}"}));
    }

    #[test]
    fn keeps_separating_commas() {
        assert_eq!(parse("[1,\n 2]"), json!([1, 2]));
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        let stripped = strip_jsonc("{\"a\": \"open // x,}");
        assert_eq!(stripped, "{\"a\": \"open // x,}");
        assert!(parse_jsonc::<Value>("{\"a\": \"open", Path::new("x")).is_err());
    }

    #[test]
    fn unterminated_block_comment_runs_to_end() {
        assert_eq!(strip_jsonc("{\"a\": 1} /* dangling"), "{\"a\": 1} ");
    }

    #[test]
    fn lone_slash_is_preserved() {
        assert_eq!(strip_jsonc("/"), "/");
    }

    #[test]
    fn empty_input() {
        assert_eq!(strip_jsonc(""), "");
    }

    #[test]
    fn parse_error_is_typed() {
        let err = parse_jsonc::<Value>("{\"a\": }", Path::new("cfg.jsonc")).unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
        assert!(err.to_string().contains("cfg.jsonc"));
    }
}
