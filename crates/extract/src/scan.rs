//! Character-level scanning for balanced objects in untrusted text.
//!
//! The scanner tracks string literals and escapes so braces inside quoted
//! values do not count toward nesting depth. It never allocates and never
//! fails; unbalanced input just yields fewer spans.

/// Half-open byte range of one balanced `{...}` span.
pub(crate) type ObjectSpan = std::ops::Range<usize>;

/// Find every top-level balanced object span, left to right.
///
/// A `{` whose closing brace never arrives is skipped and scanning resumes
/// at the next candidate brace, so one truncated object does not hide a
/// complete one after it.
pub(crate) fn scan_objects(text: &str) -> Vec<ObjectSpan> {
    let mut spans = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        match object_len(&text[start..]) {
            Some(len) => {
                spans.push(start..start + len);
                search_from = start + len;
            }
            None => search_from = start + 1,
        }
    }
    spans
}

/// Byte length of the balanced object at the start of `text`, or `None`.
fn object_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
                if depth == 0 {
                    // '}' is ASCII, one byte.
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_single_object() {
        let text = r#"before {"a": 1} after"#;
        let spans = scan_objects(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].clone()], r#"{"a": 1}"#);
    }

    #[test]
    fn splits_concatenated_objects() {
        let text = r#"{"a":1}{"b":2} {"c":3}"#;
        let spans = scan_objects(text);
        let found: Vec<&str> = spans.into_iter().map(|r| &text[r]).collect();
        assert_eq!(found, vec![r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":3}"#]);
    }

    #[test]
    fn nesting_counts_as_one_object() {
        let text = r#"{"outer": {"inner": {"deep": true}}}"#;
        let spans = scan_objects(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].clone()], text);
    }

    #[test]
    fn braces_inside_strings_do_not_nest() {
        let text = r#"{"code": "fn main() { loop {} }"}"#;
        let spans = scan_objects(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].clone()], text);
    }

    #[test]
    fn escaped_quotes_stay_inside_strings() {
        let text = r#"{"quote": "she said \"{\" loudly"}"#;
        let spans = scan_objects(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].clone()], text);
    }

    #[test]
    fn truncated_object_does_not_hide_a_later_one() {
        let text = r#"{"broken": 1 ... {"whole": 2}"#;
        let spans = scan_objects(text);
        // The outer scan fails, but resuming finds the inner complete span.
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].clone()], r#"{"whole": 2}"#);
    }

    #[test]
    fn plain_text_has_no_spans() {
        assert!(scan_objects("no objects here, just words").is_empty());
        assert!(scan_objects("").is_empty());
    }

    #[test]
    fn stray_close_brace_is_ignored() {
        let text = r#"} noise {"a":1}"#;
        let spans = scan_objects(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].clone()], r#"{"a":1}"#);
    }
}
