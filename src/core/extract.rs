//! Locates JSON literals embedded in script-like response bodies.
//!
//! Upstream endpoints wrap their payloads in JavaScript (`var r = [...];`,
//! `jsonpgz({...});`). The scanner counts bracket depth and skips over string
//! literals so nested structures and quoted brackets do not end the span early.

/// Returns the first balanced `open`..`close` span in `text`, inclusive.
pub fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => in_string = Some(ch),
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

/// First `{...}` object literal in `text`.
pub fn first_object(text: &str) -> Option<&str> {
    balanced_span(text, '{', '}')
}

/// First `[...]` array literal in `text`.
pub fn first_array(text: &str) -> Option<&str> {
    balanced_span(text, '[', ']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_inside_callback() {
        let body = r#"jsonpgz({"fundcode":"110022","gszzl":"1.23"});"#;
        assert_eq!(
            first_object(body),
            Some(r#"{"fundcode":"110022","gszzl":"1.23"}"#)
        );
    }

    #[test]
    fn test_nested_braces_are_balanced() {
        let body = r#"cb({"a":{"b":{"c":1}},"d":2}); trailing {"x":1}"#;
        assert_eq!(first_object(body), Some(r#"{"a":{"b":{"c":1}},"d":2}"#));
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let body = r#"cb({"name":"weird } name {","q":"say \"}\""});"#;
        let span = first_object(body).unwrap();
        let value: serde_json::Value = serde_json::from_str(span).unwrap();
        assert_eq!(value["name"], "weird } name {");
        assert_eq!(value["q"], "say \"}\"");
    }

    #[test]
    fn test_array_of_tuples() {
        let body = r#"var r = [["000001","HXCZHH","华夏成长混合"],["110022","YFDXFHY","易方达消费行业"]];"#;
        let span = first_array(body).unwrap();
        let rows: Vec<Vec<String>> = serde_json::from_str(span).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][2], "易方达消费行业");
    }

    #[test]
    fn test_missing_or_unterminated_span() {
        assert_eq!(first_object("jsonpgz();"), None);
        assert_eq!(first_object(""), None);
        assert_eq!(first_array(r#"var r = [["000001""#), None);
    }
}
