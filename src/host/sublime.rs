//! Sublime Text's settings dialect: JSON that allows `//` and `/* */` comments
//! and trailing commas.
//!
//! Saving edits only the values that changed, in place, so the user's comments,
//! spacing and key order survive. When a change can't be made that way the
//! caller renders the whole document again.

use anyhow::{Context, Result};
use serde_json::{Map, Value};

pub fn parse(text: &str) -> Result<Value> {
    json5::from_str(text).context("Invalid Sublime settings")
}

/// Apply the differences between `before` and `after` to `source`.
///
/// Returns `None` when a key was removed, a changed value is an object or an
/// array, or the edited text does not read back as `after`.
pub fn patch(source: &str, before: &Map<String, Value>, after: &Map<String, Value>) -> Option<String> {
    if before.keys().any(|key| !after.contains_key(key)) {
        return None;
    }

    let mut text = source.to_string();
    for (key, value) in after {
        if before.get(key) == Some(value) {
            continue;
        }
        let rendered = serde_json::to_string(value).ok()?;
        text = if before.contains_key(key) {
            replace_value(&text, key, &rendered)?
        } else {
            insert_entry(&text, key, &rendered)?
        };
    }

    match parse(&text) {
        Ok(Value::Object(map)) if map == *after => Some(text),
        _ => None,
    }
}

fn replace_value(text: &str, key: &str, rendered: &str) -> Option<String> {
    let quoted = serde_json::to_string(key).ok()?;
    for (pos, _) in text.match_indices(quoted.as_str()) {
        let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
        if text[line_start..pos].contains("//") {
            continue;
        }
        let Some(value_part) = text[pos + quoted.len()..].trim_start().strip_prefix(':') else {
            continue;
        };
        let value_text = value_part.trim_start();
        let start = text.len() - value_text.len();
        let len = value_len(value_text)?;

        let mut edited = text.to_string();
        edited.replace_range(start..start + len, rendered);
        return Some(edited);
    }
    None
}

// Length of the scalar value at the start of `text`
fn value_len(text: &str) -> Option<usize> {
    if text.starts_with('"') {
        let mut escaped = false;
        for (i, c) in text.char_indices().skip(1) {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => return Some(i + 1),
                '\n' => return None,
                _ => {}
            }
        }
        return None;
    }
    if text.starts_with(['{', '[']) {
        return None;
    }

    let mut end = text.find([',', '\n', '}']).unwrap_or(text.len());
    for comment in ["//", "/*"] {
        if let Some(i) = text[..end].find(comment) {
            end = i;
        }
    }
    let len = text[..end].trim_end().len();
    (len > 0).then_some(len)
}

// New keys go first, so nothing has to be said about the previous entry's comma
fn insert_entry(text: &str, key: &str, rendered: &str) -> Option<String> {
    let open = opening_brace(text)?;
    let indent = entry_indent(&text[open + 1..]);
    let mut entry = format!("\n{indent}{}: {rendered},", serde_json::to_string(key).ok()?);
    if !text[open + 1..].trim_start_matches([' ', '\t']).starts_with(['\n', '\r']) {
        entry.push('\n');
    }

    let mut edited = text.to_string();
    edited.insert_str(open + 1, &entry);
    Some(edited)
}

fn opening_brace(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => return Some(i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..].find("*/").map(|n| i + 2 + n + 2)?;
            }
            _ => i += 1,
        }
    }
    None
}

fn entry_indent(body: &str) -> &str {
    body.lines()
        .find(|line| line.trim_start().starts_with('"'))
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .unwrap_or("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STOCK_PREFERENCES: &str = "\
// Settings in here override those in \"Default/Preferences.sublime-settings\",
// and are overridden in turn by syntax-specific settings.
{
\t\"font_size\": 12,
\t\"theme\": \"Old.sublime-theme\", // picked by hand
}
";

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_parse_comments_and_trailing_commas() {
        let value = parse(STOCK_PREFERENCES).unwrap();
        assert_eq!(value, json!({"font_size": 12, "theme": "Old.sublime-theme"}));

        assert_eq!(parse("/* block */ {\"a\": [1, 2,],}").unwrap(), json!({"a": [1, 2]}));
        assert!(parse("{\"a\": }").is_err());
    }

    #[test]
    fn test_patch_keeps_comments_and_order() {
        let before = object(parse(STOCK_PREFERENCES).unwrap());
        let mut after = before.clone();
        after.insert("theme".into(), json!("Dark.sublime-theme"));
        after.insert("color_scheme".into(), json!("Mariana.sublime-color-scheme"));

        let patched = patch(STOCK_PREFERENCES, &before, &after).unwrap();
        assert_eq!(
            patched,
            "\
// Settings in here override those in \"Default/Preferences.sublime-settings\",
// and are overridden in turn by syntax-specific settings.
{
\t\"color_scheme\": \"Mariana.sublime-color-scheme\",
\t\"font_size\": 12,
\t\"theme\": \"Dark.sublime-theme\", // picked by hand
}
"
        );
    }

    #[test]
    fn test_patch_single_line_object() {
        let source = "// header\n{\"font_size\": 12,}";
        let before = object(parse(source).unwrap());
        let mut after = before.clone();
        after.insert("theme".into(), json!("Dark"));
        after.insert("font_size".into(), json!(14));

        let patched = patch(source, &before, &after).unwrap();
        assert!(patched.starts_with("// header\n{"));
        assert_eq!(object(parse(&patched).unwrap()), after);
    }

    #[test]
    fn test_commented_out_key_is_not_edited() {
        let source = "{\n\t// \"theme\": \"Ignored\",\n\t\"theme\": \"Old\",\n}\n";
        let before = object(parse(source).unwrap());
        let mut after = before.clone();
        after.insert("theme".into(), json!("New"));

        let patched = patch(source, &before, &after).unwrap();
        assert_eq!(patched, "{\n\t// \"theme\": \"Ignored\",\n\t\"theme\": \"New\",\n}\n");
    }

    #[test]
    fn test_patch_gives_up_on_what_it_cannot_edit() {
        let source = "{\n\t\"rulers\": [80],\n\t\"theme\": \"Old\",\n}\n";
        let before = object(parse(source).unwrap());

        let mut removed = before.clone();
        removed.remove("theme");
        assert_eq!(patch(source, &before, &removed), None);

        let mut array = before.clone();
        array.insert("rulers".into(), json!([100]));
        assert_eq!(patch(source, &before, &array), None);

        assert_eq!(patch(source, &before, &before).as_deref(), Some(source));
    }
}
