//! Best-effort recovery of JSON values from model output.
//!
//! Model responses routinely arrive wrapped in prose or markdown fences, cut
//! off mid-object, or with small syntax slips. [`decode`] runs an ordered list
//! of pure strategies and returns the first value any of them produces. When
//! none succeed on the raw text, the text is stripped of control characters
//! and the whole list runs again.
//!
//! Call sites that can live with a synthesized value use
//! [`decode_or_synthesize`], which adds a last-resort reconstruction from
//! regex-salvaged fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Error)]
#[error("Could not extract valid JSON from response: {preview}")]
pub struct DecodeError {
    pub preview: String,
}

impl DecodeError {
    fn new(text: &str) -> Self {
        Self {
            preview: truncate_chars(text, PREVIEW_CHARS),
        }
    }
}

/// A single recovery attempt. `None` means "try the next one".
pub type Strategy = fn(&str) -> Option<Value>;

/// Tried in order on the raw text, then again on the control-stripped text.
pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("direct", parse_direct),
    ("fenced", parse_fenced),
    ("balanced", parse_balanced),
    ("repaired", parse_repaired),
];

static JSON_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?si)```[ \t]*json[ \t]*\r?\n?(.*?)```").ok());

static BARE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*\r?\n?(.*?)```").ok());

/// Decode `text`, trying every strategy on the raw and then the stripped
/// text. Fails only when all of them are exhausted.
pub fn decode(text: &str) -> Result<Value, DecodeError> {
    if let Some(value) = run_strategies(text) {
        return Ok(value);
    }

    let stripped = strip_control_chars(text);
    if stripped != text {
        if let Some(value) = run_strategies(&stripped) {
            log::debug!("Decoded model output after stripping control characters");
            return Ok(value);
        }
    }

    Err(DecodeError::new(text))
}

/// Like [`decode`], but never fails: when nothing parses, `synthesize` builds
/// a minimal value from whatever fields can still be salvaged from the text.
pub fn decode_or_synthesize<F>(text: &str, synthesize: F) -> Value
where
    F: FnOnce(&Salvage<'_>) -> Value,
{
    match decode(text) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("{}; reconstructing from salvaged fields", e);
            synthesize(&Salvage::new(text))
        }
    }
}

fn run_strategies(text: &str) -> Option<Value> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let value = strategy(text)?;
        log::debug!("Decoded model output with the {} strategy", name);
        Some(value)
    })
}

/// Strategy 1: the whole text is JSON.
pub fn parse_direct(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Strategy 2: the first parseable ```json fence, then the first parseable
/// unlabeled fence.
pub fn parse_fenced(text: &str) -> Option<Value> {
    JSON_FENCE
        .iter()
        .chain(BARE_FENCE.iter())
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .find_map(|body| serde_json::from_str(body.as_str().trim()).ok())
}

/// Strategy 3: the first brace-balanced `{...}` span that parses.
pub fn parse_balanced(text: &str) -> Option<Value> {
    balanced_spans(text)
        .into_iter()
        .find_map(|span| serde_json::from_str(span).ok())
}

/// Strategy 4: heuristic repair of each balanced span, then of the whole text.
pub fn parse_repaired(text: &str) -> Option<Value> {
    balanced_spans(text)
        .into_iter()
        .chain(std::iter::once(text))
        .find_map(|candidate| serde_json::from_str(&repair_json(candidate)).ok())
}

/// Removes ASCII 0x00-0x1F and the C1 range 0x7F-0x9F.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(*c as u32, 0x00..=0x1F | 0x7F..=0x9F))
        .collect()
}

/// Every top-level `{...}` span whose braces balance, scanning left to right.
/// Braces inside double-quoted strings are ignored. The scan stops at the
/// first `{` that never closes: every later brace sits inside it, so any
/// span found there would be a fragment of a truncated object.
fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut from = 0;

    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        match balanced_end(text, start) {
            Some(end) => {
                spans.push(&text[start..end]);
                from = end;
            }
            None => break,
        }
    }

    spans
}

fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Quotes bare property names, turns single-quoted strings into
/// double-quoted ones and drops trailing commas before `}` / `]`.
/// Content of double-quoted strings is never touched.
pub fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = string_end(&chars, i, '"');
                out.extend(&chars[i..end]);
                i = end;
            }
            '\'' => {
                let end = string_end(&chars, i, '\'');
                let body_end = if end > i + 1 && chars[end - 1] == '\'' {
                    end - 1
                } else {
                    end
                };
                push_double_quoted(&mut out, &chars[i + 1..body_end]);
                i = end;
            }
            ',' => {
                let next = skip_whitespace(&chars, i + 1);
                if !matches!(chars.get(next), Some('}') | Some(']')) {
                    out.push(',');
                }
                i += 1;
            }
            c if is_ident_start(c) && in_key_position(&out) => {
                let end = ident_end(&chars, i);
                let quote = chars.get(skip_whitespace(&chars, end)) == Some(&':');
                if quote {
                    out.push('"');
                }
                out.extend(&chars[i..end]);
                if quote {
                    out.push('"');
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Index just past the closing `quote`, or the end of input if unterminated.
fn string_end(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn push_double_quoted(out: &mut String, body: &[char]) {
    out.push('"');
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            '\\' if body.get(i + 1) == Some(&'\'') => {
                out.push('\'');
                i += 2;
                continue;
            }
            '\\' => {
                out.push('\\');
                if let Some(next) = body.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
                continue;
            }
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
        i += 1;
    }
    out.push('"');
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn ident_end(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '$' | '-')) {
        i += 1;
    }
    i
}

fn in_key_position(out: &str) -> bool {
    matches!(out.trim_end().chars().last(), Some('{') | Some(','))
}

/// Regex access to the fields of an unparseable response.
pub struct Salvage<'a> {
    text: &'a str,
}

impl<'a> Salvage<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// The value of a `"name": "..."` pair, unescaped when possible.
    pub fn string_field(&self, name: &str) -> Option<String> {
        let pattern = format!(
            r#"(?i)["']?{}["']?\s*:\s*"((?:[^"\\]|\\.)*)""#,
            regex::escape(name)
        );
        let re = Regex::new(&pattern).ok()?;
        let raw = re.captures(self.text)?.get(1)?.as_str();
        let value = serde_json::from_str::<String>(&format!("\"{}\"", raw))
            .unwrap_or_else(|_| raw.to_string());
        non_empty(value)
    }

    /// The body of a fenced block for `language`, falling back to a
    /// `"language": "..."` pair.
    pub fn code_block(&self, language: &str) -> Option<String> {
        let labels = language_labels(language)
            .iter()
            .map(|label| regex::escape(label))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(?s)```(?:{})[ \t]*\r?\n(.*?)```", labels);

        Regex::new(&pattern)
            .ok()
            .and_then(|re| re.captures(self.text))
            .and_then(|caps| caps.get(1))
            .and_then(|body| non_empty(body.as_str().trim_end().to_string()))
            .or_else(|| self.string_field(language))
    }
}

fn language_labels(language: &str) -> Vec<&str> {
    match language {
        "javascript" => vec!["javascript", "js"],
        "python" => vec!["python", "py"],
        "typescript" => vec!["typescript", "ts"],
        other => vec![other],
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_is_returned_unchanged() {
        for value in [
            json!({"type": "leetcode_problem", "constraints": ["1 <= n"], "nested": {"a": [1, 2, {"b": null}]}}),
            json!([1, "two", 3.5, false]),
            json!("just a string"),
            json!(42),
        ] {
            let text = serde_json::to_string_pretty(&value).unwrap();
            assert_eq!(decode(&text).unwrap(), value);
        }
    }

    #[test]
    fn fenced_json_wins_over_surrounding_prose() {
        let text = "Sure! Here is the result:\n```json\n{\"a\": {\"b\": 2}}\n```\nLet me know {if} you need more.";
        assert_eq!(decode(text).unwrap(), json!({"a": {"b": 2}}));
    }

    #[test]
    fn unlabeled_fence_is_accepted() {
        let text = "Result below\n```\n{\"ok\": true}\n```";
        assert_eq!(parse_fenced(text), Some(json!({"ok": true})));
    }

    #[test]
    fn brace_scan_finds_first_balanced_object_that_parses() {
        let text = "note {x} then {\"a\":1}";
        assert_eq!(decode(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn brace_scan_ignores_braces_inside_strings_and_trailing_noise() {
        let text = "Answer: {\"code\": \"fn main() { }\", \"n\": {\"m\": 1}} and a stray }";
        assert_eq!(
            parse_balanced(text),
            Some(json!({"code": "fn main() { }", "n": {"m": 1}}))
        );
    }

    #[test]
    fn truncated_object_is_not_decoded_from_its_nested_fragments() {
        let text = r#"{"type":"technical_requirement","project_title":"Chat app","input_format":{"description":"n/a","parameters":[]},"requirements_list":["Login","Rooms"#;
        assert_eq!(parse_balanced(text), None);
        assert_eq!(parse_repaired(text), None);
        assert!(decode(text).is_err());
    }

    #[test]
    fn complete_object_before_an_unclosed_opener_is_still_found() {
        let text = "first {\"a\": 1} then a draft {\"b\": {\"c\": 2}";
        assert_eq!(decode(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn fence_patterns_compile() {
        assert!(JSON_FENCE.is_some());
        assert!(BARE_FENCE.is_some());
    }

    #[test]
    fn repair_fixes_bare_keys_single_quotes_and_trailing_commas() {
        let text = "{name: 'Alice', tags: ['x', 'y',], meta: {ok: true,},}";
        assert_eq!(
            decode(text).unwrap(),
            json!({"name": "Alice", "tags": ["x", "y"], "meta": {"ok": true}})
        );
    }

    #[test]
    fn repair_leaves_double_quoted_content_alone() {
        let repaired = repair_json(r#"{"note": "time: O(n), space: O(1)", "q": 'it\'s',}"#);
        assert_eq!(
            serde_json::from_str::<Value>(&repaired).unwrap(),
            json!({"note": "time: O(n), space: O(1)", "q": "it's"})
        );
    }

    #[test]
    fn raw_control_characters_are_stripped_before_retrying() {
        let text = "{\"explanation\": \"line one\nline two\", \"tab\": \"a\tb\"}";
        assert!(parse_direct(text).is_none());
        assert_eq!(
            decode(text).unwrap(),
            json!({"explanation": "line oneline two", "tab": "ab"})
        );
    }

    #[test]
    fn strip_control_chars_covers_c1_range() {
        assert_eq!(strip_control_chars("a\u{0}b\u{85}c\u{9f}d\u{7f}"), "abcd");
        assert_eq!(strip_control_chars("plain ✓"), "plain ✓");
    }

    #[test]
    fn exhausted_strategies_report_a_preview() {
        let text = "I could not produce JSON for this one, sorry.";
        let err = decode(text).unwrap_err();
        assert_eq!(err.preview, text);

        let long = "x".repeat(500);
        assert_eq!(decode(&long).unwrap_err().preview.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn synthesis_only_runs_when_decoding_fails() {
        let parsed = decode_or_synthesize("{\"a\": 1}", |_| json!({"synthetic": true}));
        assert_eq!(parsed, json!({"a": 1}));

        let text = "The \"explanation\": \"Use a hash map\" and then\n```python\ndef f():\n    return 1\n```\n```js\nconst f = () => 1;\n```";
        let synthesized = decode_or_synthesize(text, |salvage| {
            json!({
                "explanation": salvage.string_field("explanation"),
                "python": salvage.code_block("python"),
                "javascript": salvage.code_block("javascript"),
            })
        });
        assert_eq!(
            synthesized,
            json!({
                "explanation": "Use a hash map",
                "python": "def f():\n    return 1",
                "javascript": "const f = () => 1;",
            })
        );
    }

    #[test]
    fn salvage_reads_truncated_json_fields() {
        let text = r#"{"debug_analysis": "Off by one in the loop", "improved_solution": {"code": {"javascript": "let x = \"y\";", "python": "x = 1"#;
        let salvage = Salvage::new(text);
        assert_eq!(salvage.string_field("debug_analysis").as_deref(), Some("Off by one in the loop"));
        assert_eq!(salvage.code_block("javascript").as_deref(), Some("let x = \"y\";"));
        assert_eq!(salvage.code_block("python"), None);
    }
}
