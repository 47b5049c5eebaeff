//! Line codec for the textual call protocol.
//!
//! ```text
//! FUNCTION_CALL: <tool_name>[|<key>=<literal>]*
//! FINAL_ANSWER: <free text>
//! ```
//!
//! Keys may be dotted (`input.int_list=[1,2,3]`) to address nested mappings.
//! Values go through [`parse_literal`]; anything that is not a literal is
//! kept as its trimmed text.

use cartwise_core::error::CallError;
use serde_json::{Map, Value};
use tracing::debug;
use crate::literal::{parse_literal, render_literal};

pub const CALL_PREFIX: &str = "FUNCTION_CALL:";
pub const ANSWER_PREFIX: &str = "FINAL_ANSWER:";

/// What to do with a parameter segment that has no `=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SegmentPolicy {
    /// Drop the segment and keep parsing.
    #[default]
    Skip,
    /// Fail the whole line with `MalformedParam`.
    Abort,
}

/// A recognised protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolLine {
    Call {
        name: String,
        arguments: Map<String, Value>,
    },
    FinalAnswer(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CallCodec {
    policy: SegmentPolicy,
}

impl CallCodec {
    pub fn new(policy: SegmentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SegmentPolicy {
        self.policy
    }

    /// Decode a `FUNCTION_CALL:` line into a tool name and argument mapping.
    pub fn decode(&self, line: &str) -> Result<(String, Map<String, Value>), CallError> {
        let line = line.trim();
        let body = line
            .strip_prefix(CALL_PREFIX)
            .ok_or_else(|| CallError::MalformedCall(format!("missing {CALL_PREFIX} prefix: {line}")))?;

        let mut parts = body.split('|');
        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(CallError::MalformedCall(format!("empty tool name: {line}")));
        }

        let mut arguments = Map::new();
        for segment in parts {
            let Some((key, raw)) = segment.split_once('=') else {
                self.reject(segment)?;
                continue;
            };
            let path: Vec<&str> = key.split('.').map(str::trim).collect();
            if path.iter().any(|k| k.is_empty()) {
                self.reject(segment)?;
                continue;
            }
            let raw = raw.trim();
            let value = parse_literal(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            insert_path(&mut arguments, &path, value);
        }

        Ok((name.to_string(), arguments))
    }

    /// Decode either kind of protocol line.
    pub fn parse_line(&self, line: &str) -> Result<ProtocolLine, CallError> {
        let line = line.trim();
        if let Some(answer) = line.strip_prefix(ANSWER_PREFIX) {
            return Ok(ProtocolLine::FinalAnswer(answer.trim().to_string()));
        }
        let (name, arguments) = self.decode(line)?;
        Ok(ProtocolLine::Call { name, arguments })
    }

    /// Find the first protocol line in multi-line model output.
    pub fn scan(&self, text: &str) -> Result<ProtocolLine, CallError> {
        text.lines()
            .map(str::trim)
            .find(|l| l.starts_with(CALL_PREFIX) || l.starts_with(ANSWER_PREFIX))
            .ok_or_else(|| {
                CallError::MalformedCall(format!(
                    "no {CALL_PREFIX} or {ANSWER_PREFIX} line in output"
                ))
            })
            .and_then(|l| self.parse_line(l))
    }

    fn reject(&self, segment: &str) -> Result<(), CallError> {
        match self.policy {
            SegmentPolicy::Abort => Err(CallError::MalformedParam {
                segment: segment.trim().to_string(),
            }),
            SegmentPolicy::Skip => {
                debug!(segment = %segment.trim(), "Skipping malformed call parameter");
                Ok(())
            }
        }
    }
}

/// Decode with the default (skipping) policy.
pub fn decode(line: &str) -> Result<(String, Map<String, Value>), CallError> {
    CallCodec::default().decode(line)
}

/// Encode a call as a protocol line. Nested mappings become dotted keys.
///
/// String values containing `|` do not survive a round trip.
pub fn encode(name: &str, arguments: &Map<String, Value>) -> String {
    let mut segments = Vec::new();
    flatten(String::new(), arguments, &mut segments);
    let mut line = format!("{CALL_PREFIX} {name}");
    for segment in segments {
        line.push('|');
        line.push_str(&segment);
    }
    line
}

pub fn encode_answer(answer: &str) -> String {
    format!("{ANSWER_PREFIX} {answer}")
}

fn flatten(prefix: String, map: &Map<String, Value>, out: &mut Vec<String>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten(path, inner, out),
            other => out.push(format!("{path}={}", render_literal(other))),
        }
    }
}

/// Write `value` at `path`, creating (or replacing non-mapping) intermediates.
fn insert_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = root;
    for key in parents {
        let slot = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn decodes_nested_keys() {
        let (name, args) = decode("FUNCTION_CALL: t|a=1|b.c=2").unwrap();
        assert_eq!(name, "t");
        assert_eq!(args, map(json!({"a": 1, "b": {"c": 2}})));
    }

    #[test]
    fn round_trip() {
        let (name, args) = decode("FUNCTION_CALL: t|a=1|b.c=2").unwrap();
        let line = encode(&name, &args);
        let (name2, args2) = decode(&line).unwrap();
        assert_eq!(name2, name);
        assert_eq!(args2, args);
    }

    #[test]
    fn round_trip_rich_values() {
        let args = map(json!({
            "query": "green 'running' shoes",
            "input": {"int_list": [1, 2, 3], "flag": true, "none": null},
            "ratio": 0.5
        }));
        let (name, back) = decode(&encode("search", &args)).unwrap();
        assert_eq!(name, "search");
        assert_eq!(back, args);
    }

    #[test]
    fn zero_arg_call() {
        let (name, args) = decode("FUNCTION_CALL: ping").unwrap();
        assert_eq!(name, "ping");
        assert!(args.is_empty());
    }

    #[test]
    fn unparseable_literal_falls_back_to_text() {
        let (_, args) = decode("FUNCTION_CALL: t|name=hello world").unwrap();
        assert_eq!(args["name"], json!("hello world"));
    }

    #[test]
    fn whitespace_is_trimmed() {
        let (name, args) =
            decode("  FUNCTION_CALL:   search_product_documents |  query = 'shoes'  | top_k = 5 ")
                .unwrap();
        assert_eq!(name, "search_product_documents");
        assert_eq!(args, map(json!({"query": "shoes", "top_k": 5})));
    }

    #[test]
    fn later_duplicate_wins() {
        let (_, args) = decode("FUNCTION_CALL: t|a=1|a=2|b.c=1|b.c=3").unwrap();
        assert_eq!(args, map(json!({"a": 2, "b": {"c": 3}})));
    }

    #[test]
    fn nested_key_replaces_scalar_parent() {
        let (_, args) = decode("FUNCTION_CALL: t|a=1|a.b=2").unwrap();
        assert_eq!(args, map(json!({"a": {"b": 2}})));
    }

    #[test]
    fn value_may_contain_equals_and_colons() {
        let (_, args) = decode("FUNCTION_CALL: t|expr=a=b|url=http://x").unwrap();
        assert_eq!(args["expr"], json!("a=b"));
        assert_eq!(args["url"], json!("http://x"));
    }

    #[test]
    fn literal_list_value() {
        let (_, args) = decode("FUNCTION_CALL: sum_list|input.int_list=[73, 78, 68]").unwrap();
        assert_eq!(args, map(json!({"input": {"int_list": [73, 78, 68]}})));
    }

    #[test]
    fn missing_prefix_is_malformed_call() {
        assert!(matches!(decode("CALL: t|a=1"), Err(CallError::MalformedCall(_))));
        assert!(matches!(decode("FINAL_ANSWER: hi"), Err(CallError::MalformedCall(_))));
    }

    #[test]
    fn empty_name_is_malformed_call() {
        assert!(matches!(decode("FUNCTION_CALL:   |a=1"), Err(CallError::MalformedCall(_))));
    }

    #[test]
    fn skip_policy_ignores_bad_segments() {
        let (_, args) = CallCodec::new(SegmentPolicy::Skip)
            .decode("FUNCTION_CALL: t|oops|a=1|=3|x..y=2")
            .unwrap();
        assert_eq!(args, map(json!({"a": 1})));
    }

    #[test]
    fn abort_policy_rejects_bad_segments() {
        let err = CallCodec::new(SegmentPolicy::Abort)
            .decode("FUNCTION_CALL: t|oops|a=1")
            .unwrap_err();
        assert_eq!(err, CallError::MalformedParam { segment: "oops".into() });
    }

    #[test]
    fn parse_line_recognises_answers() {
        let codec = CallCodec::default();
        assert_eq!(
            codec.parse_line("FINAL_ANSWER:  Here are your green shoes. ").unwrap(),
            ProtocolLine::FinalAnswer("Here are your green shoes.".into())
        );
        assert_eq!(
            codec.parse_line(&encode_answer("[unknown]")).unwrap(),
            ProtocolLine::FinalAnswer("[unknown]".into())
        );
    }

    #[test]
    fn scan_finds_first_protocol_line() {
        let text = "Let me think.\nI should search.\nFUNCTION_CALL: search|query='shoes'\nFINAL_ANSWER: nope";
        assert_eq!(
            CallCodec::default().scan(text).unwrap(),
            ProtocolLine::Call {
                name: "search".into(),
                arguments: map(json!({"query": "shoes"})),
            }
        );
    }

    #[test]
    fn scan_without_protocol_line_fails() {
        assert!(CallCodec::default().scan("just chatting").is_err());
    }
}
